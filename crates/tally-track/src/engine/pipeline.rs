use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use tally_core::{CountingParams, ParamsError, Profile, RecoveryPolicy};
use tally_weight::WeightEstimator;

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{CycleReport, CycleStatus, DetectionSource, SessionReport};
use crate::counter::LineCounter;
use crate::matcher::match_profiles;

/// Where the engine is in its two-state cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingPhase {
    /// No base set yet; the next frame becomes one without matching.
    Bootstrapping,
    /// Frames are matched against the base set and counted.
    Tracking,
}

#[derive(Clone, Copy, Debug, Default)]
struct SessionStats {
    cycles: u64,
    no_input: u64,
    lost_track: u64,
}

/// Line-crossing counting engine.
///
/// Owns all tracking state. Every mutating call takes `&mut self`, so cycles
/// are strictly sequential.
pub struct CountingEngine {
    params: CountingParams,
    estimator: WeightEstimator,
    counter: LineCounter,
    base: Vec<Profile>,
    phase: TrackingPhase,
    stats: SessionStats,
    started: Instant,
    started_at: SystemTime,
}

impl CountingEngine {
    /// Validate `params` and create an engine in the bootstrapping phase.
    pub fn new(params: CountingParams) -> Result<Self, ParamsError> {
        params.validate()?;
        let estimator = WeightEstimator::from_params(&params);
        Self::with_estimator(params, estimator)
    }

    /// Like [`CountingEngine::new`], with a caller-configured estimator.
    pub fn with_estimator(
        params: CountingParams,
        estimator: WeightEstimator,
    ) -> Result<Self, ParamsError> {
        params.validate()?;
        let now = Instant::now();
        let counter = LineCounter::new(params.count_line(), params.counted_memory_ttl(), now);
        info!(
            "counting engine ready: count line y={:.1}, recovery {:?}, refinement workers {}",
            params.count_line(),
            params.recovery_policy,
            estimator.worker_count()
        );
        Ok(Self {
            params,
            estimator,
            counter,
            base: Vec::new(),
            phase: TrackingPhase::Bootstrapping,
            stats: SessionStats::default(),
            started: now,
            started_at: SystemTime::now(),
        })
    }

    #[inline]
    pub fn params(&self) -> &CountingParams {
        &self.params
    }

    #[inline]
    pub fn phase(&self) -> TrackingPhase {
        self.phase
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.counter.count()
    }

    /// Session total weight, in grams.
    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.counter.total_weight()
    }

    /// Current base set.
    #[inline]
    pub fn tracked_profiles(&self) -> &[Profile] {
        &self.base
    }

    #[inline]
    pub fn counter(&self) -> &LineCounter {
        &self.counter
    }

    /// Run one cycle, timestamped now.
    pub fn cycle<S: DetectionSource + ?Sized>(&mut self, source: &mut S) -> CycleReport {
        self.cycle_at(source, Instant::now())
    }

    /// Run one cycle at an explicit instant (drives the counted-memory TTL).
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(phase = ?self.phase, base = self.base.len()))
    )]
    pub fn cycle_at<S: DetectionSource + ?Sized>(
        &mut self,
        source: &mut S,
        now: Instant,
    ) -> CycleReport {
        self.stats.cycles += 1;
        let report = match self.phase {
            TrackingPhase::Bootstrapping => {
                self.bootstrap(source, CycleStatus::Bootstrapped, now)
            }
            TrackingPhase::Tracking => self.track(source, now),
        };
        if report.status == CycleStatus::NoInput {
            self.stats.no_input += 1;
        }
        debug!(
            "cycle {}: {:?}, tracking {}, count {}, weight {:.1}",
            self.stats.cycles,
            report.status,
            report.tracked_profiles.len(),
            report.count,
            report.total_weight
        );
        report
    }

    /// Zero the aggregates and clear the tracked set and counted memory.
    pub fn reset(&mut self) {
        info!(
            "session reset at count {}, weight {:.1}",
            self.count(),
            self.total_weight()
        );
        let now = Instant::now();
        self.counter.reset(now);
        self.base.clear();
        self.phase = TrackingPhase::Bootstrapping;
        self.stats = SessionStats::default();
        self.started = now;
        self.started_at = SystemTime::now();
    }

    /// Release the refinement worker pool. The engine stays usable.
    pub fn stop(&mut self) {
        self.estimator.stop();
    }

    pub fn session_report(&self) -> SessionReport {
        let total = self.total_weight();
        SessionReport {
            count: self.count(),
            total_weight_g: total,
            total_weight_kg: total / 1000.0,
            cycles: self.stats.cycles,
            no_input_cycles: self.stats.no_input,
            lost_track_events: self.stats.lost_track,
            started_at: unix_seconds(self.started_at),
            ended_at: unix_seconds(SystemTime::now()),
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
        }
    }

    fn bootstrap<S: DetectionSource + ?Sized>(
        &mut self,
        source: &mut S,
        status: CycleStatus,
        now: Instant,
    ) -> CycleReport {
        let Some(detections) = source.poll() else {
            return self.report(CycleStatus::NoInput, Vec::new(), 0);
        };
        self.counter.expire_memory(now);

        let mut profiles = self.estimator.estimate_all(&detections);
        let issued = self.counter.issue_ids(&mut profiles);
        debug!(
            "bootstrapped {} profiles, issued {} ids",
            profiles.len(),
            issued.len()
        );
        self.base = profiles;
        self.phase = TrackingPhase::Tracking;
        self.report(status, Vec::new(), 0)
    }

    fn track<S: DetectionSource + ?Sized>(&mut self, source: &mut S, now: Instant) -> CycleReport {
        let Some(detections) = source.poll() else {
            return self.report(CycleStatus::NoInput, Vec::new(), 0);
        };

        let mut compare = self.estimator.estimate_all(&detections);
        let count_line = self.counter.count_line();
        match match_profiles(
            &mut self.base,
            &mut compare,
            count_line,
            &self.params.matching,
        ) {
            Ok(matched) => {
                let step = self.counter.process(&mut compare, now);
                self.base = compare;
                self.report(CycleStatus::Tracked, step.counted, matched.attempts)
            }
            Err(err) => {
                self.stats.lost_track += 1;
                self.counter.expire_memory(now);
                let attempts = self.params.matching.max_attempts + 1;
                match self.params.recovery_policy {
                    RecoveryPolicy::Preserve => {
                        warn!("tracking lost, keeping {} stale profiles: {err}", self.base.len());
                        self.report(CycleStatus::TrackingLost, Vec::new(), attempts)
                    }
                    RecoveryPolicy::Rebuild => {
                        warn!("tracking lost, rebuilding base set: {err}");
                        self.base.clear();
                        self.phase = TrackingPhase::Bootstrapping;
                        let mut report = self.bootstrap(source, CycleStatus::TrackingLost, now);
                        report.status = CycleStatus::TrackingLost;
                        report.lost_track = true;
                        report.match_attempts = attempts;
                        report
                    }
                }
            }
        }
    }

    fn report(&self, status: CycleStatus, counted: Vec<u64>, match_attempts: usize) -> CycleReport {
        CycleReport {
            status,
            count: self.counter.count(),
            total_weight: self.counter.total_weight(),
            tracked_profiles: self.base.clone(),
            lost_track: status == CycleStatus::TrackingLost,
            counted,
            match_attempts,
        }
    }
}

fn unix_seconds(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}
