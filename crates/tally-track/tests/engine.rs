use std::collections::HashSet;
use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use nalgebra::Point2;
use tally_core::{CountingParams, Detection, MatchParams, ParamsError, ProfileId, RecoveryPolicy};
use tally_track::{CountingEngine, CycleStatus, DetectionSource, TrackingPhase, VecSource};

const FRAME: Duration = Duration::from_millis(33);

fn det(x: f32, y: f32) -> Detection {
    Detection::new(Point2::new(x, y), 4000.0)
}

/// Count line at y = 100, 1 g per 100 px², generous matching.
fn params(policy: RecoveryPolicy) -> CountingParams {
    let mut params = CountingParams {
        frame_extent: 200.0,
        count_line_offset: 100.0,
        recovery_policy: policy,
        matching: MatchParams {
            distance_threshold: 15.0,
            percent_threshold: 0.5,
            base_translation: 10.0,
            max_attempts: 1,
        },
        ..CountingParams::default()
    };
    params.weight.m = 0.01;
    params.weight.b = 0.0;
    params
}

fn engine(policy: RecoveryPolicy) -> CountingEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    CountingEngine::new(params(policy)).expect("valid params")
}

/// A single object walking down the frame in `step` px increments.
fn walking(from: f32, step: f32, frames: usize) -> VecSource {
    VecSource::new((0..frames).map(|i| Some(vec![det(50.0, from + step * i as f32)])))
}

fn run(engine: &mut CountingEngine, source: &mut VecSource, t0: Instant) -> Vec<CycleStatus> {
    let mut statuses = Vec::new();
    let mut t = t0;
    while !source.is_exhausted() {
        statuses.push(engine.cycle_at(source, t).status);
        t += FRAME;
    }
    statuses
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let mut bad = params(RecoveryPolicy::Rebuild);
    bad.matching.distance_threshold = -3.0;
    let err = CountingEngine::new(bad).err().expect("rejected");
    assert_eq!(err, ParamsError::InvalidMatchDistance(-3.0));
}

#[test]
fn bootstrap_then_track() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    assert_eq!(engine.phase(), TrackingPhase::Bootstrapping);

    let mut source = VecSource::new([Some(vec![det(10.0, 50.0)]), Some(vec![det(11.0, 52.0)])]);
    let now = Instant::now();

    let first = engine.cycle_at(&mut source, now);
    assert_eq!(first.status, CycleStatus::Bootstrapped);
    assert_eq!(first.match_attempts, 0);
    assert_eq!(first.tracked_profiles[0].id, ProfileId::Identified(0));
    assert_eq!(engine.phase(), TrackingPhase::Tracking);

    let second = engine.cycle_at(&mut source, now + FRAME);
    assert_eq!(second.status, CycleStatus::Tracked);
    assert_eq!(second.match_attempts, 1);
    assert_eq!(second.tracked_profiles[0].id, ProfileId::Identified(0));
    assert_eq!(engine.counter().next_id(), 1);
}

#[test]
fn object_is_counted_exactly_once_when_crossing() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    let mut source = walking(40.0, 10.0, 15);
    run(&mut engine, &mut source, Instant::now());

    assert_eq!(engine.count(), 1);
    // weight is 40 g and frozen from the last estimate before the line
    assert_relative_eq!(engine.total_weight(), 40.0, epsilon = 1e-4);
}

#[test]
fn weight_freezes_at_the_line() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    let mut source = VecSource::new([
        Some(vec![Detection::new(Point2::new(50.0, 90.0), 4000.0)]),
        // occluded at the line: detector reports half the area
        Some(vec![Detection::new(Point2::new(50.0, 102.0), 2000.0)]),
    ]);
    let now = Instant::now();
    engine.cycle_at(&mut source, now);
    let report = engine.cycle_at(&mut source, now + FRAME);

    assert_eq!(report.counted, vec![0]);
    assert_relative_eq!(report.total_weight, 40.0, epsilon = 1e-4);
}

#[test]
fn object_entering_past_the_line_is_never_counted() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    let mut source = walking(120.0, 5.0, 10);
    run(&mut engine, &mut source, Instant::now());

    assert_eq!(engine.count(), 0);
    assert!(engine
        .tracked_profiles()
        .iter()
        .all(|p| p.id == ProfileId::Unidentified));
}

#[test]
fn no_input_skips_cycle_without_touching_state() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    let mut source = VecSource::new([Some(vec![det(10.0, 20.0)]), None, Some(vec![det(10.0, 30.0)])]);
    let now = Instant::now();

    engine.cycle_at(&mut source, now);
    let before = engine.tracked_profiles().to_vec();

    let skipped = engine.cycle_at(&mut source, now + FRAME);
    assert_eq!(skipped.status, CycleStatus::NoInput);
    assert!(!skipped.lost_track);
    assert_eq!(engine.tracked_profiles(), before.as_slice());
    assert_eq!(engine.phase(), TrackingPhase::Tracking);

    let tracked = engine.cycle_at(&mut source, now + FRAME * 2);
    assert_eq!(tracked.status, CycleStatus::Tracked);
    assert_eq!(tracked.tracked_profiles[0].id, ProfileId::Identified(0));
    assert_eq!(engine.session_report().no_input_cycles, 1);
}

#[test]
fn no_input_while_bootstrapping_stays_bootstrapping() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    let mut nothing = || -> Option<Vec<Detection>> { None };
    let report = engine.cycle(&mut nothing);
    assert_eq!(report.status, CycleStatus::NoInput);
    assert_eq!(engine.phase(), TrackingPhase::Bootstrapping);
}

fn four_then_one() -> VecSource {
    VecSource::new([
        Some(vec![det(10.0, 10.0), det(60.0, 10.0), det(110.0, 10.0), det(160.0, 10.0)]),
        Some(vec![det(10.0, 12.0)]),
        Some(vec![det(60.0, 14.0), det(110.0, 14.0)]),
    ])
}

#[test]
fn preserve_policy_keeps_stale_base() {
    let mut engine = engine(RecoveryPolicy::Preserve);
    let mut source = four_then_one();
    let now = Instant::now();

    engine.cycle_at(&mut source, now);
    let stale = engine.tracked_profiles().to_vec();
    assert_eq!(stale.len(), 4);

    let lost = engine.cycle_at(&mut source, now + FRAME);
    assert_eq!(lost.status, CycleStatus::TrackingLost);
    assert!(lost.lost_track);
    assert_eq!(lost.match_attempts, 2);
    assert_eq!(lost.tracked_profiles, stale);
    assert!(lost.tracked_profiles.iter().all(|p| !p.matched));

    // 2 of 4 stale profiles pair up: ratio 0.5 is enough
    let recovered = engine.cycle_at(&mut source, now + FRAME * 2);
    assert_eq!(recovered.status, CycleStatus::Tracked);
    let ids: Vec<ProfileId> = recovered.tracked_profiles.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![ProfileId::Identified(1), ProfileId::Identified(2)]);
    assert_eq!(engine.session_report().lost_track_events, 1);
}

#[test]
fn rebuild_policy_bootstraps_from_a_fresh_pull() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    let mut source = four_then_one();
    let now = Instant::now();

    engine.cycle_at(&mut source, now);
    let lost = engine.cycle_at(&mut source, now + FRAME);
    assert_eq!(lost.status, CycleStatus::TrackingLost);
    assert!(lost.lost_track);
    // the third frame was pulled to rebuild the base set with fresh ids
    let ids: Vec<ProfileId> = lost.tracked_profiles.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![ProfileId::Identified(4), ProfileId::Identified(5)]);
    assert_eq!(engine.phase(), TrackingPhase::Tracking);
    assert!(source.is_exhausted());
}

#[test]
fn rebuild_without_fresh_frame_returns_to_bootstrapping() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    let mut source = VecSource::new([
        Some(vec![det(10.0, 10.0), det(60.0, 10.0)]),
        Some(vec![det(150.0, 10.0)]),
    ]);
    let now = Instant::now();

    engine.cycle_at(&mut source, now);
    let lost = engine.cycle_at(&mut source, now + FRAME);
    assert!(lost.lost_track);
    assert!(lost.tracked_profiles.is_empty());
    assert_eq!(engine.phase(), TrackingPhase::Bootstrapping);
}

#[test]
fn counts_are_monotonic_and_ids_unique_across_a_stream() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    // three objects spaced 60 px apart, moving 8 px per frame
    let frames = (0..40).map(|i| {
        let dy = 8.0 * i as f32;
        Some(
            [0.0f32, 60.0, 120.0]
                .iter()
                .map(|&start| det(50.0 + start / 4.0, start - 100.0 + dy))
                .filter(|d| (0.0..200.0).contains(&d.position.y))
                .collect::<Vec<_>>(),
        )
    });
    let mut source = VecSource::new(frames);

    let mut t = Instant::now();
    let mut last_count = 0;
    let mut counted_ids = HashSet::new();
    while !source.is_exhausted() {
        let report = engine.cycle_at(&mut source, t);
        assert!(report.count >= last_count);
        last_count = report.count;
        for id in &report.counted {
            assert!(counted_ids.insert(*id), "id {id} counted twice");
        }

        let ids: Vec<u64> = report
            .tracked_profiles
            .iter()
            .filter_map(|p| p.id.get())
            .collect();
        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len(), "shared id in {ids:?}");
        assert!(report.tracked_profiles.iter().all(|p| !p.matched));
        t += FRAME;
    }

    assert_eq!(engine.count(), 3);
}

#[test]
fn counted_memory_is_cleared_after_ttl() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    let mut source = walking(80.0, 10.0, 4);
    let t0 = Instant::now();
    run(&mut engine, &mut source, t0);
    assert!(engine.counter().memory().contains(0));

    let mut later = VecSource::new([Some(vec![det(50.0, 125.0)])]);
    engine.cycle_at(&mut later, t0 + Duration::from_secs(11));
    assert!(engine.counter().memory().is_empty());
}

#[test]
fn ttl_beyond_duration_range_is_rejected_up_front() {
    let mut bad = params(RecoveryPolicy::Rebuild);
    bad.counted_memory_ttl_seconds = 1e20;
    let err = CountingEngine::new(bad).err().expect("rejected");
    assert_eq!(err, ParamsError::InvalidTtl(1e20));
}

#[test]
fn counted_memory_expires_on_bootstrap_cycles() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    let t0 = Instant::now();
    run(&mut engine, &mut walking(80.0, 10.0, 4), t0);
    assert!(engine.counter().memory().contains(0));

    // tracking is lost and no fresh frame is available to rebuild from
    let mut gap = VecSource::new([Some(vec![det(150.0, 10.0)])]);
    let lost = engine.cycle_at(&mut gap, t0 + FRAME * 5);
    assert!(lost.lost_track);
    assert_eq!(engine.phase(), TrackingPhase::Bootstrapping);
    assert!(engine.counter().memory().contains(0));

    let mut later = VecSource::new([Some(vec![det(50.0, 20.0)])]);
    let report = engine.cycle_at(&mut later, t0 + Duration::from_secs(11));
    assert_eq!(report.status, CycleStatus::Bootstrapped);
    assert!(engine.counter().memory().is_empty());
}

#[test]
fn session_report_carries_wall_clock_bounds() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    run(&mut engine, &mut walking(80.0, 10.0, 4), Instant::now());

    let report = engine.session_report();
    assert_eq!(report.count, 1);
    assert!(report.started_at > 1.6e9, "started_at {}", report.started_at);
    assert!(report.ended_at >= report.started_at);
    assert!(report.elapsed_seconds >= 0.0);
}

#[test]
fn reset_clears_session() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    let mut source = walking(40.0, 10.0, 10);
    run(&mut engine, &mut source, Instant::now());
    assert_eq!(engine.count(), 1);

    engine.reset();
    assert_eq!(engine.count(), 0);
    assert_eq!(engine.total_weight(), 0.0);
    assert!(engine.tracked_profiles().is_empty());
    assert!(engine.counter().memory().is_empty());
    assert_eq!(engine.counter().next_id(), 0);
    assert_eq!(engine.phase(), TrackingPhase::Bootstrapping);

    let report = engine.session_report();
    assert_eq!(report.cycles, 0);
}

#[test]
fn stop_keeps_engine_usable() {
    let mut p = params(RecoveryPolicy::Rebuild);
    p.refine.enabled = true;
    let mut engine = CountingEngine::new(p).expect("valid");
    engine.stop();

    let mut source = walking(40.0, 10.0, 10);
    run(&mut engine, &mut source, Instant::now());
    assert_eq!(engine.count(), 1);
}

struct CountingSource {
    polls: usize,
}

impl DetectionSource for CountingSource {
    fn poll(&mut self) -> Option<Vec<Detection>> {
        self.polls += 1;
        Some(vec![det(50.0, 20.0 + 5.0 * self.polls as f32)])
    }
}

#[test]
fn custom_sources_are_polled_once_per_tracked_cycle() {
    let mut engine = engine(RecoveryPolicy::Rebuild);
    let mut source = CountingSource { polls: 0 };
    for _ in 0..5 {
        engine.cycle(&mut source);
    }
    assert_eq!(source.polls, 5);

    let report = engine.session_report();
    assert_eq!(report.cycles, 5);
    assert_relative_eq!(report.total_weight_kg, report.total_weight_g / 1000.0);
}
