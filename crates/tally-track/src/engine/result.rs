use serde::{Deserialize, Serialize};
use tally_core::Profile;

/// How a cycle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// The source had no frame; nothing changed.
    NoInput,
    /// A base set was pulled directly from the source.
    Bootstrapped,
    /// Matched and counted.
    Tracked,
    /// The matcher ran out of retries; the recovery policy was applied.
    TrackingLost,
}

/// Output of one counting cycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CycleReport {
    pub status: CycleStatus,
    /// Session count after the cycle.
    pub count: u64,
    /// Session total weight after the cycle, in grams.
    pub total_weight: f64,
    /// Profiles tracked into the next cycle.
    pub tracked_profiles: Vec<Profile>,
    pub lost_track: bool,
    /// Ids counted during this cycle.
    pub counted: Vec<u64>,
    /// Matcher attempts used, `0` when the matcher did not run.
    pub match_attempts: usize,
}

/// Session summary, e.g. for the end-of-shift report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub count: u64,
    pub total_weight_g: f64,
    pub total_weight_kg: f64,
    pub cycles: u64,
    pub no_input_cycles: u64,
    pub lost_track_events: u64,
    /// Session start, Unix seconds.
    pub started_at: f64,
    /// Report time, Unix seconds.
    pub ended_at: f64,
    pub elapsed_seconds: f64,
}
