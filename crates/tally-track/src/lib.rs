//! Temporal correspondence and counting engine.
//!
//! ## Quickstart
//!
//! ```
//! use nalgebra::Point2;
//! use tally_core::{CountingParams, Detection};
//! use tally_track::{CountingEngine, VecSource};
//!
//! let mut engine = CountingEngine::new(CountingParams::default()).expect("valid params");
//! let mut source = VecSource::new([
//!     Some(vec![Detection::new(Point2::new(100.0, 560.0), 4000.0)]),
//!     Some(vec![Detection::new(Point2::new(100.0, 590.0), 4000.0)]),
//!     Some(vec![Detection::new(Point2::new(100.0, 620.0), 4000.0)]),
//! ]);
//!
//! while !source.is_exhausted() {
//!     engine.cycle(&mut source);
//! }
//! assert_eq!(engine.count(), 1);
//! ```
//!
//! Per cycle:
//! 1. Poll the detection source; no frame means the cycle is skipped.
//! 2. Estimate a weight for every detection (optionally refined in parallel).
//! 3. Bootstrapping: the estimated profiles become the base set directly.
//! 4. Tracking: greedily pair base and compare profiles, retrying with the
//!    base shifted forward when too few pair up.
//! 5. Count every identified profile past the count line once, issue ids to
//!    new profiles before the line, and carry the compare set forward as the
//!    next base set.
//! 6. If the matcher ran out of retries, keep or rebuild the base set per
//!    [`RecoveryPolicy`](tally_core::RecoveryPolicy) and report `lost_track`.

mod counter;
mod engine;
mod matcher;

pub use counter::{CountStep, CountedMemory, LineCounter};
pub use engine::{
    CountingEngine, CycleReport, CycleStatus, DetectionSource, SessionReport, TrackingPhase,
    VecSource,
};
pub use matcher::{match_profiles, MatchError, MatchReport};
