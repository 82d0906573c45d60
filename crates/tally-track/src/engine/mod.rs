//! Counting cycle orchestration.
//!
//! This module wires together the detection source, weight estimation,
//! correspondence matching and line-crossing counting, one cycle per call.

mod pipeline;
mod result;
mod source;

pub use pipeline::{CountingEngine, TrackingPhase};
pub use result::{CycleReport, CycleStatus, SessionReport};
pub use source::{DetectionSource, VecSource};
