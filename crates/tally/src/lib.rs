//! High-level facade crate for the `tally-*` workspace.
//!
//! This crate provides:
//! - stable, convenient re-exports of the underlying crates
//! - JSON settings, recorded-frame replay and session reports ([`io`])
//! - (feature-gated) cropping detection patches out of an `image::RgbImage`
//! - the `tally` command-line tool (feature `cli`, on by default)
//!
//! ## Quickstart
//!
//! ```no_run
//! use tally::io::{ReplaySource, TallyConfig};
//! use tally::CountingEngine;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TallyConfig::load_json("station.json")?;
//! let mut source = ReplaySource::load_json("belt_recording.json")?;
//! let mut engine = CountingEngine::new(config.params)?;
//!
//! while !source.is_exhausted() {
//!     engine.cycle(&mut source);
//! }
//! engine.stop();
//! println!("{} fruit, {:.2} kg", engine.count(), engine.total_weight() / 1000.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `tally::core`: detections, profiles, identities, patches, parameters, logger.
//! - `tally::weight`: weight estimation and color refinement.
//! - `tally::track`: matcher, line counter and the counting engine.
//! - `tally::io`: JSON config, replay source and report helpers.
//! - `tally::crop` (feature `image`): patch extraction from `image::RgbImage`.

pub use tally_core as core;
pub use tally_track as track;
pub use tally_weight as weight;

pub use tally_core::{CountingParams, Detection, Profile, ProfileId, RecoveryPolicy};
pub use tally_track::{CountingEngine, CycleReport, CycleStatus, DetectionSource, SessionReport};

pub mod io;

#[cfg(feature = "image")]
pub mod crop;
