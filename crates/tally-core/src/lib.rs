//! Core types for the tally line-crossing counter.
//!
//! This crate is intentionally small. It holds the data model shared by the
//! weight estimator and the tracker (detections, profiles, identities, pixel
//! patches), the validated parameter set, and a minimal logger. It does *not*
//! depend on any concrete camera, detector or image library.

mod logger;
mod params;
mod patch;
mod profile;

pub use params::{
    ColorBand, CountingParams, MatchParams, ParamsError, RecoveryPolicy, RefineParams,
    WeightModel,
};
pub use patch::{RgbPatch, RgbPatchView};
pub use profile::{BoundingBox, Detection, Profile, ProfileId};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_station, init_with_level, station_level, LOG_ENV};
