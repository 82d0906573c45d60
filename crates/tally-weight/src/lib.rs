//! Weight estimation for tally.
//!
//! A profile's weight starts from a calibrated linear model on the detector's
//! box area (`m * area + b`). Optionally, the RGB crop of each detection is
//! classified pixel by pixel against a background color band and the weight
//! of the background pixels (`m2 * n + b2`) is subtracted.
//!
//! Refinement is the only parallel stage of a counting cycle. It is stateless
//! per detection and runs on a small `rayon` pool sized to the available
//! cores; results are collected in detection order.

mod estimator;
pub mod refine;

pub use estimator::WeightEstimator;
pub use refine::{count_background_pixels, refine_weight, rgb_to_hsv, DEGENERATE_RANGE_DIVISOR};
