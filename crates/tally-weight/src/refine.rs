//! Pixel-classification refinement.
//!
//! A detector box around a round fruit always contains some belt. The
//! refinement counts the belt pixels inside the crop and converts them into a
//! weight to subtract from the area-based estimate.

use log::debug;
use tally_core::{ColorBand, RefineParams, RgbPatchView};

/// Dynamic range below which the value channel is considered flat.
const FLAT_RANGE_EPS: f32 = 1e-6;

/// Divisor used instead of a ~0 dynamic range.
pub const DEGENERATE_RANGE_DIVISOR: f32 = 0.01;

/// Convert an RGB8 pixel into `[hue_deg, saturation, value]`.
///
/// Hue is in `[0, 360)`; saturation and value are in `[0, 1]`.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [f32; 3] {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta <= 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max <= 0.0 { 0.0 } else { delta / max };

    [hue, saturation, max]
}

/// Divisor for normalizing a channel spanning `[min, max]`.
///
/// Returns [`DEGENERATE_RANGE_DIVISOR`] for flat inputs instead of failing.
#[inline]
pub fn range_divisor(min: f32, max: f32) -> f32 {
    let range = max - min;
    if range.is_finite() && range > FLAT_RANGE_EPS {
        range
    } else {
        DEGENERATE_RANGE_DIVISOR
    }
}

/// Count pixels of `patch` that fall inside the background `band`.
///
/// The value channel is contrast-stretched to `[0, 1]` over the patch before
/// banding, so lighting drift along the belt does not shift the band.
pub fn count_background_pixels(patch: &RgbPatchView<'_>, band: &ColorBand) -> usize {
    if patch.is_empty() {
        return 0;
    }

    let hsv: Vec<[f32; 3]> = patch.pixels().map(rgb_to_hsv).collect();
    let (v_min, v_max) = hsv
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), px| {
            (lo.min(px[2]), hi.max(px[2]))
        });
    let divisor = range_divisor(v_min, v_max);
    if divisor == DEGENERATE_RANGE_DIVISOR {
        debug!(
            "flat {}x{} patch (value range {:.2e}), using fallback divisor",
            patch.width,
            patch.height,
            v_max - v_min
        );
    }

    hsv.iter()
        .filter(|&&[h, s, v]| {
            let v_norm = ((v - v_min) / divisor).clamp(0.0, 1.0);
            band.contains([h, s, v_norm])
        })
        .count()
}

/// Subtract the weight of the background pixels from `initial_weight`.
pub fn refine_weight(initial_weight: f32, patch: &RgbPatchView<'_>, params: &RefineParams) -> f32 {
    let n = count_background_pixels(patch, &params.background);
    initial_weight - params.model.eval(n as f32)
}
