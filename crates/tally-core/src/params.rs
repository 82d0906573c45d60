//! Counting parameters and their validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parameters of the correspondence matcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// Maximal pixel distance between a base and a compare profile to pair them.
    pub distance_threshold: f32,
    /// Fraction of base profiles that must be paired for an attempt to succeed.
    pub percent_threshold: f32,
    /// Forward `y` shift applied to the base set on every retry (pixels).
    ///
    /// Models the expected motion between frames when the detector
    /// under-reports, e.g. because of partial occlusion.
    pub base_translation: f32,
    /// Number of retries after the first attempt.
    pub max_attempts: usize,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            distance_threshold: 40.0,
            percent_threshold: 0.5,
            base_translation: 15.0,
            max_attempts: 3,
        }
    }
}

/// Linear model `weight = m * x + b`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightModel {
    pub m: f32,
    pub b: f32,
}

impl WeightModel {
    #[inline]
    pub fn eval(&self, x: f32) -> f32 {
        self.m * x + self.b
    }
}

impl Default for WeightModel {
    fn default() -> Self {
        // grams per square pixel at the default mounting height
        Self { m: 0.002, b: 0.0 }
    }
}

/// Closed HSV band.
///
/// Hue is in degrees `[0, 360]`; a band with `hue[0] > hue[1]` wraps through
/// zero (useful for reds). Saturation and value are in `[0, 1]`; value is
/// compared after per-patch contrast normalization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorBand {
    pub hue: [f32; 2],
    pub saturation: [f32; 2],
    pub value: [f32; 2],
}

impl ColorBand {
    /// Whether an HSV triple falls inside the band.
    pub fn contains(&self, [h, s, v]: [f32; 3]) -> bool {
        let [h0, h1] = self.hue;
        let hue_ok = if h0 <= h1 {
            (h0..=h1).contains(&h)
        } else {
            h >= h0 || h <= h1
        };
        hue_ok
            && (self.saturation[0]..=self.saturation[1]).contains(&s)
            && (self.value[0]..=self.value[1]).contains(&v)
    }
}

impl Default for ColorBand {
    fn default() -> Self {
        // green conveyor belt
        Self {
            hue: [90.0, 150.0],
            saturation: [0.25, 1.0],
            value: [0.0, 1.0],
        }
    }
}

/// Parameters of the optional pixel-classification refinement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    pub enabled: bool,
    /// Weight attributed to `n` background pixels inside the box.
    pub model: WeightModel,
    pub background: ColorBand,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            enabled: false,
            model: WeightModel::default(),
            background: ColorBand::default(),
        }
    }
}

/// What the engine does once the matcher runs out of retries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Keep the stale base set and try again next cycle.
    Preserve,
    /// Drop the base set and bootstrap again from a fresh detection pull.
    #[default]
    Rebuild,
}

/// Full configuration of a counting session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountingParams {
    pub matching: MatchParams,
    /// Frame extent along the direction of travel, in pixels.
    pub frame_extent: f32,
    /// Distance of the count line from the far frame edge, in pixels.
    pub count_line_offset: f32,
    /// Area-to-weight model.
    pub weight: WeightModel,
    pub refine: RefineParams,
    pub counted_memory_ttl_seconds: f32,
    pub recovery_policy: RecoveryPolicy,
}

impl Default for CountingParams {
    fn default() -> Self {
        Self {
            matching: MatchParams::default(),
            frame_extent: 720.0,
            count_line_offset: 120.0,
            weight: WeightModel::default(),
            refine: RefineParams::default(),
            counted_memory_ttl_seconds: 10.0,
            recovery_policy: RecoveryPolicy::default(),
        }
    }
}

/// Configuration validation errors.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParamsError {
    #[error("match distance threshold must be finite and > 0 (got {0})")]
    InvalidMatchDistance(f32),
    #[error("match percent threshold must be in [0, 1] (got {0})")]
    InvalidMatchPercent(f32),
    #[error("base profile translation must be finite (got {0})")]
    InvalidTranslation(f32),
    #[error("frame extent must be finite and > 0 (got {0})")]
    InvalidFrameExtent(f32),
    #[error("count line offset must be in [0, frame extent] (got {offset}, extent {extent})")]
    InvalidCountLineOffset { offset: f32, extent: f32 },
    #[error("{name} coefficients must be finite (m={m}, b={b})")]
    InvalidWeightModel { name: &'static str, m: f32, b: f32 },
    #[error("color band {channel} must satisfy {min} <= lo, hi <= {max} (got [{lo}, {hi}])")]
    InvalidColorBand {
        channel: &'static str,
        lo: f32,
        hi: f32,
        min: f32,
        max: f32,
    },
    #[error("counted memory TTL must be > 0 and fit a Duration (got {0} s)")]
    InvalidTtl(f32),
}

impl CountingParams {
    /// Image-space `y` of the count line.
    #[inline]
    pub fn count_line(&self) -> f32 {
        self.frame_extent - self.count_line_offset
    }

    /// Counted-memory TTL as a `Duration`.
    ///
    /// Saturates at `Duration::MAX` for values [`validate`](Self::validate)
    /// would reject.
    pub fn counted_memory_ttl(&self) -> Duration {
        Duration::try_from_secs_f32(self.counted_memory_ttl_seconds).unwrap_or(Duration::MAX)
    }

    /// Check every constraint. Must pass before an engine is built.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let m = &self.matching;
        if !m.distance_threshold.is_finite() || m.distance_threshold <= 0.0 {
            return Err(ParamsError::InvalidMatchDistance(m.distance_threshold));
        }
        if !(0.0..=1.0).contains(&m.percent_threshold) {
            return Err(ParamsError::InvalidMatchPercent(m.percent_threshold));
        }
        if !m.base_translation.is_finite() {
            return Err(ParamsError::InvalidTranslation(m.base_translation));
        }
        if !self.frame_extent.is_finite() || self.frame_extent <= 0.0 {
            return Err(ParamsError::InvalidFrameExtent(self.frame_extent));
        }
        if !(0.0..=self.frame_extent).contains(&self.count_line_offset) {
            return Err(ParamsError::InvalidCountLineOffset {
                offset: self.count_line_offset,
                extent: self.frame_extent,
            });
        }
        check_model("weight model", &self.weight)?;
        check_model("refinement model", &self.refine.model)?;

        let band = &self.refine.background;
        check_range("hue", band.hue, 0.0, 360.0, true)?;
        check_range("saturation", band.saturation, 0.0, 1.0, false)?;
        check_range("value", band.value, 0.0, 1.0, false)?;

        let ttl = self.counted_memory_ttl_seconds;
        if ttl <= 0.0 || Duration::try_from_secs_f32(ttl).is_err() {
            return Err(ParamsError::InvalidTtl(ttl));
        }
        Ok(())
    }
}

fn check_model(name: &'static str, model: &WeightModel) -> Result<(), ParamsError> {
    if model.m.is_finite() && model.b.is_finite() {
        Ok(())
    } else {
        Err(ParamsError::InvalidWeightModel {
            name,
            m: model.m,
            b: model.b,
        })
    }
}

fn check_range(
    channel: &'static str,
    [lo, hi]: [f32; 2],
    min: f32,
    max: f32,
    may_wrap: bool,
) -> Result<(), ParamsError> {
    let bounded = (min..=max).contains(&lo) && (min..=max).contains(&hi);
    if bounded && (may_wrap || lo <= hi) {
        Ok(())
    } else {
        Err(ParamsError::InvalidColorBand {
            channel,
            lo,
            hi,
            min,
            max,
        })
    }
}
