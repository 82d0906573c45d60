//! Detections and tracked profiles.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::patch::RgbPatch;

/// Identity of a profile.
///
/// `Unidentified` means the profile has neither inherited an id from a match
/// nor been issued one by the counter yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileId {
    #[default]
    Unidentified,
    Identified(u64),
}

impl ProfileId {
    /// Numeric id, if any.
    #[inline]
    pub fn get(self) -> Option<u64> {
        match self {
            ProfileId::Identified(id) => Some(id),
            ProfileId::Unidentified => None,
        }
    }

    #[inline]
    pub fn is_identified(self) -> bool {
        matches!(self, ProfileId::Identified(_))
    }
}

impl From<Option<u64>> for ProfileId {
    fn from(id: Option<u64>) -> Self {
        id.map_or(ProfileId::Unidentified, ProfileId::Identified)
    }
}

/// Axis-aligned detector box in pixel coordinates (`x_min, y_min, x_max, y_max`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    #[inline]
    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Box centroid.
    #[inline]
    pub fn center(&self) -> Point2<f32> {
        Point2::new(
            0.5 * (self.x_min + self.x_max),
            0.5 * (self.y_min + self.y_max),
        )
    }
}

/// One raw detection for the current frame, as produced by the detector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Detection {
    /// Box centroid; `y` grows along the direction of travel.
    pub position: Point2<f32>,
    /// Detector-reported area in square pixels.
    pub area: f32,
    /// Optional RGB crop of the detection, used for weight refinement.
    #[serde(skip)]
    pub patch: Option<RgbPatch>,
}

impl Detection {
    pub fn new(position: Point2<f32>, area: f32) -> Self {
        Self {
            position,
            area,
            patch: None,
        }
    }

    /// Build a detection from a bounding box: centroid position, `w * h` area.
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Self::new(bbox.center(), bbox.area())
    }

    pub fn with_patch(mut self, patch: RgbPatch) -> Self {
        self.patch = Some(patch);
        self
    }
}

/// A tracked or candidate object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub position: Point2<f32>,
    pub area: f32,
    pub estimated_weight: f32,
    /// Set once paired with a detection during the current cycle.
    #[serde(default)]
    pub matched: bool,
}

impl Profile {
    /// A fresh, un-identified profile.
    pub fn new(position: Point2<f32>, area: f32, estimated_weight: f32) -> Self {
        Self {
            id: ProfileId::Unidentified,
            position,
            area,
            estimated_weight,
            matched: false,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = ProfileId::Identified(id);
        self
    }

    /// Whether the profile lies strictly past the count line.
    #[inline]
    pub fn is_past(&self, count_line: f32) -> bool {
        self.position.y > count_line
    }

    /// Whether the profile lies strictly before the count line.
    #[inline]
    pub fn is_before(&self, count_line: f32) -> bool {
        self.position.y < count_line
    }
}
