//! JSON configuration, recorded-frame replay and report helpers.

use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tally_core::{BoundingBox, CountingParams, Detection};
use tally_track::{DetectionSource, SessionReport};

#[derive(thiserror::Error, Debug)]
pub enum TallyIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Io(#[from] TallyIoError),
    #[error("frame {frame}, detection {index}: {reason}")]
    InvalidDetection {
        frame: usize,
        index: usize,
        reason: &'static str,
    },
}

/// Station settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub params: CountingParams,
    /// Recording replayed by `tally run` when `--frames` is not given.
    #[serde(default)]
    pub frames_path: Option<String>,
    #[serde(default)]
    pub report_path: Option<String>,
}

impl TallyConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TallyIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TallyIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn frames_path(&self) -> Option<PathBuf> {
        self.frames_path.as_ref().map(PathBuf::from)
    }

    pub fn report_path(&self) -> Option<PathBuf> {
        self.report_path.as_ref().map(PathBuf::from)
    }
}

/// One detection as stored in a recording: either a centroid with an area, or
/// an `xyxy` bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordedDetection {
    Bbox { bbox: [f32; 4] },
    Point { position: [f32; 2], area: f32 },
}

impl RecordedDetection {
    fn to_detection(self) -> Result<Detection, &'static str> {
        match self {
            Self::Bbox { bbox: [x0, y0, x1, y1] } => {
                if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
                    return Err("non-finite bounding box");
                }
                if x1 < x0 || y1 < y0 {
                    return Err("inverted bounding box");
                }
                Ok(Detection::from_bbox(&BoundingBox::new(x0, y0, x1, y1)))
            }
            Self::Point {
                position: [x, y],
                area,
            } => {
                if !(x.is_finite() && y.is_finite() && area.is_finite()) {
                    return Err("non-finite position or area");
                }
                if area < 0.0 {
                    return Err("negative area");
                }
                Ok(Detection::new(Point2::new(x, y), area))
            }
        }
    }
}

/// A recorded detector session. `None` frames are ticks where the detector
/// produced nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recording {
    pub frames: Vec<Option<Vec<RecordedDetection>>>,
}

impl Recording {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TallyIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TallyIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Detection source replaying a [`Recording`], one frame per poll.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    frames: VecDeque<Option<Vec<Detection>>>,
    polled: usize,
}

impl ReplaySource {
    /// Validate every recorded detection and queue the frames.
    pub fn from_recording(recording: Recording) -> Result<Self, ReplayError> {
        let mut frames = VecDeque::with_capacity(recording.frames.len());
        for (frame, recorded) in recording.frames.into_iter().enumerate() {
            let Some(recorded) = recorded else {
                frames.push_back(None);
                continue;
            };
            let detections = recorded
                .into_iter()
                .enumerate()
                .map(|(index, d)| {
                    d.to_detection()
                        .map_err(|reason| ReplayError::InvalidDetection {
                            frame,
                            index,
                            reason,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            frames.push_back(Some(detections));
        }
        debug!("replay source loaded with {} frames", frames.len());
        Ok(Self { frames, polled: 0 })
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        Self::from_recording(Recording::load_json(path)?)
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Frames handed out so far, gaps included.
    #[inline]
    pub fn polled(&self) -> usize {
        self.polled
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.frames.is_empty()
    }
}

impl DetectionSource for ReplaySource {
    fn poll(&mut self) -> Option<Vec<Detection>> {
        let frame = self.frames.pop_front()?;
        self.polled += 1;
        frame
    }
}

/// Write a session report to disk as pretty JSON.
pub fn write_report(report: &SessionReport, path: impl AsRef<Path>) -> Result<(), TallyIoError> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

/// Load a session report from JSON on disk.
pub fn load_report(path: impl AsRef<Path>) -> Result<SessionReport, TallyIoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
