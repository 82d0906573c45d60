use std::collections::VecDeque;

use tally_core::Detection;

/// Supplier of per-frame detections.
///
/// `poll` must not block indefinitely. `None` means "no frame this tick"; the
/// engine then skips the cycle with its state untouched. Any waiting for
/// hardware, with its own timeout, belongs inside the implementation.
pub trait DetectionSource {
    fn poll(&mut self) -> Option<Vec<Detection>>;
}

impl<F> DetectionSource for F
where
    F: FnMut() -> Option<Vec<Detection>>,
{
    fn poll(&mut self) -> Option<Vec<Detection>> {
        self()
    }
}

/// Scripted source replaying in-memory frames in order.
///
/// Yields `None` for scripted gaps and once exhausted.
#[derive(Clone, Debug, Default)]
pub struct VecSource {
    frames: VecDeque<Option<Vec<Detection>>>,
}

impl VecSource {
    pub fn new<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Option<Vec<Detection>>>,
    {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, frame: Option<Vec<Detection>>) {
        self.frames.push_back(frame);
    }

    /// Frames not yet polled.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.frames.is_empty()
    }
}

impl DetectionSource for VecSource {
    fn poll(&mut self) -> Option<Vec<Detection>> {
        self.frames.pop_front().flatten()
    }
}
