/// Borrowed view of an interleaved RGB8 patch.
#[derive(Clone, Copy, Debug)]
pub struct RgbPatchView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major RGB, len = w*h*3
}

/// Owned interleaved RGB8 patch, typically a detection crop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RgbPatch {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl RgbPatch {
    /// Wrap a raw buffer. Returns `None` if the length is not `w * h * 3`.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        let expected = width.checked_mul(height)?.checked_mul(3)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// A patch filled with a single color.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width * height * 3)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn view(&self) -> RgbPatchView<'_> {
        RgbPatchView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

impl RgbPatchView<'_> {
    /// Iterate pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data
            .chunks_exact(3)
            .take(self.width * self.height)
            .map(|px| [px[0], px[1], px[2]])
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
