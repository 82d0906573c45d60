//! Detection patches from `image` frames.

use image::RgbImage;
use tally_core::{BoundingBox, Detection, RgbPatch};

/// Crop `bbox` out of `frame`, clipped to the frame bounds.
///
/// Returns `None` when nothing of the box lies inside the frame.
pub fn patch_from_image(frame: &RgbImage, bbox: &BoundingBox) -> Option<RgbPatch> {
    let (w, h) = frame.dimensions();
    let x0 = bbox.x_min.max(0.0).floor() as u32;
    let y0 = bbox.y_min.max(0.0).floor() as u32;
    let x1 = (bbox.x_max.ceil().max(0.0) as u32).min(w);
    let y1 = (bbox.y_max.ceil().max(0.0) as u32).min(h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let (cw, ch) = ((x1 - x0) as usize, (y1 - y0) as usize);
    let mut data = Vec::with_capacity(cw * ch * 3);
    for y in y0..y1 {
        for x in x0..x1 {
            data.extend_from_slice(&frame.get_pixel(x, y).0);
        }
    }
    RgbPatch::from_raw(cw, ch, data)
}

/// Build a detection from `bbox`, carrying its crop when one exists.
pub fn detection_from_image(frame: &RgbImage, bbox: &BoundingBox) -> Detection {
    let detection = Detection::from_bbox(bbox);
    match patch_from_image(frame, bbox) {
        Some(patch) => detection.with_patch(patch),
        None => detection,
    }
}
