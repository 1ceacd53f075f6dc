//! Face region extraction: padded, frame-clamped box around the landmarks.

use crate::types::{BoundingBox, LandmarkSet};
use image::GrayImage;

/// Pixels added on every side of the tight landmark box.
pub const FACE_PADDING: i64 = 20;

/// Compute the face region for `landmarks` in a `width` x `height` frame.
///
/// Landmark coordinates are scaled to pixels and truncated; the tight box is
/// grown by [`FACE_PADDING`] and each edge is clamped into the frame, so the
/// result always satisfies `0 <= min <= max <= extent` on both axes.
pub fn face_region(landmarks: &LandmarkSet, width: u32, height: u32) -> BoundingBox {
    let (mut x_lo, mut x_hi) = (f32::INFINITY, f32::NEG_INFINITY);
    let (mut y_lo, mut y_hi) = (f32::INFINITY, f32::NEG_INFINITY);
    for p in landmarks.points() {
        let x = p.x * width as f32;
        let y = p.y * height as f32;
        x_lo = x_lo.min(x);
        x_hi = x_hi.max(x);
        y_lo = y_lo.min(y);
        y_hi = y_hi.max(y);
    }

    // `as` truncates toward zero and saturates; NaN maps to 0.
    let (x_min, x_max) = padded_span(x_lo as i64, x_hi as i64, width);
    let (y_min, y_max) = padded_span(y_lo as i64, y_hi as i64, height);

    BoundingBox { x_min, y_min, x_max, y_max }
}

fn padded_span(lo: i64, hi: i64, extent: u32) -> (u32, u32) {
    let extent = extent as i64;
    let lo = lo.min(hi);
    let min = lo.saturating_sub(FACE_PADDING).clamp(0, extent);
    let max = hi.saturating_add(FACE_PADDING).clamp(0, extent);
    (min as u32, max.max(min) as u32)
}

/// Crop `region` out of `image`. Returns `None` for a zero-area region.
pub fn crop(image: &GrayImage, region: &BoundingBox) -> Option<GrayImage> {
    if region.is_empty() {
        return None;
    }
    let crop = image::imageops::crop_imm(
        image,
        region.x_min,
        region.y_min,
        region.width(),
        region.height(),
    )
    .to_image();
    (crop.width() > 0 && crop.height() > 0).then_some(crop)
}
