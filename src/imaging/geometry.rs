//! Pure crop-geometry resolution.
//!
//! No I/O and no clamping: percentages are projected onto the source frame
//! as-is, and the codec decides how to round and bound the result.

use crate::models::transform_spec::CropSpec;

use super::primitive::Dimensions;

/// Absolute crop region in pixel space. Offsets and extents are floats
/// because percentage projection rarely lands on whole pixels; rounding is
/// the codec's job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Project a percentage crop onto the source image's actual dimensions.
///
/// Each component is `percentage / 100 * source dimension`. Rectangles that
/// overshoot the frame are returned unchanged; bounds enforcement happens at
/// crop time.
pub fn resolve_crop(crop: &CropSpec, source: Dimensions) -> PixelRect {
    let width = f64::from(source.width);
    let height = f64::from(source.height);
    PixelRect {
        left: width * crop.x_pct / 100.0,
        top: height * crop.y_pct / 100.0,
        width: width * crop.width_pct / 100.0,
        height: height * crop.height_pct / 100.0,
    }
}
