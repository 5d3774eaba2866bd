//! Production image primitive backed by the `image` crate.
//!
//! Decodes with format guessing (JPEG, PNG, WebP, TIFF), crops before any
//! resize, resizes with Lanczos3, and always re-encodes to PNG regardless of
//! the source format.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, imageops::FilterType};

use super::geometry::PixelRect;
use super::primitive::{Dimensions, ImagePrimitive, ImagingError, TransformOps};

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImagePrimitive for ImageCodec {
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions, ImagingError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|err| ImagingError::Decode(err.to_string()))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|err| ImagingError::Decode(err.to_string()))?;
        Ok(Dimensions { width, height })
    }

    fn transform(&self, bytes: &[u8], ops: &TransformOps) -> Result<Vec<u8>, ImagingError> {
        let mut img = image::load_from_memory(bytes)
            .map_err(|err| ImagingError::Decode(err.to_string()))?;

        // Crop first: resize targets describe the final frame of the
        // already-cropped region.
        if let Some(rect) = &ops.crop {
            img = apply_crop(&img, rect)?;
        }

        if let Some((width, height)) = resize_target(&img, ops.width, ops.height) {
            img = img.resize_exact(width, height, FilterType::Lanczos3);
        }

        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|err| ImagingError::Encode(err.to_string()))?;
        Ok(buf)
    }
}

/// Round the resolved rectangle to whole pixels, clamp it to the frame, and
/// extract. Only a rectangle left without any area after clamping is an
/// error; a small float overshoot must not fail the request.
fn apply_crop(img: &DynamicImage, rect: &PixelRect) -> Result<DynamicImage, ImagingError> {
    let (src_w, src_h) = img.dimensions();

    let left = (rect.left.round().max(0.0) as u32).min(src_w);
    let top = (rect.top.round().max(0.0) as u32).min(src_h);
    let width = (rect.width.round().max(0.0) as u32).min(src_w - left);
    let height = (rect.height.round().max(0.0) as u32).min(src_h - top);

    if width == 0 || height == 0 {
        return Err(ImagingError::CropOutOfBounds {
            left: rect.left,
            top: rect.top,
            width: rect.width,
            height: rect.height,
            source_width: src_w,
            source_height: src_h,
        });
    }

    Ok(img.crop_imm(left, top, width, height))
}

/// Resolve the resize target. Both dimensions present are used exactly; a
/// single dimension derives the other from the current (post-crop) aspect
/// ratio; neither means no resize at all.
fn resize_target(img: &DynamicImage, width: Option<u32>, height: Option<u32>) -> Option<(u32, u32)> {
    let (cur_w, cur_h) = img.dimensions();
    match (width, height) {
        (Some(w), Some(h)) => Some((w, h)),
        (Some(w), None) => {
            let h = (f64::from(cur_h) * f64::from(w) / f64::from(cur_w)).round() as u32;
            Some((w, h.max(1)))
        }
        (None, Some(h)) => {
            let w = (f64::from(cur_w) * f64::from(h) / f64::from(cur_h)).round() as u32;
            Some((w.max(1), h))
        }
        (None, None) => None,
    }
}
