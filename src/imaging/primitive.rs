//! Image primitive interface and shared types.
//!
//! [`ImagePrimitive`] is the narrow seam between the pipeline and the pixel
//! library: a header-only dimension probe and a single transform call that
//! carries crop and resize parameters together. The production
//! implementation is [`ImageCodec`](super::codec::ImageCodec).

use thiserror::Error;

use super::geometry::PixelRect;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("could not decode source image: {0}")]
    Decode(String),
    #[error("could not encode derivative: {0}")]
    Encode(String),
    #[error(
        "crop rectangle at ({left}, {top}) sized {width}x{height} lies outside the {source_width}x{source_height} source"
    )]
    CropOutOfBounds {
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        source_width: u32,
        source_height: u32,
    },
}

/// Pixel dimensions of a decoded or probed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// One transform invocation: optional crop (applied first, always), optional
/// resize targets, fixed PNG output. A fully-empty ops value is a
/// pass-through re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransformOps {
    pub crop: Option<PixelRect>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Trait for the image codec collaborator.
///
/// `probe` must not decode pixel data; it only inspects headers. `transform`
/// owns rounding and bounds enforcement of the crop rectangle, the
/// crop-before-resize ordering, and the PNG re-encode.
pub trait ImagePrimitive: Send + Sync + 'static {
    /// Read the image's pixel dimensions from its header.
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions, ImagingError>;

    /// Decode, apply the requested operations, and re-encode as PNG.
    fn transform(&self, bytes: &[u8], ops: &TransformOps) -> Result<Vec<u8>, ImagingError>;
}
