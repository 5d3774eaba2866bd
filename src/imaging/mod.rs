//! Image-processing seam.
//!
//! [`geometry`] holds the pure percentage-to-pixel math, [`primitive`] the
//! narrow interface the pipeline drives, and [`codec`] the production
//! implementation on the `image` crate. The pipeline never touches pixels
//! directly, which keeps it testable against a recording mock.

pub mod codec;
pub mod geometry;
pub mod primitive;

pub use codec::ImageCodec;
pub use geometry::{PixelRect, resolve_crop};
pub use primitive::{Dimensions, ImagePrimitive, ImagingError, TransformOps};
