//! Derivative pipeline.
//!
//! One linear flow per request, no retries, no shared mutable state: fetch
//! the original, resolve crop geometry against its actual dimensions, drive
//! the image primitive once, persist the PNG at the derived key, and
//! describe the redirect. Either the flow reaches "redirect produced" or it
//! fails terminally; nothing partial is ever persisted.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info};

use crate::imaging::geometry::resolve_crop;
use crate::imaging::primitive::{ImagePrimitive, ImagingError, TransformOps};
use crate::models::transform_spec::TransformSpec;
use crate::services::blob_store::{BlobStore, BlobStoreError};

/// Every derivative is PNG, regardless of the source format.
pub const DERIVATIVE_CONTENT_TYPE: &str = "image/png";

/// Two weeks. A derived key always encodes the same transform of the same
/// source, so CDNs and browsers can hold the artifact instead of asking the
/// pipeline to recompute it.
pub const DERIVATIVE_CACHE_CONTROL: &str = "public, max-age=1209600";

#[derive(Debug, Error)]
pub enum DerivativeError {
    #[error("source object `{key}` not found in bucket `{bucket}`")]
    SourceNotFound { bucket: String, key: String },
    #[error(transparent)]
    Storage(BlobStoreError),
    #[error(transparent)]
    Imaging(#[from] ImagingError),
}

impl From<BlobStoreError> for DerivativeError {
    fn from(err: BlobStoreError) -> Self {
        match err {
            BlobStoreError::NotFound { bucket, key } => {
                DerivativeError::SourceNotFound { bucket, key }
            }
            other => DerivativeError::Storage(other),
        }
    }
}

pub type DerivativeResult<T> = Result<T, DerivativeError>;

/// Terminal success state of a request: where the client is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub location: String,
}

/// Orchestrates the storage and image-primitive collaborators for one
/// request at a time. Cloned freely into handlers; the primitive is shared
/// behind an `Arc`.
pub struct DerivativeService<S, P> {
    pub store: S,
    pub primitive: Arc<P>,
}

impl<S: Clone, P> Clone for DerivativeService<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            primitive: Arc::clone(&self.primitive),
        }
    }
}

impl<S: BlobStore, P: ImagePrimitive> DerivativeService<S, P> {
    pub fn new(store: S, primitive: P) -> Self {
        Self {
            store,
            primitive: Arc::new(primitive),
        }
    }

    /// Run the transform for one parsed spec and return the PNG bytes.
    ///
    /// The dimension probe only happens when a crop is requested; crops
    /// resolve against the source image's real dimensions, never against the
    /// resize targets.
    pub async fn render(&self, spec: &TransformSpec, bucket: &str) -> DerivativeResult<Vec<u8>> {
        let original = self.store.get(bucket, &spec.original_key).await?;

        let crop = match &spec.crop {
            Some(crop_spec) => {
                let dims = self.primitive.probe(&original.bytes)?;
                let rect = resolve_crop(crop_spec, dims);
                debug!(
                    source_width = dims.width,
                    source_height = dims.height,
                    left = rect.left,
                    top = rect.top,
                    "resolved crop geometry"
                );
                Some(rect)
            }
            None => None,
        };

        let ops = TransformOps {
            crop,
            width: spec.width,
            height: spec.height,
        };
        Ok(self.primitive.transform(&original.bytes, &ops)?)
    }

    /// Persist derivative bytes at the derived key with the fixed content
    /// type and the long-lived cache directive.
    pub async fn store_derivative(
        &self,
        spec: &TransformSpec,
        bucket: &str,
        bytes: Vec<u8>,
    ) -> DerivativeResult<()> {
        self.store
            .put(
                bucket,
                &spec.derived_key,
                Bytes::from(bytes),
                DERIVATIVE_CONTENT_TYPE,
                Some(DERIVATIVE_CACHE_CONTROL),
            )
            .await?;
        Ok(())
    }

    /// Full request flow: parse the key, render, store, and build the
    /// redirect target `{base_url}/{key}`. The redirect is only produced
    /// after a successful write.
    pub async fn process(
        &self,
        key: &str,
        bucket: &str,
        base_url: &str,
    ) -> DerivativeResult<RedirectTarget> {
        let spec = TransformSpec::parse(key);
        debug!(
            key,
            original_key = %spec.original_key,
            width = ?spec.width,
            height = ?spec.height,
            crop = spec.crop.is_some(),
            "parsed transform key"
        );

        let bytes = self.render(&spec, bucket).await?;
        self.store_derivative(&spec, bucket, bytes).await?;
        info!(key, bucket, "stored derivative");

        Ok(RedirectTarget {
            location: format!("{}/{}", base_url, spec.derived_key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::geometry::PixelRect;
    use crate::imaging::primitive::Dimensions;
    use crate::imaging::primitive::tests::{MockPrimitive, RecordedCall};
    use crate::services::blob_store::tests::MemoryBlobStore;

    const BUCKET: &str = "images";
    const BASE_URL: &str = "http://cdn.test";

    fn seeded_service(
        keys: &[&str],
        primitive: MockPrimitive,
    ) -> DerivativeService<MemoryBlobStore, MockPrimitive> {
        let store = MemoryBlobStore::new();
        for key in keys {
            store.seed(BUCKET, key, b"source-bytes", "image/jpeg");
        }
        DerivativeService::new(store, primitive)
    }

    #[tokio::test]
    async fn width_marker_reaches_primitive_unchanged() {
        let service = seeded_service(&["test"], MockPrimitive::new());

        let target = service.process("w_500/test", BUCKET, BASE_URL).await.unwrap();

        assert_eq!(target.location, "http://cdn.test/w_500/test");
        assert_eq!(
            service.primitive.recorded(),
            vec![RecordedCall::Transform {
                crop: None,
                width: Some(500),
                height: None,
            }]
        );
    }

    #[tokio::test]
    async fn both_resize_markers_reach_primitive() {
        let service = seeded_service(&["test"], MockPrimitive::new());

        service.process("w_500/h_20/test", BUCKET, BASE_URL).await.unwrap();

        assert_eq!(
            service.primitive.recorded(),
            vec![RecordedCall::Transform {
                crop: None,
                width: Some(500),
                height: Some(20),
            }]
        );
    }

    #[tokio::test]
    async fn crop_resolves_against_probed_source_dimensions() {
        let primitive = MockPrimitive::with_dimensions(vec![Dimensions {
            width: 500,
            height: 333,
        }]);
        let service = seeded_service(&["test"], primitive);

        service
            .process("c_50,50,10,10/test", BUCKET, BASE_URL)
            .await
            .unwrap();

        assert_eq!(
            service.primitive.recorded(),
            vec![
                RecordedCall::Probe,
                RecordedCall::Transform {
                    crop: Some(PixelRect {
                        left: 250.0,
                        top: 166.5,
                        width: 50.0,
                        height: 33.3,
                    }),
                    width: None,
                    height: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn crop_and_resize_travel_in_one_call() {
        let primitive = MockPrimitive::with_dimensions(vec![Dimensions {
            width: 500,
            height: 333,
        }]);
        let service = seeded_service(&["test"], primitive);

        service
            .process("c_50,50,10,10/w_500/h_20/test", BUCKET, BASE_URL)
            .await
            .unwrap();

        assert_eq!(
            service.primitive.recorded(),
            vec![
                RecordedCall::Probe,
                RecordedCall::Transform {
                    crop: Some(PixelRect {
                        left: 250.0,
                        top: 166.5,
                        width: 50.0,
                        height: 33.3,
                    }),
                    width: Some(500),
                    height: Some(20),
                },
            ]
        );
    }

    #[tokio::test]
    async fn bare_key_skips_probe_and_passes_through() {
        let service = seeded_service(&["test"], MockPrimitive::new());

        let target = service.process("test", BUCKET, BASE_URL).await.unwrap();

        assert_eq!(target.location, "http://cdn.test/test");
        assert_eq!(
            service.primitive.recorded(),
            vec![RecordedCall::Transform {
                crop: None,
                width: None,
                height: None,
            }]
        );
    }

    #[tokio::test]
    async fn derivative_is_stored_with_png_and_cache_headers() {
        let service = seeded_service(&["test"], MockPrimitive::new());

        service.process("w_500/test", BUCKET, BASE_URL).await.unwrap();

        let blob = service.store.stored(BUCKET, "w_500/test").unwrap();
        assert_eq!(&blob.bytes[..], MockPrimitive::OUTPUT);
        assert_eq!(blob.meta.content_type, DERIVATIVE_CONTENT_TYPE);
        assert_eq!(
            blob.meta.cache_control.as_deref(),
            Some(DERIVATIVE_CACHE_CONTROL)
        );
    }

    #[tokio::test]
    async fn missing_source_fails_before_any_write() {
        let service = seeded_service(&[], MockPrimitive::new());

        let err = service
            .process("w_500/absent", BUCKET, BASE_URL)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DerivativeError::SourceNotFound { ref key, .. } if key == "absent"
        ));
        assert_eq!(service.store.put_count(), 0);
        assert!(service.primitive.recorded().is_empty());
    }

    #[tokio::test]
    async fn primitive_failure_aborts_before_any_write() {
        let service = seeded_service(&["test"], MockPrimitive::failing());

        let err = service.process("w_500/test", BUCKET, BASE_URL).await.unwrap_err();

        assert!(matches!(err, DerivativeError::Imaging(_)));
        assert_eq!(service.store.put_count(), 0);
    }

    #[tokio::test]
    async fn failed_write_produces_no_redirect() {
        let service = seeded_service(&["test"], MockPrimitive::new());
        service.store.fail_puts();

        let err = service.process("w_500/test", BUCKET, BASE_URL).await.unwrap_err();

        assert!(matches!(err, DerivativeError::Storage(_)));
    }

    #[tokio::test]
    async fn redirect_location_is_base_url_slash_key_verbatim() {
        let service = seeded_service(&["test"], MockPrimitive::new());

        let target = service
            .process("w_500/test", BUCKET, "http://cdn.test/images")
            .await
            .unwrap();

        assert_eq!(target.location, "http://cdn.test/images/w_500/test");
    }
}
