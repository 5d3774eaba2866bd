//! On-demand image derivative service.
//!
//! A request key such as `c_50,50,10,10/w_500/h_20/photo.jpg` encodes a crop
//! and resize specification ahead of the source object's key. The service
//! fetches the original from blob storage, applies crop-then-resize, encodes
//! the result as PNG, persists it under the full request key, and answers
//! with a permanent redirect to the stored derivative. Long-lived
//! cache-control headers on the derivative keep repeat traffic off the
//! pipeline.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod imaging;
pub mod models;
pub mod routes;
pub mod services;

use imaging::ImageCodec;
use services::blob_store::FsBlobStore;
use services::derivative_service::DerivativeService;

/// Process-wide fallbacks for values a request may override per-call.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    /// Bucket used when the request carries no `bucket` parameter.
    pub bucket: String,
    /// Base URL for redirect locations when the request carries no `url`.
    pub public_url: String,
}

/// Shared state handed to every handler: the wired pipeline plus the
/// configured per-request defaults.
#[derive(Clone)]
pub struct AppState {
    pub service: DerivativeService<FsBlobStore, ImageCodec>,
    pub defaults: RequestDefaults,
}
