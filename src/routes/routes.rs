//! Route table for the derivative service.
//!
//! ## Structure
//! - **Derivative endpoint**
//!   - `GET /derive?key=...&bucket=...&url=...` — produce (or overwrite) the
//!     derivative for `key` and answer with a 301 to its stored location
//!
//! - **Object serving**
//!   - `GET /{bucket}/{*key}` — stream a stored object (original or
//!     derivative) with its persisted headers
//!
//! - **Probes**
//!   - `GET /healthz` — liveness
//!   - `GET /readyz`  — readiness (disk check)
//!
//! The wildcard `*key` allows compound derivative keys like
//! `c_50,50,10,10/w_500/h_20/photo.jpg`.

use axum::{Router, routing::get};

use crate::{
    AppState,
    handlers::{
        derivative_handlers::{derive_image, serve_object},
        health_handlers::{healthz, readyz},
    },
};

/// Build and return the router for all endpoints.
///
/// The router carries shared state ([`AppState`]) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // derivative production
        .route("/derive", get(derive_image))
        // stored-object serving
        .route("/{bucket}/{*key}", get(serve_object))
}
