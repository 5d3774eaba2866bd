//! HTTP handlers for derivative production and stored-object serving.
//!
//! `derive_image` is the only component aware of the trigger shape: it maps
//! query parameters onto the pipeline and translates every pipeline failure
//! into an error response instead of a redirect. `serve_object` streams
//! stored payloads back out so redirect targets resolve against this
//! service when no CDN fronts the store.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::{AppState, errors::AppError};

/// Query params accepted by the derivative endpoint. `bucket` and `url`
/// override the process-wide defaults per request.
#[derive(Debug, Deserialize)]
pub struct DeriveQuery {
    pub key: Option<String>,
    pub bucket: Option<String>,
    pub url: Option<String>,
}

/// GET `/derive?key=...&bucket=...&url=...`
///
/// On success: `301` with `location = {url}/{key}` and an empty body. The
/// derivative has already been persisted when the redirect goes out.
pub async fn derive_image(
    State(state): State<AppState>,
    Query(query): Query<DeriveQuery>,
) -> Result<Response, AppError> {
    let Some(key) = query.key.as_deref().filter(|k| !k.is_empty()) else {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "missing required query parameter `key`",
        ));
    };
    let bucket = query.bucket.as_deref().unwrap_or(&state.defaults.bucket);
    let base_url = query.url.as_deref().unwrap_or(&state.defaults.public_url);

    let target = state.service.process(key, bucket, base_url).await?;

    let location = HeaderValue::from_str(&target.location).map_err(|_| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            "redirect location contains characters not allowed in a header",
        )
    })?;
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    response.headers_mut().insert(header::LOCATION, location);
    Ok(response)
}

/// GET `/{bucket}/{*key}` — stream a stored object with the content type and
/// cache directive it was stored with.
pub async fn serve_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (meta, file) = state.service.store.open_reader(&bucket, &key).await?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.size_bytes.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    if let Some(cache_control) = meta.cache_control.as_deref() {
        if let Ok(value) = HeaderValue::from_str(cache_control) {
            headers.insert(header::CACHE_CONTROL, value);
        }
    }
    if let Some(etag) = meta.etag.as_deref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }
    Ok(response)
}
