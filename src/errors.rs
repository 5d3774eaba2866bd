use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::imaging::primitive::ImagingError;
use crate::services::blob_store::BlobStoreError;
use crate::services::derivative_service::DerivativeError;

/// A lightweight wrapper for handler-visible errors that keeps the message
/// local. Internal errors convert into this at the handler boundary, which
/// is the single point deciding status codes.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<BlobStoreError> for AppError {
    fn from(err: BlobStoreError) -> Self {
        let status = match &err {
            BlobStoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            BlobStoreError::InvalidKey | BlobStoreError::InvalidBucket { .. } => {
                StatusCode::BAD_REQUEST
            }
            BlobStoreError::Io(_) | BlobStoreError::Meta(_) => StatusCode::BAD_GATEWAY,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<DerivativeError> for AppError {
    fn from(err: DerivativeError) -> Self {
        match err {
            DerivativeError::SourceNotFound { .. } => AppError::not_found(err.to_string()),
            DerivativeError::Storage(inner) => AppError::from(inner),
            DerivativeError::Imaging(
                ImagingError::Decode(_) | ImagingError::CropOutOfBounds { .. },
            ) => AppError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            DerivativeError::Imaging(ImagingError::Encode(_)) => {
                AppError::internal(err.to_string())
            }
        }
    }
}
