//! Service layer: the blob-storage collaborator and the derivative pipeline
//! that orchestrates fetch, transform, store, and redirect.

pub mod blob_store;
pub mod derivative_service;
