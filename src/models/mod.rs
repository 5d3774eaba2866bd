//! Request-scoped value objects.
//!
//! A [`transform_spec::TransformSpec`] is parsed once per request, read-only
//! afterwards, and discarded when the pipeline completes. Only its output is
//! ever persisted.

pub mod transform_spec;
