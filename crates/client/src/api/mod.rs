//! HTTP API surface
//!
//! Request pipeline and the uniform result envelope.

pub mod client;
pub mod envelope;

pub use client::{ApiClient, RequestBody, RequestOptions, UploadField, UploadFieldKind};
pub use envelope::ApiResult;
