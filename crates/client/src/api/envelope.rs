//! API result envelope
//!
//! Every request resolves to an [`ApiResult`]; failures are carried as
//! data rather than errors so call sites branch on the envelope instead
//! of unwinding.

use serde::Serialize;

/// Uniform outcome of an API request
///
/// On failure `data` is `None` and `error` holds a human-readable message.
/// On success `error` is `None`; `data` may still be `None` for a 2xx
/// response with no JSON body. `status` is the HTTP status code, or `0`
/// when the request never reached the server.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResult<T> {
    /// Parsed response body on success
    pub data: Option<T>,
    /// Failure message, present exactly when the request failed
    pub error: Option<String>,
    /// HTTP status code, 0 for transport-level failures
    pub status: u16,
}

impl<T> ApiResult<T> {
    /// Successful response with a parsed body.
    #[must_use]
    pub const fn ok(data: T, status: u16) -> Self {
        Self { data: Some(data), error: None, status }
    }

    /// Successful response with no JSON body (e.g. 204).
    #[must_use]
    pub const fn empty(status: u16) -> Self {
        Self { data: None, error: None, status }
    }

    /// Failed response.
    #[must_use]
    pub fn err(message: impl Into<String>, status: u16) -> Self {
        Self { data: None, error: Some(message.into()), status }
    }

    /// Request that never produced an HTTP response.
    #[must_use]
    pub fn transport(error: &reqwest::Error) -> Self {
        Self::err(error.to_string(), 0)
    }

    /// Whether the request succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
