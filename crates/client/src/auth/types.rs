//! Authentication types
//!
//! Token pair held by the coordinator, wire types for the backend's
//! auth endpoints, and the diagnostic status projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An access/refresh token pair
///
/// The in-memory copy held by the coordinator is the source of truth;
/// the persisted copy in the token store is a durable backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived JWT sent as a Bearer header
    pub access_token: String,
    /// Long-lived opaque token exchanged for fresh pairs
    pub refresh_token: String,
}

impl TokenPair {
    /// Create a new token pair.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }
}

/// Body returned by `POST /api/auth/refresh`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// Fresh access token
    pub access_token: String,
    /// Rotated refresh token
    pub refresh_token: String,
}

/// Body returned by the login and register endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Access token for the new session
    pub access_token: String,
    /// Refresh token for the new session
    pub refresh_token: String,
    /// Profile of the authenticated user, when the endpoint returns one
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

/// Diagnostic snapshot of the current token state
///
/// Purely informational; nothing in the refresh pipeline consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    /// Whether an access token is currently held
    pub has_token: bool,
    /// Whether the held token's `exp` claim is still in the future
    pub valid: bool,
    /// Decoded expiry instant, when the token decodes
    pub expires_at: Option<DateTime<Utc>>,
    /// Whole minutes until expiry (negative once expired)
    pub minutes_until_expiry: Option<i64>,
    /// Whether the token falls inside the proactive refresh buffer
    pub will_refresh_soon: bool,
}

impl AuthStatus {
    /// Status reported when no token is held.
    #[must_use]
    pub const fn logged_out() -> Self {
        Self {
            has_token: false,
            valid: false,
            expires_at: None,
            minutes_until_expiry: None,
            will_refresh_soon: false,
        }
    }
}
