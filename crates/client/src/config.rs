//! Client configuration
//!
//! Configuration for the Perch API client and its token coordinator.
//! Buffer windows control how far ahead of expiry a token is treated as
//! "expiring soon": the periodic watch uses the wider `refresh_buffer_secs`,
//! while the per-request pre-flight check uses the tighter
//! `request_buffer_secs` to cover the gap between watch ticks.

use std::time::Duration;

/// Default proactive refresh lead time for the periodic watch (5 minutes).
pub const DEFAULT_REFRESH_BUFFER_SECS: i64 = 300;

/// Default pre-flight refresh lead time for individual requests (1 minute).
pub const DEFAULT_REQUEST_BUFFER_SECS: i64 = 60;

/// Default interval between expiry checks by the watch task.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the Perch API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the backend API (e.g., "https://api.perch.app")
    pub base_url: String,
    /// Whether the periodic expiry watch refreshes tokens proactively
    pub auto_refresh_enabled: bool,
    /// Seconds before expiry at which the watch refreshes the token
    pub refresh_buffer_secs: i64,
    /// Seconds before expiry at which a request forces an inline refresh
    pub request_buffer_secs: i64,
    /// Interval between watch checks
    pub check_interval: Duration,
    /// Timeout applied to every HTTP request (delegated to the transport)
    pub timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration with defaults for the given base URL.
    ///
    /// A trailing `/` on the base URL is trimmed so endpoint paths can
    /// always start with one.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.perch.app".to_string(),
            auto_refresh_enabled: true,
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
            request_buffer_secs: DEFAULT_REQUEST_BUFFER_SECS,
            check_interval: DEFAULT_CHECK_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
