//! # Perch Client SDK
//!
//! Rust client for the Perch backend API. Centers on two types:
//!
//! - [`TokenCoordinator`]: owns the access/refresh token pair, refreshes
//!   it proactively before expiry (periodic watch plus per-request
//!   pre-flight check) and reactively on 401, with at most one refresh
//!   in flight at any time.
//! - [`ApiClient`]: wraps every request in the same pipeline and resolves
//!   it to an [`ApiResult`] envelope; failures are data, not panics or
//!   errors to unwind.
//!
//! ## Example
//!
//! ```no_run
//! use perch_client::{ApiClient, ClientConfig, KeychainTokenStore};
//!
//! # async fn run() {
//! let config = ClientConfig::new("https://api.perch.app");
//! let client = ApiClient::new(&config, KeychainTokenStore::default());
//!
//! // Restore a persisted session and keep it fresh in the background.
//! let _ = client.coordinator().initialize().await;
//! client.coordinator().start_expiry_watch();
//!
//! let venues: perch_client::ApiResult<serde_json::Value> =
//!     client.get("/api/venues/nearby").await;
//! if let Some(err) = venues.error {
//!     eprintln!("lookup failed ({}): {err}", venues.status);
//! }
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod testing;

pub use api::{ApiClient, ApiResult, RequestBody, RequestOptions, UploadField, UploadFieldKind};
pub use auth::{
    AuthStatus, ExpiryClaim, KeychainTokenStore, SessionResponse, StoreError, TokenCoordinator,
    TokenPair, TokenStore,
};
pub use config::ClientConfig;
