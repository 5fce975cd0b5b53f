//! Authentication and token lifecycle
//!
//! This module keeps the backend session alive without any caller
//! involvement:
//!
//! ```text
//! ┌─────────────┐     401 / pre-flight      ┌──────────────────┐
//! │  ApiClient   │ ────────────────────────▶ │ TokenCoordinator │
//! └─────────────┘                           │  single-flight   │
//!                                           │  refresh +       │
//! ┌─────────────┐   periodic tick           │  expiry watch    │
//! │ watch task   │ ────────────────────────▶ └────────┬─────────┘
//! └─────────────┘                                    │
//!                                           ┌────────▼─────────┐
//!                                           │    TokenStore    │
//!                                           │ (keychain / mem) │
//!                                           └──────────────────┘
//! ```
//!
//! Expiry comes from the access token's own `exp` claim, decoded locally
//! in [`claims`]. The in-memory pair held by the coordinator is the
//! source of truth; the store is a durable backup consulted at startup.

pub mod claims;
pub mod coordinator;
pub mod store;
pub mod types;

pub use claims::{decode_expiry, expires_within, ExpiryClaim};
pub use coordinator::TokenCoordinator;
pub use store::{KeychainTokenStore, StoreError, TokenStore};
pub use types::{AuthStatus, RefreshResponse, SessionResponse, TokenPair};
