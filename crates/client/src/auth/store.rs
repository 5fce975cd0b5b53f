//! Token persistence
//!
//! Trait seam over secure storage so the coordinator can be tested with
//! an in-memory store, plus the OS-keychain implementation used in
//! production.

use async_trait::async_trait;
use keyring::Entry;
use thiserror::Error;
use tracing::debug;

use super::types::TokenPair;

/// Errors surfaced by token store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying secure storage rejected the operation
    #[error("keychain operation failed: {0}")]
    Keychain(#[from] keyring::Error),
    /// A stored value could not be interpreted
    #[error("stored token data is corrupt: {0}")]
    Corrupt(String),
}

/// Persistence seam for token pairs
///
/// Implementations must be safe to call concurrently; the coordinator
/// serializes writes but reads may race with them.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the persisted token pair, if one exists.
    ///
    /// # Errors
    /// Returns an error only for storage failures; an absent pair is
    /// `Ok(None)`.
    async fn load(&self) -> Result<Option<TokenPair>, StoreError>;

    /// Persist a token pair, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if the pair could not be written.
    async fn save(&self, tokens: &TokenPair) -> Result<(), StoreError>;

    /// Remove the persisted token pair. Idempotent.
    ///
    /// # Errors
    /// Returns an error only for storage failures; clearing an empty
    /// store succeeds.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Token store backed by the operating system keychain
///
/// Access and refresh tokens are stored as two entries under the same
/// service name.
#[derive(Debug, Clone)]
pub struct KeychainTokenStore {
    service: String,
}

const ACCESS_TOKEN_USER: &str = "perch.access_token";
const REFRESH_TOKEN_USER: &str = "perch.refresh_token";

impl KeychainTokenStore {
    /// Create a store scoped to the given keychain service name.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn entry(&self, user: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, user)?)
    }

    fn read_entry(&self, user: &str) -> Result<Option<String>, StoreError> {
        match self.entry(user)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_entry(&self, user: &str) -> Result<(), StoreError> {
        match self.entry(user)?.delete_credential() {
            // Deleting a missing entry keeps clear() idempotent.
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for KeychainTokenStore {
    fn default() -> Self {
        Self::new("app.perch.client")
    }
}

#[async_trait]
impl TokenStore for KeychainTokenStore {
    async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        let access = self.read_entry(ACCESS_TOKEN_USER)?;
        let refresh = self.read_entry(REFRESH_TOKEN_USER)?;
        match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => {
                Ok(Some(TokenPair { access_token, refresh_token }))
            }
            // A half-written pair is unusable; report it as absent.
            _ => Ok(None),
        }
    }

    async fn save(&self, tokens: &TokenPair) -> Result<(), StoreError> {
        self.entry(ACCESS_TOKEN_USER)?.set_password(&tokens.access_token)?;
        self.entry(REFRESH_TOKEN_USER)?.set_password(&tokens.refresh_token)?;
        debug!(service = %self.service, "token pair persisted to keychain");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.delete_entry(ACCESS_TOKEN_USER)?;
        self.delete_entry(REFRESH_TOKEN_USER)?;
        debug!(service = %self.service, "token pair cleared from keychain");
        Ok(())
    }
}
