//! Mock implementations for testing
//!
//! In-memory token store used by the unit and integration suites in
//! place of the OS keychain.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::auth::store::{StoreError, TokenStore};
use crate::auth::types::TokenPair;

/// In-memory token store for tests
///
/// Clones share state, so a test can keep a handle to inspect what the
/// coordinator persisted. Operation counters allow asserting that the
/// store was (or was not) touched.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<Mutex<Option<TokenPair>>>,
    save_count: Arc<AtomicUsize>,
    clear_count: Arc<AtomicUsize>,
    fail_next_save: Arc<AtomicBool>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a token pair.
    #[must_use]
    pub fn with_tokens(tokens: TokenPair) -> Self {
        let store = Self::new();
        // SAFETY: Mutex poisoning is acceptable in test mocks
        *store.tokens.lock().expect("mutex poisoned") = Some(tokens);
        store
    }

    /// Currently persisted token pair, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<TokenPair> {
        // SAFETY: Mutex poisoning is acceptable in test mocks
        self.tokens.lock().expect("mutex poisoned").clone()
    }

    /// Number of completed `save` calls.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Number of completed `clear` calls.
    #[must_use]
    pub fn clear_count(&self) -> usize {
        self.clear_count.load(Ordering::SeqCst)
    }

    /// Make the next `save` call fail with a storage error.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        Ok(self.snapshot())
    }

    async fn save(&self, tokens: &TokenPair) -> Result<(), StoreError> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Corrupt("simulated save failure".to_string()));
        }
        // SAFETY: Mutex poisoning is acceptable in test mocks
        *self.tokens.lock().expect("mutex poisoned") = Some(tokens.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        // SAFETY: Mutex poisoning is acceptable in test mocks
        *self.tokens.lock().expect("mutex poisoned") = None;
        self.clear_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
