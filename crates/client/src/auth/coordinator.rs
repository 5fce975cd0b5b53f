//! Token lifecycle coordination
//!
//! [`TokenCoordinator`] owns the in-memory token pair and everything that
//! keeps it fresh: single-flight refresh against the backend, a periodic
//! expiry watch, and persistence through a [`TokenStore`].
//!
//! Concurrency model:
//! - The token pair lives behind an async `RwLock`; reads are cheap and
//!   frequent, writes happen only on install/refresh/clear.
//! - At most one refresh request is in flight at any time. Concurrent
//!   callers join the in-flight future and all observe the same outcome.
//! - The expiry watch is a spawned task with an explicit start/stop
//!   lifecycle; it is never started implicitly.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::claims::{self, ExpiryClaim};
use super::store::TokenStore;
use super::types::{AuthStatus, RefreshResponse, TokenPair};
use crate::config::ClientConfig;
use crate::testing::time::{Clock, SystemClock};

/// Refresh outcome shared between concurrent callers.
///
/// `Some(token)` carries the fresh access token; `None` means the refresh
/// failed terminally and the session was cleared.
type SharedRefresh = Shared<BoxFuture<'static, Option<String>>>;

struct CoordinatorInner<S, C> {
    http: reqwest::Client,
    refresh_url: String,
    store: S,
    clock: C,
    tokens: RwLock<Option<TokenPair>>,
    /// In-flight refresh, if any. Cleared by the refresh future itself.
    refresh_in_flight: Mutex<Option<SharedRefresh>>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
    auto_refresh_enabled: AtomicBool,
    refresh_buffer_secs: AtomicI64,
    check_interval: std::time::Duration,
}

/// Coordinates token storage, proactive refresh, and the expiry watch
///
/// Cheap to clone; clones share all state. Dropping the last clone aborts
/// the watch task.
pub struct TokenCoordinator<S: TokenStore + 'static, C: Clock + 'static> {
    inner: Arc<CoordinatorInner<S, C>>,
}

impl<S: TokenStore + 'static, C: Clock + 'static> Clone for TokenCoordinator<S, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: TokenStore + 'static> TokenCoordinator<S, SystemClock> {
    /// Create a coordinator using the real system clock.
    #[must_use]
    pub fn new(config: &ClientConfig, store: S) -> Self {
        Self::with_clock(config, store, SystemClock)
    }
}

impl<S: TokenStore + 'static, C: Clock + 'static> TokenCoordinator<S, C> {
    /// Create a coordinator with an explicit clock implementation.
    #[must_use]
    pub fn with_clock(config: &ClientConfig, store: S, clock: C) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            inner: Arc::new(CoordinatorInner {
                http,
                refresh_url: format!("{}/api/auth/refresh", config.base_url),
                store,
                clock,
                tokens: RwLock::new(None),
                refresh_in_flight: Mutex::new(None),
                watch_task: Mutex::new(None),
                auto_refresh_enabled: AtomicBool::new(config.auto_refresh_enabled),
                refresh_buffer_secs: AtomicI64::new(config.refresh_buffer_secs),
                check_interval: config.check_interval,
            }),
        }
    }

    /// Load any persisted token pair into memory.
    ///
    /// Returns whether a pair was found. Call once at startup, before
    /// starting the expiry watch.
    ///
    /// # Errors
    /// Returns an error if the store could not be read.
    pub async fn initialize(&self) -> Result<bool, crate::auth::store::StoreError> {
        match self.inner.store.load().await? {
            Some(pair) => {
                *self.inner.tokens.write().await = Some(pair);
                info!("restored persisted session");
                Ok(true)
            }
            None => {
                debug!("no persisted session found");
                Ok(false)
            }
        }
    }

    /// Install a token pair as the active session.
    ///
    /// The in-memory copy is updated first and is authoritative; a failure
    /// to persist is logged but does not fail the install.
    pub async fn install_tokens(&self, tokens: TokenPair) {
        *self.inner.tokens.write().await = Some(tokens.clone());
        if let Err(e) = self.inner.store.save(&tokens).await {
            warn!(error = %e, "failed to persist token pair; session continues in memory");
        }
    }

    /// Drop the active session from memory and the store.
    pub async fn clear_tokens(&self) {
        self.inner.clear_session().await;
    }

    /// Current access token, if a session is held.
    pub async fn access_token(&self) -> Option<String> {
        self.inner.tokens.read().await.as_ref().map(|pair| pair.access_token.clone())
    }

    /// Whether a session is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.inner.tokens.read().await.is_some()
    }

    /// Whether the held access token expires within `buffer_secs`.
    ///
    /// Returns false when no token is held; an undecodable token counts
    /// as expiring.
    pub async fn is_expiring_soon(&self, buffer_secs: i64) -> bool {
        let tokens = self.inner.tokens.read().await;
        tokens.as_ref().is_some_and(|pair| {
            claims::expires_within(
                &pair.access_token,
                buffer_secs,
                self.inner.clock.millis_since_epoch(),
            )
        })
    }

    /// Exchange the refresh token for a fresh pair.
    ///
    /// Single-flight: if a refresh is already in flight, this call joins
    /// it instead of issuing a second request, and both callers observe
    /// the same outcome. Returns the fresh access token, or `None` if the
    /// refresh failed and the session was cleared.
    pub async fn refresh(&self) -> Option<String> {
        CoordinatorInner::join_refresh(&self.inner).await
    }

    /// Run one expiry check, refreshing proactively when the token falls
    /// inside the refresh buffer.
    ///
    /// No-op when no token is held or auto-refresh is disabled. This is
    /// the same check the watch task runs on every tick.
    pub async fn check_and_refresh(&self) {
        CoordinatorInner::check_once(&self.inner).await;
    }

    /// Start the periodic expiry watch.
    ///
    /// Runs an immediate check, then one per configured interval. Calling
    /// this while a watch is running replaces the old task. The watch
    /// stops itself if a refresh it triggered fails terminally.
    pub fn start_expiry_watch(&self) {
        let mut guard = self.inner.watch_task.lock();
        if let Some(handle) = guard.take() {
            handle.abort();
            debug!("replacing running expiry watch");
        }
        let inner = Arc::clone(&self.inner);
        *guard = Some(tokio::spawn(async move {
            CoordinatorInner::watch_loop(&inner).await;
        }));
        debug!(interval_secs = self.inner.check_interval.as_secs(), "expiry watch started");
    }

    /// Stop the periodic expiry watch, if running.
    pub fn stop_expiry_watch(&self) {
        if let Some(handle) = self.inner.watch_task.lock().take() {
            handle.abort();
            debug!("expiry watch stopped");
        }
    }

    /// Whether the watch task is currently running.
    #[must_use]
    pub fn is_watch_running(&self) -> bool {
        self.inner.watch_task.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Reconfigure proactive refresh at runtime.
    ///
    /// Enabling starts (or restarts) the watch; disabling stops it.
    /// `buffer_secs`, when given, replaces the refresh buffer.
    pub fn set_auto_refresh(&self, enabled: bool, buffer_secs: Option<i64>) {
        if let Some(buffer) = buffer_secs {
            self.inner.refresh_buffer_secs.store(buffer, Ordering::Relaxed);
        }
        self.inner.auto_refresh_enabled.store(enabled, Ordering::Relaxed);
        info!(enabled, buffer_secs, "auto-refresh reconfigured");
        if enabled {
            self.start_expiry_watch();
        } else {
            self.stop_expiry_watch();
        }
    }

    /// Release background resources. Idempotent; also runs on drop of the
    /// last clone.
    pub fn cleanup(&self) {
        self.stop_expiry_watch();
    }

    /// Diagnostic snapshot of the session's expiry state.
    pub async fn status(&self) -> AuthStatus {
        let tokens = self.inner.tokens.read().await;
        let Some(pair) = tokens.as_ref() else {
            return AuthStatus::logged_out();
        };

        match claims::decode_expiry(&pair.access_token) {
            ExpiryClaim::Decoded { exp } => {
                let now_ms = i64::try_from(self.inner.clock.millis_since_epoch()).unwrap_or(i64::MAX);
                let remaining_ms = exp.saturating_mul(1000).saturating_sub(now_ms);
                let buffer_ms =
                    self.inner.refresh_buffer_secs.load(Ordering::Relaxed).saturating_mul(1000);
                AuthStatus {
                    has_token: true,
                    valid: remaining_ms > 0,
                    expires_at: chrono::DateTime::from_timestamp(exp, 0),
                    minutes_until_expiry: Some(remaining_ms / 60_000),
                    will_refresh_soon: remaining_ms <= buffer_ms,
                }
            }
            // An undecodable token is reported (and treated) as expired.
            ExpiryClaim::Invalid => AuthStatus {
                has_token: true,
                valid: false,
                expires_at: None,
                minutes_until_expiry: None,
                will_refresh_soon: true,
            },
        }
    }
}

impl<S: TokenStore + 'static, C: Clock + 'static> CoordinatorInner<S, C> {
    /// Join the in-flight refresh, or start one if none is running.
    ///
    /// The in-flight slot is released by the refresh future itself, so the
    /// slot is cleared even if every caller awaiting it is cancelled.
    async fn join_refresh(inner: &Arc<Self>) -> Option<String> {
        let shared = {
            let mut in_flight = inner.refresh_in_flight.lock();
            if let Some(existing) = in_flight.as_ref() {
                debug!("refresh already in flight; joining");
                existing.clone()
            } else {
                let fresh = Self::run_refresh(Arc::clone(inner)).boxed().shared();
                *in_flight = Some(fresh.clone());
                fresh
            }
        };
        shared.await
    }

    async fn run_refresh(inner: Arc<Self>) -> Option<String> {
        let outcome = inner.execute_refresh().await;
        // While a refresh is in flight the slot holds exactly this future,
        // so the unconditional clear releases the right one.
        inner.refresh_in_flight.lock().take();
        outcome
    }

    async fn execute_refresh(&self) -> Option<String> {
        let refresh_token =
            self.tokens.read().await.as_ref().map(|pair| pair.refresh_token.clone());
        let Some(refresh_token) = refresh_token else {
            warn!("refresh requested without a session");
            self.clear_session().await;
            return None;
        };

        debug!("exchanging refresh token");
        let body = serde_json::json!({ "refreshToken": refresh_token });
        let response = self.http.post(&self.refresh_url).json(&body).send().await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<RefreshResponse>().await {
                Ok(fresh) => {
                    let pair = TokenPair::new(fresh.access_token, fresh.refresh_token);
                    let access = pair.access_token.clone();
                    *self.tokens.write().await = Some(pair.clone());
                    if let Err(e) = self.store.save(&pair).await {
                        warn!(error = %e, "failed to persist refreshed tokens; keeping in-memory pair");
                    }
                    info!("access token refreshed");
                    Some(access)
                }
                Err(e) => {
                    error!(error = %e, "refresh response body was not a token pair");
                    self.clear_session().await;
                    None
                }
            },
            Ok(resp) => {
                warn!(status = resp.status().as_u16(), "refresh rejected by server");
                self.clear_session().await;
                None
            }
            Err(e) => {
                warn!(error = %e, "refresh request failed");
                self.clear_session().await;
                None
            }
        }
    }

    async fn clear_session(&self) {
        *self.tokens.write().await = None;
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear persisted tokens");
        }
    }

    /// One watch tick. Returns false when a refresh triggered here failed
    /// terminally and the watch should stop.
    async fn check_once(inner: &Arc<Self>) -> bool {
        if !inner.auto_refresh_enabled.load(Ordering::Relaxed) {
            return true;
        }
        let expiring = {
            let tokens = inner.tokens.read().await;
            tokens.as_ref().map(|pair| {
                claims::expires_within(
                    &pair.access_token,
                    inner.refresh_buffer_secs.load(Ordering::Relaxed),
                    inner.clock.millis_since_epoch(),
                )
            })
        };
        if expiring != Some(true) {
            return true;
        }

        info!("access token expiring soon; refreshing proactively");
        if Self::join_refresh(inner).await.is_some() {
            return true;
        }
        // The session was cleared; keep ticking only if another task
        // installed tokens in the meantime.
        inner.tokens.read().await.is_some()
    }

    async fn watch_loop(inner: &Arc<Self>) {
        let mut ticker = tokio::time::interval(inner.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // First tick resolves immediately, giving the start-up check.
            ticker.tick().await;
            if !Self::check_once(inner).await {
                warn!("expiry watch stopping after terminal refresh failure");
                break;
            }
        }
    }
}

impl<S, C> Drop for CoordinatorInner<S, C> {
    fn drop(&mut self) {
        if let Some(handle) = self.watch_task.lock().take() {
            handle.abort();
        }
    }
}
