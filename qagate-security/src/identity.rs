//! Cached, singleflight identity verification.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use qagate_core::IdentityConfig;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::session::{AuthEvent, Session, SessionProvider};

/// The caller's authentication state at one point in time.
///
/// `error` is set only when the session provider could not be reached; a
/// plain signed-out caller has `is_authenticated == false` and no error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    pub is_authenticated: bool,
    pub principal_id: Option<String>,
    pub email: Option<String>,
    pub verified_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl AuthStatus {
    fn authenticated(session: &Session) -> Self {
        Self {
            is_authenticated: true,
            principal_id: Some(session.user_id.clone()),
            email: session.email.clone(),
            verified_at: Utc::now(),
            error: None,
        }
    }

    fn anonymous() -> Self {
        Self {
            is_authenticated: false,
            principal_id: None,
            email: None,
            verified_at: Utc::now(),
            error: None,
        }
    }

    fn outage(detail: String) -> Self {
        Self {
            is_authenticated: false,
            principal_id: None,
            email: None,
            verified_at: Utc::now(),
            error: Some(detail),
        }
    }

    /// Whether this status comes from a provider failure rather than a missing session.
    pub fn is_outage(&self) -> bool {
        self.error.is_some()
    }

    /// Human-readable reason an unauthenticated status blocks an operation.
    pub fn denial_reason(&self) -> String {
        match &self.error {
            Some(detail) => format!("identity could not be verified ({detail})"),
            None => "no active session".to_string(),
        }
    }
}

struct CacheInner {
    status: Option<AuthStatus>,
    fetched_at: Option<Instant>,
    generation: u64,
}

struct VerifierInner {
    provider: Arc<dyn SessionProvider>,
    cache: RwLock<CacheInner>,
    flight: Mutex<()>,
    ttl: Duration,
    outage_ttl: Duration,
}

/// Resolves and caches the caller's [`AuthStatus`].
///
/// - A fresh cached status is returned without touching the provider.
/// - On a miss, exactly one round trip is made. Callers arriving while it is
///   in flight wait for it and receive the same status (singleflight).
/// - Provider failures never surface as errors: they resolve to an
///   unauthenticated status carrying the failure detail, cached for the
///   shorter `outage_ttl` so recovery is picked up quickly.
/// - [`invalidate`](Self::invalidate) drops the cache at once; a round trip
///   that was in flight when it happened does not repopulate it.
///
/// Clones share the same cache.
#[derive(Clone)]
pub struct IdentityVerifier {
    inner: Arc<VerifierInner>,
}

impl IdentityVerifier {
    /// Create a verifier with the default TTLs.
    pub fn new(provider: impl SessionProvider) -> Self {
        Self::with_config(Arc::new(provider), &IdentityConfig::default())
    }

    /// Create a verifier for a shared provider with explicit settings.
    pub fn with_config(provider: Arc<dyn SessionProvider>, config: &IdentityConfig) -> Self {
        Self {
            inner: Arc::new(VerifierInner {
                provider,
                cache: RwLock::new(CacheInner {
                    status: None,
                    fetched_at: None,
                    generation: 0,
                }),
                flight: Mutex::new(()),
                ttl: Duration::from_secs(config.cache_ttl_secs),
                outage_ttl: Duration::from_secs(config.outage_ttl_secs),
            }),
        }
    }

    /// The provider this verifier asks.
    pub fn provider(&self) -> Arc<dyn SessionProvider> {
        self.inner.provider.clone()
    }

    /// Resolve the current auth status, from cache when fresh.
    pub async fn verify(&self) -> AuthStatus {
        let observed = {
            let cache = self.read();
            if let Some(status) = self.fresh(&cache) {
                return status;
            }
            cache.generation
        };

        let _flight = self.inner.flight.lock().await;

        let started = {
            let cache = self.read();
            if let Some(status) = self.fresh(&cache) {
                return status;
            }
            // A flight completed while we were queued: share its result even
            // when it is already past its (short) outage TTL.
            if cache.generation != observed {
                if let Some(status) = &cache.status {
                    return status.clone();
                }
            }
            cache.generation
        };

        let status = self.fetch().await;

        let mut cache = self.write();
        if cache.generation == started {
            cache.status = Some(status.clone());
            cache.fetched_at = Some(Instant::now());
            cache.generation += 1;
        } else {
            tracing::debug!("auth cache invalidated during verification, result not cached");
        }
        status
    }

    /// The last resolved status, without any round trip.
    ///
    /// `None` until the first verification and after every invalidation.
    pub fn current(&self) -> Option<AuthStatus> {
        self.read().status.clone()
    }

    /// Drop the cached status. The next [`verify`](Self::verify) re-fetches.
    pub fn invalidate(&self) {
        let mut cache = self.write();
        cache.status = None;
        cache.fetched_at = None;
        cache.generation += 1;
        tracing::debug!("auth cache invalidated");
    }

    /// Apply an auth event published by the session provider.
    pub fn handle_event(&self, event: AuthEvent) {
        tracing::debug!(?event, "auth event");
        if event.invalidates() {
            self.invalidate();
        }
    }

    /// Follow the provider's event stream on a background task.
    ///
    /// Returns `None` when the provider does not publish events. The task
    /// ends when the provider drops its sender.
    pub fn listen(&self) -> Option<JoinHandle<()>> {
        self.follow(false)
    }

    /// Like [`listen`](Self::listen), but verifies again right after every
    /// invalidation so [`current`](Self::current) is repopulated without
    /// waiting for the next caller.
    ///
    /// Long-running services need this: the synchronous table accessor only
    /// reads the cached status and refuses while it is empty.
    pub fn listen_and_refresh(&self) -> Option<JoinHandle<()>> {
        self.follow(true)
    }

    fn follow(&self, refresh: bool) -> Option<JoinHandle<()>> {
        let mut events = self.inner.provider.subscribe()?;
        let verifier = self.clone();
        Some(tokio::spawn(async move {
            loop {
                let invalidated = match events.recv().await {
                    Ok(event) => {
                        verifier.handle_event(event);
                        event.invalidates()
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "auth event stream lagged, invalidating");
                        verifier.invalidate();
                        true
                    }
                    Err(RecvError::Closed) => break,
                };
                if refresh && invalidated {
                    verifier.verify().await;
                }
            }
        }))
    }

    async fn fetch(&self) -> AuthStatus {
        match self.inner.provider.current_session().await {
            Ok(Some(session)) if !session.is_expired() => {
                tracing::debug!(principal_id = %session.user_id, "session verified");
                AuthStatus::authenticated(&session)
            }
            Ok(Some(session)) => {
                tracing::debug!(principal_id = %session.user_id, "session expired");
                AuthStatus::anonymous()
            }
            Ok(None) => {
                tracing::debug!("no active session");
                AuthStatus::anonymous()
            }
            Err(err) => {
                tracing::warn!(error = %err, "session provider unreachable, treating caller as unauthenticated");
                AuthStatus::outage(err.to_string())
            }
        }
    }

    fn fresh(&self, cache: &CacheInner) -> Option<AuthStatus> {
        let status = cache.status.as_ref()?;
        let fetched_at = cache.fetched_at?;
        let ttl = if status.is_outage() {
            self.inner.outage_ttl
        } else {
            self.inner.ttl
        };
        (fetched_at.elapsed() < ttl).then(|| status.clone())
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner
            .cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
