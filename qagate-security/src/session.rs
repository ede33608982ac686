//! Session provider seam and an in-memory mock.
//!
//! [`SessionProvider`] is the boundary to the external auth service. The
//! [`IdentityVerifier`](crate::IdentityVerifier) is its only consumer inside
//! qagate; everything else sees the cached [`AuthStatus`](crate::AuthStatus).

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use qagate_core::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An authenticated session as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            expires_at: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Errors reaching the session provider.
#[derive(Debug)]
pub enum SessionError {
    /// The provider could not be reached (network failure, timeout, 5xx).
    Unavailable(String),
    /// The provider answered but refused the stored credentials.
    Rejected(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Unavailable(msg) => write!(f, "session provider unavailable: {msg}"),
            SessionError::Rejected(msg) => write!(f, "session rejected: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Authentication state changes published by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl AuthEvent {
    /// Whether this event makes a cached auth status unusable.
    pub fn invalidates(&self) -> bool {
        !matches!(self, AuthEvent::UserUpdated)
    }
}

/// Source of truth for the caller's session.
///
/// `current_session` is one round trip to the auth service. Returning
/// `Ok(None)` means "nobody is signed in"; `Err` means the service could not
/// answer, which callers must keep distinguishable from a signed-out user.
pub trait SessionProvider: Send + Sync + 'static {
    fn current_session(&self) -> BoxFuture<'_, Result<Option<Session>, SessionError>>;

    /// Subscribe to sign-in/sign-out notifications, if the provider emits them.
    fn subscribe(&self) -> Option<broadcast::Receiver<AuthEvent>> {
        None
    }
}

// ── MockSessionProvider ────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum MockState {
    SignedIn(Session),
    SignedOut,
    Failing(String),
}

/// In-memory session provider for tests and local development.
///
/// Clones share state, so a test can hand one clone to a verifier and keep
/// another to sign in/out and to count round trips.
///
/// ```ignore
/// let provider = MockSessionProvider::signed_in("u-1", "jane@example.com");
/// let verifier = IdentityVerifier::new(provider.clone());
///
/// assert!(verifier.verify().await.is_authenticated);
/// assert_eq!(provider.calls(), 1);
/// ```
#[derive(Clone)]
pub struct MockSessionProvider {
    state: Arc<Mutex<MockState>>,
    calls: Arc<AtomicUsize>,
    delay: Arc<Mutex<Option<Duration>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl MockSessionProvider {
    /// A provider with nobody signed in.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Arc::new(Mutex::new(MockState::SignedOut)),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Arc::new(Mutex::new(None)),
            events,
        }
    }

    /// A provider with `user_id` already signed in.
    pub fn signed_in(user_id: &str, email: &str) -> Self {
        let provider = Self::new();
        provider.set_state(MockState::SignedIn(Session::new(user_id).with_email(email)));
        provider
    }

    /// Delay every round trip, to hold verifications in flight.
    pub fn with_delay(self, delay: Duration) -> Self {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = Some(delay);
        }
        self
    }

    /// Sign a session in and publish [`AuthEvent::SignedIn`].
    pub fn sign_in(&self, session: Session) {
        self.set_state(MockState::SignedIn(session));
        let _ = self.events.send(AuthEvent::SignedIn);
    }

    /// Sign out and publish [`AuthEvent::SignedOut`].
    pub fn sign_out(&self) {
        self.set_state(MockState::SignedOut);
        let _ = self.events.send(AuthEvent::SignedOut);
    }

    /// Make every following round trip fail as if the provider were down.
    pub fn fail_with(&self, detail: &str) {
        self.set_state(MockState::Failing(detail.to_string()));
    }

    /// Publish an arbitrary event without changing state.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    /// Number of round trips served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: MockState) {
        if let Ok(mut slot) = self.state.lock() {
            *slot = state;
        }
    }
}

impl Default for MockSessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProvider for MockSessionProvider {
    fn current_session(&self) -> BoxFuture<'_, Result<Option<Session>, SessionError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay.lock().ok().and_then(|d| *d);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let state = self
                .state
                .lock()
                .map(|s| s.clone())
                .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
            match state {
                MockState::SignedIn(session) => Ok(Some(session)),
                MockState::SignedOut => Ok(None),
                MockState::Failing(detail) => Err(SessionError::Unavailable(detail)),
            }
        })
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<AuthEvent>> {
        Some(self.events.subscribe())
    }
}
