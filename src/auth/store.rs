//! Session store: the single source of truth for [`AuthState`].
//!
//! ARCHITECTURE
//! ============
//! One store per running client, shared behind an `Arc`. It mirrors the
//! identity client's session into an observable `AuthState` and is fed by two
//! inputs only: the startup probe (`initialize`) and the change listener
//! installed by `subscribe`. Observers read snapshots or follow a
//! `tokio::sync::watch` channel; every write publishes.
//!
//! ORDERING
//! ========
//! Each applied notification bumps `generation`. A probe records the
//! generation when it is issued and is discarded on completion if any
//! notification landed in the meantime, so a slow startup check can never
//! overwrite a newer sign-in or sign-out. Notifications themselves apply in
//! arrival order; the last one wins and none are dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tokio::sync::watch;

use crate::identity::{AuthChange, AuthEvent, IdentityClient, Session, Subscription, User};

/// Client-visible projection of the session status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub user: Option<User>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    /// Startup state: nothing known yet.
    #[must_use]
    pub fn unknown() -> Self {
        Self { user: None, loading: true, error: None }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Coarse lifecycle phase. `error` is orthogonal and not a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthPhase {
    Unknown,
    Authenticated,
    Anonymous,
}

struct StoreInner {
    state: AuthState,
    generation: u64,
    resolved: bool,
}

pub struct SessionStore {
    client: Arc<dyn IdentityClient>,
    inner: Mutex<StoreInner>,
    tx: watch::Sender<AuthState>,
}

impl SessionStore {
    #[must_use]
    pub fn new(client: Arc<dyn IdentityClient>) -> Arc<Self> {
        let (tx, _rx) = watch::channel(AuthState::unknown());
        Arc::new(Self {
            client,
            inner: Mutex::new(StoreInner { state: AuthState::unknown(), generation: 0, resolved: false }),
            tx,
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &StoreInner) {
        self.tx.send_replace(inner.state.clone());
    }

    // =========================================================================
    // READ
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.lock().state.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.lock().state.user.clone()
    }

    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        let inner = self.lock();
        if inner.state.user.is_some() {
            AuthPhase::Authenticated
        } else if inner.resolved {
            AuthPhase::Anonymous
        } else {
            AuthPhase::Unknown
        }
    }

    /// Follow every published state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    // =========================================================================
    // INPUTS
    // =========================================================================

    /// Probe the identity client for an existing session.
    ///
    /// Never fails: a failed check is logged and treated as "no session".
    /// The result is discarded if a notification arrived while the probe was
    /// in flight.
    pub async fn initialize(&self) {
        let issued_at = self.lock().generation;
        let result = self.client.get_session().await;
        let session = match result {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e.redacted(), "initial session check failed; treating as signed out");
                None
            }
        };
        self.apply_probe(issued_at, session);
    }

    /// Install the change listener on the identity client.
    ///
    /// The listener holds only a weak reference, so notifications that
    /// arrive after the store is dropped are ignored.
    #[must_use = "dropping the subscription stops change delivery"]
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.client.on_auth_state_change(Arc::new(move |change: &AuthChange| {
            if let Some(store) = weak.upgrade() {
                store.handle_change(change);
            }
        }))
    }

    /// Apply one normalized notification.
    pub fn handle_change(self: &Arc<Self>, change: &AuthChange) {
        tracing::debug!(event = change.event.as_wire(), "auth state change");
        if !change.event.carries_session() {
            self.spawn_reprobe(change.event);
            return;
        }

        let user = match change.event {
            AuthEvent::SignedOut => None,
            _ => change.session.as_ref().map(|s| s.user.clone()),
        };
        let mut inner = self.lock();
        inner.generation += 1;
        inner.state.user = user;
        inner.state.loading = false;
        inner.resolved = true;
        self.publish(&inner);
    }

    fn apply_probe(&self, issued_at: u64, session: Option<Session>) {
        let mut inner = self.lock();
        if inner.generation != issued_at {
            tracing::debug!(issued_at, current = inner.generation, "session probe superseded by notification");
            return;
        }
        inner.state.user = session.map(|s| s.user);
        inner.state.loading = false;
        inner.resolved = true;
        self.publish(&inner);
    }

    /// Events without an authoritative payload trigger a fresh probe.
    fn spawn_reprobe(self: &Arc<Self>, event: AuthEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(event = event.as_wire(), "no runtime available; skipping session re-probe");
            return;
        };
        let weak = Arc::downgrade(self);
        handle.spawn(async move {
            if let Some(store) = weak.upgrade() {
                store.initialize().await;
            }
        });
    }

    // =========================================================================
    // ORCHESTRATOR HOOKS: touch `loading`/`error` only, never `user`.
    // =========================================================================

    pub(crate) fn begin_request(&self, clear_error: bool) {
        let mut inner = self.lock();
        inner.state.loading = true;
        if clear_error {
            inner.state.error = None;
        }
        self.publish(&inner);
    }

    pub(crate) fn record_login_failure(&self, message: &str) {
        let mut inner = self.lock();
        inner.state.error = Some(message.to_owned());
        inner.state.loading = false;
        self.publish(&inner);
    }

    pub(crate) fn settle(&self) {
        let mut inner = self.lock();
        inner.state.loading = false;
        self.publish(&inner);
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
