//! In-process identity service.
//!
//! ARCHITECTURE
//! ============
//! Keeps user records and the single current session in memory. Passwords are
//! stored as salted SHA-256 digests; access tokens are random 32-byte hex
//! strings with a fixed TTL. Every state change is announced through the same
//! listener registry a hosted provider would use, so the session store cannot
//! tell the two apart.
//!
//! TRADE-OFFS
//! ==========
//! Emission happens after the state lock is released. A listener that reads
//! back through `get_session` therefore sees the post-change state. A separate
//! emit lock is held from each state change through its `emit`, so concurrent
//! sign-ins and sign-outs are announced in the order they were applied.
//! Listeners must not call back into the provider's mutating methods
//! synchronously.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Mutex, PoisonError};

use rand::Rng;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::{
    AuthChange, AuthEvent, AuthListener, IdentityClient, IdentityError, ListenerRegistry, Role, Session,
    Subscription, User, normalize_email,
};

pub const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // Writing to a String cannot fail.
        write!(s, "{b:02x}").unwrap_or_default();
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

struct StoredUser {
    user: User,
    salt: String,
    digest: String,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, StoredUser>,
    current: Option<Session>,
    failing_session_checks: u32,
    failing_sign_outs: u32,
}

/// In-memory [`IdentityClient`].
pub struct MemoryIdentity {
    state: Mutex<MemoryState>,
    emit_order: Mutex<()>,
    listeners: ListenerRegistry,
    ttl: Duration,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SESSION_TTL_SECS))
    }
}

impl MemoryIdentity {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            emit_order: Mutex::new(()),
            listeners: ListenerRegistry::new(),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Taken before the state lock, released after the matching `emit`.
    fn ordered(&self) -> std::sync::MutexGuard<'_, ()> {
        self.emit_order.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue_session(&self, user: User) -> Session {
        Session {
            access_token: generate_token(),
            refresh_token: Some(generate_token()),
            expires_at: OffsetDateTime::now_utc() + self.ttl,
            user,
        }
    }

    /// Create a user record without signing in.
    ///
    /// # Errors
    ///
    /// [`IdentityError::InvalidCredentials`] for a malformed email or empty
    /// password, [`IdentityError::AlreadyRegistered`] for a duplicate email.
    pub fn add_user(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
        role: Role,
    ) -> Result<User, IdentityError> {
        let email = normalize_email(email).ok_or(IdentityError::InvalidCredentials)?;
        if password.is_empty() {
            return Err(IdentityError::InvalidCredentials);
        }
        let mut state = self.lock();
        if state.users.contains_key(&email) {
            return Err(IdentityError::AlreadyRegistered);
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            display_name: display_name.map(str::to_owned),
            role,
        };
        let salt = generate_token();
        let digest = password_digest(&salt, password);
        state.users.insert(email, StoredUser { user: user.clone(), salt, digest });
        Ok(user)
    }

    /// Rotate the current session's tokens and announce `TOKEN_REFRESHED`.
    ///
    /// # Errors
    ///
    /// [`IdentityError::SessionInvalid`] when no session is active.
    pub fn refresh_session(&self) -> Result<Session, IdentityError> {
        let _order = self.ordered();
        let refreshed = {
            let mut state = self.lock();
            let user = state
                .current
                .as_ref()
                .map(|s| s.user.clone())
                .ok_or_else(|| IdentityError::SessionInvalid("no active session".into()))?;
            let session = self.issue_session(user);
            state.current = Some(session.clone());
            session
        };
        self.listeners.emit(&AuthChange { event: AuthEvent::TokenRefreshed, session: Some(refreshed.clone()) });
        Ok(refreshed)
    }

    /// Change the signed-in user's display name and announce `USER_UPDATED`.
    ///
    /// # Errors
    ///
    /// [`IdentityError::SessionInvalid`] when no session is active.
    pub fn update_display_name(&self, display_name: &str) -> Result<User, IdentityError> {
        let _order = self.ordered();
        let session = {
            let mut state = self.lock();
            let Some(current) = state.current.as_mut() else {
                return Err(IdentityError::SessionInvalid("no active session".into()));
            };
            current.user.display_name = Some(display_name.to_owned());
            let session = current.clone();
            if let Some(stored) = state.users.get_mut(&session.user.email) {
                stored.user.display_name = Some(display_name.to_owned());
            }
            session
        };
        let user = session.user.clone();
        self.listeners.emit(&AuthChange { event: AuthEvent::UserUpdated, session: Some(session) });
        Ok(user)
    }

    /// Make the next `count` session checks fail as if the stored token were corrupt.
    pub fn fail_next_session_checks(&self, count: u32) {
        self.lock().failing_session_checks = count;
    }

    /// Make the next `count` sign-out calls fail without touching the session.
    pub fn fail_next_sign_outs(&self, count: u32) {
        self.lock().failing_sign_outs = count;
    }

    /// Expire the current session in place, as if its TTL had elapsed.
    pub fn expire_session(&self) {
        if let Some(current) = self.lock().current.as_mut() {
            current.expires_at = OffsetDateTime::now_utc() - Duration::seconds(1);
        }
    }

    fn start_session(&self, user: User) -> Session {
        let session = self.issue_session(user);
        let _order = self.ordered();
        self.lock().current = Some(session.clone());
        self.listeners.emit(&AuthChange { event: AuthEvent::SignedIn, session: Some(session.clone()) });
        session
    }
}

#[async_trait::async_trait]
impl IdentityClient for MemoryIdentity {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        let mut state = self.lock();
        if state.failing_session_checks > 0 {
            state.failing_session_checks -= 1;
            return Err(IdentityError::SessionInvalid("stored session token rejected".into()));
        }
        let now = OffsetDateTime::now_utc();
        if state.current.as_ref().is_some_and(|s| s.is_expired_at(now)) {
            state.current = None;
        }
        Ok(state.current.clone())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let email = normalize_email(email).ok_or(IdentityError::InvalidCredentials)?;
        let user = {
            let state = self.lock();
            let stored = state.users.get(&email).ok_or(IdentityError::InvalidCredentials)?;
            if password_digest(&stored.salt, password) != stored.digest {
                return Err(IdentityError::InvalidCredentials);
            }
            stored.user.clone()
        };
        Ok(self.start_session(user))
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let _order = self.ordered();
        {
            let mut state = self.lock();
            if state.failing_sign_outs > 0 {
                state.failing_sign_outs -= 1;
                return Err(IdentityError::Network("sign-out request failed".into()));
            }
            state.current = None;
        }
        self.listeners.emit(&AuthChange { event: AuthEvent::SignedOut, session: None });
        Ok(())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, IdentityError> {
        let user = self.add_user(email, password, None, Role::User)?;
        Ok(Some(self.start_session(user)))
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        self.listeners.register(listener)
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
