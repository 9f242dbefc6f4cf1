//! Identity service client surface.
//!
//! SYSTEM CONTEXT
//! ==============
//! The identity backend issues credentials, validates sessions and emits
//! change notifications. Everything above this module talks to it through the
//! object-safe [`IdentityClient`] trait, so the session store, guard and
//! orchestrator can run against the in-process [`memory::MemoryIdentity`] in
//! tests and against a hosted GoTrue service in production.
//!
//! Provider payloads are normalized here into the closed [`AuthChange`] union
//! before any internal logic sees them.

pub mod gotrue;
pub mod memory;
pub mod subscription;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use subscription::{ListenerRegistry, Subscription};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by identity service operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Email/password pair was rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The stored session could not be validated (revoked, expired, corrupt).
    #[error("session invalid: {0}")]
    SessionInvalid(String),

    /// The HTTP request to the identity service failed.
    #[error("network error: {0}")]
    Network(String),

    /// The identity service returned a non-success HTTP status.
    #[error("identity API error: status {status}")]
    Api { status: u16, message: String },

    /// The response body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The configured client does not implement this operation.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// The user record conflicts with an existing one.
    #[error("user already registered")]
    AlreadyRegistered,
}

impl IdentityError {
    /// Short log-safe description.
    ///
    /// Provider messages, request URLs and response bodies are dropped; only
    /// the error kind and HTTP status survive.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::InvalidCredentials => "invalid credentials".to_owned(),
            Self::SessionInvalid(_) => "session invalid".to_owned(),
            Self::Network(_) => "network error".to_owned(),
            Self::Api { status, .. } => format!("identity API error (status {status})"),
            Self::Parse(_) => "response parse failed".to_owned(),
            Self::HttpClientBuild(_) => "HTTP client build failed".to_owned(),
            Self::Unsupported(op) => format!("operation not supported: {op}"),
            Self::AlreadyRegistered => "user already registered".to_owned(),
        }
    }

    /// Message suitable for showing to the person at the keyboard.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid credentials",
            Self::AlreadyRegistered => "An account with this email already exists",
            Self::Unsupported(_) => "This action is not available",
            _ => "Something went wrong, please try again",
        }
    }
}

// =============================================================================
// USER / SESSION
// =============================================================================

/// Authorization role attached to a user record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Editor,
}

impl Role {
    /// Parse a role name, case-insensitively. Unknown names yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            "editor" => Some(Self::Editor),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Editor => "editor",
        }
    }
}

/// Identity record associated 1:1 with an active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider-assigned user identifier.
    pub id: String,
    /// Login email, normalized to lowercase.
    pub email: String,
    /// Display name, if the user set one.
    pub display_name: Option<String>,
    /// Authorization role.
    #[serde(default)]
    pub role: Role,
}

impl User {
    /// Name to show in page chrome: display name, falling back to email.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Server-issued proof of authentication with an expiry.
///
/// Owned by the identity client; the session store only mirrors `user`.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: OffsetDateTime,
    pub user: User,
}

impl Session {
    /// True when the token has passed its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    /// A session can back a redirect only if it carries a token that is still valid.
    #[must_use]
    pub fn is_usable_at(&self, now: OffsetDateTime) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(now)
    }
}

// Tokens never reach logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

// =============================================================================
// CHANGE NOTIFICATIONS
// =============================================================================

/// Closed set of auth change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl AuthEvent {
    /// Parse a provider event name (`SIGNED_IN`, `TOKEN_REFRESHED`, ...).
    #[must_use]
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "INITIAL_SESSION" => Some(Self::InitialSession),
            "SIGNED_IN" => Some(Self::SignedIn),
            "SIGNED_OUT" => Some(Self::SignedOut),
            "TOKEN_REFRESHED" => Some(Self::TokenRefreshed),
            "USER_UPDATED" => Some(Self::UserUpdated),
            "PASSWORD_RECOVERY" => Some(Self::PasswordRecovery),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }

    /// Events whose payload session is authoritative for the current user.
    #[must_use]
    pub fn carries_session(self) -> bool {
        matches!(self, Self::SignedIn | Self::SignedOut | Self::TokenRefreshed | Self::UserUpdated)
    }
}

/// A normalized change notification: event plus the session after the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    /// Normalize a raw provider notification. Unknown event names are rejected.
    #[must_use]
    pub fn from_wire(event: &str, session: Option<Session>) -> Option<Self> {
        AuthEvent::from_wire(event).map(|event| Self { event, session })
    }
}

/// Callback invoked for every change notification.
pub type AuthListener = Arc<dyn Fn(&AuthChange) + Send + Sync>;

// =============================================================================
// CLIENT TRAIT
// =============================================================================

/// Provider-neutral async identity client. Enables mocking in tests.
#[async_trait::async_trait]
pub trait IdentityClient: Send + Sync {
    /// Return the current session, validating it with the provider.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] when the session check itself fails.
    /// Absence of a session is `Ok(None)`, not an error.
    async fn get_session(&self) -> Result<Option<Session>, IdentityError>;

    /// Exchange an email/password pair for a session.
    ///
    /// # Errors
    ///
    /// [`IdentityError::InvalidCredentials`] on rejection, other variants on
    /// transport or provider failures.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Terminate the current session.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if the provider could not revoke the session.
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Register a new account. Returns a session when the provider signs the
    /// user in immediately, `None` when email confirmation is pending.
    ///
    /// # Errors
    ///
    /// Defaults to [`IdentityError::Unsupported`].
    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Option<Session>, IdentityError> {
        Err(IdentityError::Unsupported("sign_up"))
    }

    /// Register a change listener. Dropping or unsubscribing the returned
    /// handle stops delivery.
    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription;
}

/// Normalize an email address for lookup and comparison.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
