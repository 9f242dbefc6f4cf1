//! GoTrue (Supabase Auth) REST client.
//!
//! Thin HTTP wrapper over `/auth/v1/{token,user,logout,signup}`. The current
//! session lives in memory only; token persistence belongs to whoever embeds
//! the client (see [`GoTrueClient::restore_session`]). Wire parsing is pure
//! (`parse_session`, `parse_user`, `classify_error`) for testability.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use time::OffsetDateTime;

use super::{
    AuthChange, AuthEvent, AuthListener, IdentityClient, IdentityError, ListenerRegistry, Role, Session,
    Subscription, User,
};
use crate::config::GoTrueConfig;

/// Refresh this many seconds before the provider's stated expiry.
const EXPIRY_MARGIN_SECS: i64 = 10;

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    current: Mutex<Option<Session>>,
    listeners: ListenerRegistry,
}

impl GoTrueClient {
    /// # Errors
    ///
    /// Returns [`IdentityError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &GoTrueConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| IdentityError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            anon_key: config.anon_key.clone(),
            current: Mutex::new(None),
            listeners: ListenerRegistry::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn current(&self) -> Option<Session> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace(&self, session: Option<Session>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        self.listeners.emit(&AuthChange { event, session });
    }

    /// Adopt a session recovered from the embedder's token storage.
    /// Announced as `INITIAL_SESSION`; the next `get_session` validates it.
    pub fn restore_session(&self, session: Session) {
        self.replace(Some(session.clone()));
        self.emit(AuthEvent::InitialSession, Some(session));
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), IdentityError> {
        let response = request
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| IdentityError::Network(e.to_string()))?;
        Ok((status, text))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        let request = self
            .http
            .post(self.endpoint("token?grant_type=refresh_token"))
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        let (status, body) = self.send(request).await?;
        if status != 200 {
            return Err(classify_error(status, &body));
        }
        parse_session(&body, OffsetDateTime::now_utc())
    }

    async fn fetch_user(&self, access_token: &str) -> Result<User, IdentityError> {
        let request = self.http.get(self.endpoint("user")).bearer_auth(access_token);
        let (status, body) = self.send(request).await?;
        match status {
            200 => parse_user(&body),
            401 | 403 => Err(IdentityError::SessionInvalid(format!("user lookup rejected (status {status})"))),
            _ => Err(classify_error(status, &body)),
        }
    }
}

#[async_trait::async_trait]
impl IdentityClient for GoTrueClient {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        let Some(session) = self.current() else {
            return Ok(None);
        };

        let now = OffsetDateTime::now_utc();
        if session.is_expired_at(now + time::Duration::seconds(EXPIRY_MARGIN_SECS)) {
            let Some(refresh_token) = session.refresh_token.as_deref() else {
                return Err(IdentityError::SessionInvalid("expired without refresh token".into()));
            };
            tracing::debug!(user_id = %session.user.id, "access token near expiry; refreshing");
            return match self.refresh(refresh_token).await {
                Ok(fresh) => {
                    self.replace(Some(fresh.clone()));
                    self.emit(AuthEvent::TokenRefreshed, Some(fresh.clone()));
                    Ok(Some(fresh))
                }
                Err(IdentityError::InvalidCredentials | IdentityError::Api { status: 400 | 401 | 403, .. }) => {
                    Err(IdentityError::SessionInvalid("refresh token rejected".into()))
                }
                Err(e) => Err(e),
            };
        }

        let user = self.fetch_user(&session.access_token).await?;
        if user == session.user {
            return Ok(Some(session));
        }
        let updated = Session { user, ..session };
        self.replace(Some(updated.clone()));
        self.emit(AuthEvent::UserUpdated, Some(updated.clone()));
        Ok(Some(updated))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let request = self
            .http
            .post(self.endpoint("token?grant_type=password"))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let (status, body) = self.send(request).await?;
        if status != 200 {
            return Err(classify_error(status, &body));
        }
        let session = parse_session(&body, OffsetDateTime::now_utc())?;
        self.replace(Some(session.clone()));
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if let Some(session) = self.current() {
            let request = self.http.post(self.endpoint("logout")).bearer_auth(&session.access_token);
            let (status, body) = self.send(request).await?;
            // 401/403/404: the provider already considers the session gone.
            if matches!(status, 401 | 403 | 404) {
                tracing::debug!(status, "session already ended at provider");
            } else if !(200..300).contains(&status) {
                return Err(classify_error(status, &body));
            }
        }
        self.replace(None);
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, IdentityError> {
        let request = self
            .http
            .post(self.endpoint("signup"))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let (status, body) = self.send(request).await?;
        if !(200..300).contains(&status) {
            return Err(classify_error(status, &body));
        }
        let session = parse_signup(&body, OffsetDateTime::now_utc())?;
        if let Some(session) = &session {
            self.replace(Some(session.clone()));
            self.emit(AuthEvent::SignedIn, Some(session.clone()));
        }
        Ok(session)
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        self.listeners.register(listener)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct WireSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: WireUser,
}

#[derive(Deserialize)]
struct WireUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: WireMetadata,
    #[serde(default)]
    app_metadata: WireMetadata,
}

#[derive(Deserialize, Default)]
struct WireMetadata {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

impl From<WireUser> for User {
    fn from(wire: WireUser) -> Self {
        let display_name = wire
            .user_metadata
            .display_name
            .or(wire.user_metadata.full_name)
            .or(wire.user_metadata.name)
            .filter(|n| !n.trim().is_empty());
        let role = wire.app_metadata.role.as_deref().and_then(Role::parse).unwrap_or_default();
        Self { id: wire.id, email: wire.email.unwrap_or_default().to_ascii_lowercase(), display_name, role }
    }
}

fn parse_session(json: &str, now: OffsetDateTime) -> Result<Session, IdentityError> {
    let wire: WireSession = serde_json::from_str(json).map_err(|e| IdentityError::Parse(e.to_string()))?;
    let expires_at = match (wire.expires_at, wire.expires_in) {
        (Some(at), _) => OffsetDateTime::from_unix_timestamp(at).map_err(|e| IdentityError::Parse(e.to_string()))?,
        (None, Some(secs)) => now
            .checked_add(time::Duration::seconds(secs))
            .ok_or_else(|| IdentityError::Parse("expiry out of range".into()))?,
        (None, None) => return Err(IdentityError::Parse("session without expiry".into())),
    };
    Ok(Session { access_token: wire.access_token, refresh_token: wire.refresh_token, expires_at, user: wire.user.into() })
}

fn parse_user(json: &str) -> Result<User, IdentityError> {
    let wire: WireUser = serde_json::from_str(json).map_err(|e| IdentityError::Parse(e.to_string()))?;
    Ok(wire.into())
}

/// Sign-up returns a full session when auto-confirm is on, a bare user otherwise.
fn parse_signup(json: &str, now: OffsetDateTime) -> Result<Option<Session>, IdentityError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| IdentityError::Parse(e.to_string()))?;
    if value.get("access_token").is_some() {
        parse_session(json, now).map(Some)
    } else {
        Ok(None)
    }
}

fn classify_error(status: u16, body: &str) -> IdentityError {
    let wire: WireError = serde_json::from_str(body).unwrap_or_default();
    let code = wire.error_code.as_deref().or(wire.error.as_deref()).unwrap_or_default();
    let message = wire.error_description.or(wire.msg).or(wire.message).unwrap_or_default();

    match (status, code) {
        (400 | 401 | 422, "invalid_grant" | "invalid_credentials") => IdentityError::InvalidCredentials,
        (400 | 422, "user_already_exists" | "email_exists") => IdentityError::AlreadyRegistered,
        (422, _) if message.to_ascii_lowercase().contains("already registered") => IdentityError::AlreadyRegistered,
        _ => IdentityError::Api { status, message },
    }
}

#[cfg(test)]
#[path = "gotrue_test.rs"]
mod tests;
