//! Login, logout and registration flows.
//!
//! ARCHITECTURE
//! ============
//! The orchestrator validates form input locally, then hands the identity
//! call to a spawned task. The task owns everything it needs and settles
//! `loading`/`error` on the store itself, so a caller that goes away (closed
//! tab, dropped request future) cannot leave the store stuck in `loading`.
//!
//! The orchestrator never writes `user`. A successful sign-in or sign-out is
//! reflected through the identity client's change notification.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::task::JoinError;

use crate::auth::redirect::resolve_redirect;
use crate::auth::routes::RouteClass;
use crate::auth::store::SessionStore;
use crate::config::AuthConfig;
use crate::identity::{IdentityClient, IdentityError, Session, User};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Shown for every failed sign-in, whatever the provider said.
pub const GENERIC_LOGIN_FAILURE: &str = "Invalid credentials";

const GENERIC_SERVICE_FAILURE: &str = "Something went wrong, please try again";

/// Errors surfaced to the login and register forms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("Please fill in all fields")]
    MissingFields,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,

    /// Provider or transport failure. Carries the user-facing message only.
    #[error("{0}")]
    Service(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub redirect: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// Signed out on a protected page; navigate to the login page.
    Redirect(String),
    /// Signed out somewhere public; stay put.
    Stay,
    /// The provider could not sign out. Already logged.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    SignedIn { redirect: String },
    ConfirmationRequired { redirect: String },
}

pub struct AuthOrchestrator {
    client: Arc<dyn IdentityClient>,
    store: Arc<SessionStore>,
    config: Arc<AuthConfig>,
}

impl AuthOrchestrator {
    #[must_use]
    pub fn new(client: Arc<dyn IdentityClient>, store: Arc<SessionStore>, config: Arc<AuthConfig>) -> Self {
        Self { client, store, config }
    }

    // =========================================================================
    // LOGIN
    // =========================================================================

    /// Sign in with an email/password pair.
    ///
    /// `redirect_to` is the raw `redirectTo` value from the login page URL;
    /// anything that is not a same-origin path falls back to the default
    /// landing page.
    ///
    /// # Errors
    ///
    /// [`LoginError::MissingFields`] before any network call when either
    /// field is blank, otherwise [`LoginError::InvalidCredentials`] or
    /// [`LoginError::Service`] when the identity call fails.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        redirect_to: Option<&str>,
    ) -> Result<LoginSuccess, LoginError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(LoginError::MissingFields);
        }

        self.store.begin_request(true);
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let (email, password) = (email.to_owned(), password.to_owned());
        let task = tokio::spawn(async move {
            let result = client.sign_in_with_password(&email, &password).await;
            settle_login(&store, result)
        });

        let session = match task.await {
            Ok(result) => result?,
            Err(e) => {
                abandoned("login", &e);
                self.store.record_login_failure(GENERIC_LOGIN_FAILURE);
                return Err(LoginError::Service(GENERIC_LOGIN_FAILURE));
            }
        };

        let redirect = self.landing(redirect_to);
        tracing::info!(user_id = %session.user.id, redirect = %redirect, "signed in");
        Ok(LoginSuccess { redirect, user: session.user })
    }

    // =========================================================================
    // LOGOUT
    // =========================================================================

    /// Sign out from `current_path`. Never fails; a provider failure is
    /// logged and reported as [`LogoutOutcome::Failed`].
    pub async fn logout(&self, current_path: &str) -> LogoutOutcome {
        self.store.begin_request(false);
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let task = tokio::spawn(async move {
            let result = client.sign_out().await;
            store.settle();
            result
        });

        match task.await {
            Ok(Ok(())) => {
                if self.config.rules.classify(current_path) == RouteClass::Protected {
                    tracing::info!(from = current_path, "signed out; leaving protected page");
                    LogoutOutcome::Redirect(self.config.login_path.clone())
                } else {
                    tracing::info!(from = current_path, "signed out");
                    LogoutOutcome::Stay
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e.redacted(), "sign-out failed");
                LogoutOutcome::Failed
            }
            Err(e) => {
                abandoned("logout", &e);
                self.store.settle();
                LogoutOutcome::Failed
            }
        }
    }

    // =========================================================================
    // REGISTER
    // =========================================================================

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Validation errors resolve locally without a network call. Provider
    /// failures become [`LoginError::Service`] with a user-facing message.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        confirm: &str,
        redirect_to: Option<&str>,
    ) -> Result<RegisterOutcome, LoginError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() || confirm.is_empty() {
            return Err(LoginError::MissingFields);
        }
        if password != confirm {
            return Err(LoginError::PasswordMismatch);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(LoginError::WeakPassword);
        }

        self.store.begin_request(true);
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let (email, password) = (email.to_owned(), password.to_owned());
        let task = tokio::spawn(async move {
            let result = client.sign_up(&email, &password).await;
            store.settle();
            result
        });

        match task.await {
            Ok(Ok(Some(session))) => {
                let redirect = self.landing(redirect_to);
                tracing::info!(user_id = %session.user.id, redirect = %redirect, "registered and signed in");
                Ok(RegisterOutcome::SignedIn { redirect })
            }
            Ok(Ok(None)) => {
                tracing::info!("registered; email confirmation pending");
                Ok(RegisterOutcome::ConfirmationRequired { redirect: self.config.verify_email_path.clone() })
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e.redacted(), "registration failed");
                Err(LoginError::Service(e.user_message()))
            }
            Err(e) => {
                abandoned("register", &e);
                self.store.settle();
                Err(LoginError::Service(GENERIC_SERVICE_FAILURE))
            }
        }
    }

    /// Sanitized post-login destination. Auth-only targets fall back to the
    /// default landing page so the guard does not bounce the user again.
    fn landing(&self, redirect_to: Option<&str>) -> String {
        let target = resolve_redirect(redirect_to, &self.config.default_landing);
        if self.config.rules.is_auth_only(&target) {
            self.config.default_landing.clone()
        } else {
            target
        }
    }
}

fn abandoned(op: &'static str, e: &JoinError) {
    tracing::error!(op, cancelled = e.is_cancelled(), "identity task did not complete");
}

/// Runs inside the spawned login task.
fn settle_login(store: &SessionStore, result: Result<Session, IdentityError>) -> Result<Session, LoginError> {
    let error = match result {
        Ok(session) if session.is_usable_at(OffsetDateTime::now_utc()) => {
            store.settle();
            return Ok(session);
        }
        Ok(_) => {
            tracing::warn!("sign-in returned an unusable session");
            LoginError::Service(GENERIC_LOGIN_FAILURE)
        }
        Err(IdentityError::InvalidCredentials) => {
            tracing::info!("sign-in rejected");
            LoginError::InvalidCredentials
        }
        Err(e) => {
            tracing::warn!(error = %e.redacted(), "sign-in failed");
            LoginError::Service(GENERIC_LOGIN_FAILURE)
        }
    };
    store.record_login_failure(GENERIC_LOGIN_FAILURE);
    Err(error)
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
