//! Navigation guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Run by the host router before any destination renders. The decision
//! itself (`decide`) is a pure function of the configuration, the request,
//! the outcome of the live session check and the current user; `evaluate`
//! performs the session check and logs the result.

use std::sync::Arc;

use crate::auth::redirect::{login_url, redirect_param, resolve_redirect};
use crate::auth::routes::{RoleCheck, RouteClass, check_role};
use crate::auth::store::SessionStore;
use crate::config::AuthConfig;
use crate::identity::{IdentityClient, User};

/// Destination being navigated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationRequest<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
}

impl<'a> NavigationRequest<'a> {
    #[must_use]
    pub fn new(path: &'a str, query: Option<&'a str>) -> Self {
        Self { path, query }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin { location: String },
    RedirectToApp { location: String },
    RedirectUnauthorized { location: String },
}

impl GuardDecision {
    /// Redirect target, `None` for `Allow`.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::RedirectToLogin { location }
            | Self::RedirectToApp { location }
            | Self::RedirectUnauthorized { location } => Some(location),
        }
    }

    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decide what to do with a navigation.
///
/// `session_error` is true when the identity client failed to validate the
/// stored session; the visitor is then treated as signed out.
#[must_use]
pub fn decide(
    config: &AuthConfig,
    request: &NavigationRequest<'_>,
    session_error: bool,
    user: Option<&User>,
) -> GuardDecision {
    let class = config.rules.classify(request.path);
    let to_login = || GuardDecision::RedirectToLogin { location: login_url(&config.login_path, Some(request.path)) };

    if session_error {
        return if class == RouteClass::Protected { to_login() } else { GuardDecision::Allow };
    }

    if class == RouteClass::Protected && user.is_none() {
        return to_login();
    }

    if let Some(required) = config.rules.required_role(request.path) {
        match check_role(user, required) {
            RoleCheck::Granted => {}
            RoleCheck::Denied => {
                return GuardDecision::RedirectUnauthorized { location: config.unauthorized_path.clone() };
            }
            RoleCheck::Unauthenticated => return to_login(),
        }
    }

    if class == RouteClass::AuthOnly && user.is_some() {
        let target = resolve_redirect(redirect_param(request.query), &config.default_landing);
        // Never bounce an authenticated visitor onto another auth-only page.
        let location = if config.rules.classify(&target) == RouteClass::AuthOnly {
            config.default_landing.clone()
        } else {
            target
        };
        return GuardDecision::RedirectToApp { location };
    }

    GuardDecision::Allow
}

pub struct NavigationGuard {
    client: Arc<dyn IdentityClient>,
    store: Arc<SessionStore>,
    config: Arc<AuthConfig>,
}

impl NavigationGuard {
    #[must_use]
    pub fn new(client: Arc<dyn IdentityClient>, store: Arc<SessionStore>, config: Arc<AuthConfig>) -> Self {
        Self { client, store, config }
    }

    /// Check the session and decide. Never fails: a broken session check
    /// forces a sign-out and fails closed for protected destinations.
    pub async fn evaluate(&self, request: &NavigationRequest<'_>) -> GuardDecision {
        let (session_error, user) = match self.client.get_session().await {
            Ok(Some(session)) => (false, Some(self.store.user().unwrap_or(session.user))),
            Ok(None) => (false, None),
            Err(e) => {
                tracing::warn!(path = request.path, error = %e.redacted(), "session check failed; clearing session");
                if let Err(e) = self.client.sign_out().await {
                    tracing::warn!(error = %e.redacted(), "forced sign-out failed");
                }
                (true, None)
            }
        };

        let decision = decide(&self.config, request, session_error, user.as_ref());
        match &decision {
            GuardDecision::Allow => tracing::debug!(path = request.path, "navigation allowed"),
            other => tracing::info!(
                path = request.path,
                to = other.location().unwrap_or_default(),
                signed_in = user.is_some(),
                "navigation redirected"
            ),
        }
        decision
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
