//! Typed configuration parsed from environment variables.
//!
//! Every setting has a default so the host starts with an empty environment:
//! an in-memory identity provider seeded with a demo account, `/dashboard` and
//! `/admin` protected, `/auth` reserved for signed-out visitors.

use crate::auth::redirect::sanitize_redirect;
use crate::auth::routes::{RoleRule, RouteRules};
use crate::identity::Role;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";
pub const DEFAULT_UNAUTHORIZED_PATH: &str = "/unauthorized";
pub const DEFAULT_VERIFY_EMAIL_PATH: &str = "/auth/verify-email";
pub const DEFAULT_PROTECTED_PREFIXES: &[&str] = &["/dashboard", "/admin"];
pub const DEFAULT_AUTH_PREFIXES: &[&str] = &["/auth"];
pub const DEFAULT_ADMIN_PREFIXES: &[&str] = &["/admin"];
pub const DEFAULT_IDENTITY_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IDENTITY_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3600;
pub const DEFAULT_DEMO_EMAIL: &str = "demo@example.com";
pub const DEFAULT_DEMO_PASSWORD: &str = "password123";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("unknown IDENTITY_PROVIDER: {0}")]
    UnknownProvider(String),
}

// =============================================================================
// AUTH
// =============================================================================

/// Paths and route rules used by the guard and orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub login_path: String,
    pub default_landing: String,
    pub unauthorized_path: String,
    pub verify_email_path: String,
    pub rules: RouteRules,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            default_landing: DEFAULT_LANDING_PATH.to_owned(),
            unauthorized_path: DEFAULT_UNAUTHORIZED_PATH.to_owned(),
            verify_email_path: DEFAULT_VERIFY_EMAIL_PATH.to_owned(),
            rules: RouteRules::default(),
        }
    }
}

impl AuthConfig {
    /// Build from the process environment.
    ///
    /// Optional:
    /// - `AUTH_LOGIN_PATH`, `AUTH_DEFAULT_LANDING`, `AUTH_UNAUTHORIZED_PATH`,
    ///   `AUTH_VERIFY_EMAIL_PATH`: same-origin paths
    /// - `AUTH_PROTECTED_PREFIXES`, `AUTH_ONLY_PREFIXES`, `AUTH_ADMIN_PREFIXES`:
    ///   comma-separated path prefixes
    /// - `AUTH_ENFORCE_ROLES`: boolean, default true
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a path that is not same-origin.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Used by `from_env` and tests.
    ///
    /// # Errors
    ///
    /// See [`AuthConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |var: &'static str, default: &str| -> Result<String, ConfigError> {
            match lookup(var) {
                Some(raw) => parse_path(var, &raw),
                None => Ok(default.to_owned()),
            }
        };
        let prefixes = |var: &'static str, default: &[&str]| -> Result<Vec<String>, ConfigError> {
            match lookup(var) {
                Some(raw) => parse_prefix_list(var, &raw),
                None => Ok(default.iter().map(|p| (*p).to_owned()).collect()),
            }
        };

        let enforce_roles = match lookup("AUTH_ENFORCE_ROLES") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                var: "AUTH_ENFORCE_ROLES",
                reason: format!("expected a boolean, got {raw:?}"),
            })?,
            None => true,
        };
        let role_rules = if enforce_roles {
            prefixes("AUTH_ADMIN_PREFIXES", DEFAULT_ADMIN_PREFIXES)?
                .into_iter()
                .map(|prefix| RoleRule { prefix, role: Role::Admin })
                .collect()
        } else {
            Vec::new()
        };

        Ok(Self {
            login_path: path("AUTH_LOGIN_PATH", DEFAULT_LOGIN_PATH)?,
            default_landing: path("AUTH_DEFAULT_LANDING", DEFAULT_LANDING_PATH)?,
            unauthorized_path: path("AUTH_UNAUTHORIZED_PATH", DEFAULT_UNAUTHORIZED_PATH)?,
            verify_email_path: path("AUTH_VERIFY_EMAIL_PATH", DEFAULT_VERIFY_EMAIL_PATH)?,
            rules: RouteRules {
                protected_prefixes: prefixes("AUTH_PROTECTED_PREFIXES", DEFAULT_PROTECTED_PREFIXES)?,
                auth_prefixes: prefixes("AUTH_ONLY_PREFIXES", DEFAULT_AUTH_PREFIXES)?,
                role_rules,
            },
        })
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for IdentityTimeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_IDENTITY_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_IDENTITY_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Connection settings for a GoTrue-compatible auth service.
#[derive(Clone, PartialEq, Eq)]
pub struct GoTrueConfig {
    pub base_url: String,
    pub anon_key: String,
    pub timeouts: IdentityTimeouts,
}

impl std::fmt::Debug for GoTrueConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueConfig")
            .field("base_url", &self.base_url)
            .field("anon_key", &"<redacted>")
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// Account created in the in-memory provider at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct DemoAccount {
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl std::fmt::Debug for DemoAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoAccount")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityConfig {
    Memory { session_ttl_secs: i64, demo: Option<DemoAccount> },
    GoTrue(GoTrueConfig),
}

impl IdentityConfig {
    /// Build from the process environment.
    ///
    /// - `IDENTITY_PROVIDER`: `memory` (default) or `gotrue`
    /// - `gotrue` requires `GOTRUE_URL` and `GOTRUE_ANON_KEY`; honours
    ///   `IDENTITY_REQUEST_TIMEOUT_SECS` (10) and `IDENTITY_CONNECT_TIMEOUT_SECS` (5)
    /// - `memory` honours `SESSION_TTL_SECS` (3600), `DEMO_USER_EMAIL`,
    ///   `DEMO_USER_PASSWORD`, `DEMO_USER_ROLE`; `DEMO_USER_EMAIL=""` disables seeding
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an unknown provider or missing GoTrue settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`IdentityConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = lookup("IDENTITY_PROVIDER").unwrap_or_else(|| "memory".to_owned());
        match provider.trim().to_ascii_lowercase().as_str() {
            "memory" => {
                let email = lookup("DEMO_USER_EMAIL").unwrap_or_else(|| DEFAULT_DEMO_EMAIL.to_owned());
                let demo = if email.trim().is_empty() {
                    None
                } else {
                    let role = match lookup("DEMO_USER_ROLE") {
                        Some(raw) => Role::parse(&raw).ok_or(ConfigError::Invalid {
                            var: "DEMO_USER_ROLE",
                            reason: format!("unknown role {raw:?}"),
                        })?,
                        None => Role::Admin,
                    };
                    Some(DemoAccount {
                        email: email.trim().to_owned(),
                        password: lookup("DEMO_USER_PASSWORD").unwrap_or_else(|| DEFAULT_DEMO_PASSWORD.to_owned()),
                        role,
                    })
                };
                Ok(Self::Memory {
                    session_ttl_secs: parse_or(&lookup, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
                    demo,
                })
            }
            "gotrue" => {
                let base_url = lookup("GOTRUE_URL").ok_or(ConfigError::Missing("GOTRUE_URL"))?;
                let anon_key = lookup("GOTRUE_ANON_KEY").ok_or(ConfigError::Missing("GOTRUE_ANON_KEY"))?;
                if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
                    return Err(ConfigError::Invalid { var: "GOTRUE_URL", reason: "expected an http(s) URL".into() });
                }
                Ok(Self::GoTrue(GoTrueConfig {
                    base_url: base_url.trim_end_matches('/').to_owned(),
                    anon_key,
                    timeouts: IdentityTimeouts {
                        request_secs: parse_or(
                            &lookup,
                            "IDENTITY_REQUEST_TIMEOUT_SECS",
                            DEFAULT_IDENTITY_REQUEST_TIMEOUT_SECS,
                        )?,
                        connect_secs: parse_or(
                            &lookup,
                            "IDENTITY_CONNECT_TIMEOUT_SECS",
                            DEFAULT_IDENTITY_CONNECT_TIMEOUT_SECS,
                        )?,
                    },
                }))
            }
            other => Err(ConfigError::UnknownProvider(other.to_owned())),
        }
    }
}

// =============================================================================
// SERVER
// =============================================================================

/// Everything the host binary needs at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub auth: AuthConfig,
    pub identity: IdentityConfig,
}

impl ServerConfig {
    /// # Errors
    ///
    /// Propagates any [`ConfigError`] from the auth or identity sections, or
    /// an unparsable `PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            auth: AuthConfig::from_lookup(lookup)?,
            identity: IdentityConfig::from_lookup(lookup)?,
        })
    }
}

// =============================================================================
// PARSERS
// =============================================================================

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid { var, reason: e.to_string() }),
        None => Ok(default),
    }
}

fn parse_path(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    sanitize_redirect(raw.trim())
        .ok_or_else(|| ConfigError::Invalid { var, reason: format!("{raw:?} is not a same-origin path") })
}

fn parse_prefix_list(var: &'static str, raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.starts_with('/') {
                Ok(p.to_owned())
            } else {
                Err(ConfigError::Invalid { var, reason: format!("prefix {p:?} must start with '/'") })
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
