//! Route classification.
//!
//! Pure prefix lookup: no I/O, no mutable state. Matching is a plain string
//! prefix, so `/admin` also covers `/admin-panel`.

use crate::config::{DEFAULT_ADMIN_PREFIXES, DEFAULT_AUTH_PREFIXES, DEFAULT_PROTECTED_PREFIXES};
use crate::identity::{Role, User};

/// Access class of a destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Requires an authenticated session.
    Protected,
    /// Only meaningful to signed-out visitors (login, register).
    AuthOnly,
    /// Everything else.
    Public,
}

/// A path prefix that additionally requires a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRule {
    pub prefix: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRules {
    pub protected_prefixes: Vec<String>,
    pub auth_prefixes: Vec<String>,
    pub role_rules: Vec<RoleRule>,
}

impl Default for RouteRules {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|p| (*p).to_owned()).collect::<Vec<_>>();
        Self {
            protected_prefixes: owned(DEFAULT_PROTECTED_PREFIXES),
            auth_prefixes: owned(DEFAULT_AUTH_PREFIXES),
            role_rules: DEFAULT_ADMIN_PREFIXES
                .iter()
                .map(|p| RoleRule { prefix: (*p).to_owned(), role: Role::Admin })
                .collect(),
        }
    }
}

impl RouteRules {
    /// Classify `path`. Total: every input maps to exactly one class.
    /// Protected wins when a path matches both lists.
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.protected_prefixes.iter().any(|p| has_prefix(path, p)) {
            RouteClass::Protected
        } else if self.auth_prefixes.iter().any(|p| has_prefix(path, p)) {
            RouteClass::AuthOnly
        } else {
            RouteClass::Public
        }
    }

    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        self.classify(path) == RouteClass::Protected
    }

    #[must_use]
    pub fn is_auth_only(&self, path: &str) -> bool {
        self.classify(path) == RouteClass::AuthOnly
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.classify(path) == RouteClass::Public
    }

    /// Role demanded by the first matching role rule, if any.
    #[must_use]
    pub fn required_role(&self, path: &str) -> Option<Role> {
        self.role_rules.iter().find(|rule| has_prefix(path, &rule.prefix)).map(|rule| rule.role)
    }
}

/// Outcome of a role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleCheck {
    Granted,
    Denied,
    Unauthenticated,
}

/// Exact-match role check; a different role is denied even if it is broader.
#[must_use]
pub fn check_role(user: Option<&User>, required: Role) -> RoleCheck {
    match user {
        None => RoleCheck::Unauthenticated,
        Some(user) if user.role == required => RoleCheck::Granted,
        Some(_) => RoleCheck::Denied,
    }
}

fn has_prefix(path: &str, prefix: &str) -> bool {
    !prefix.is_empty() && path.starts_with(prefix)
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
