//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. The
//! host plays a single signed-in client, so there is exactly one identity
//! client, one session store and one change subscription per process. All
//! fields are `Arc`-wrapped; cloning is cheap.

use std::sync::Arc;

use time::Duration;

use crate::auth::{AuthOrchestrator, NavigationGuard, SessionStore};
use crate::config::{AuthConfig, IdentityConfig};
use crate::identity::gotrue::GoTrueClient;
use crate::identity::memory::MemoryIdentity;
use crate::identity::{IdentityClient, IdentityError, Subscription};

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityClient>,
    pub store: Arc<SessionStore>,
    pub guard: Arc<NavigationGuard>,
    pub orchestrator: Arc<AuthOrchestrator>,
    pub config: Arc<AuthConfig>,
    /// Keeps the store subscribed for as long as any handle lives.
    subscription: Arc<Subscription>,
}

impl AppState {
    /// Wire the store, guard and orchestrator around `identity` and
    /// subscribe the store to change notifications.
    ///
    /// The store starts in the unknown state; call
    /// `state.store.initialize().await` to probe for an existing session.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityClient>, config: AuthConfig) -> Self {
        let config = Arc::new(config);
        let store = SessionStore::new(Arc::clone(&identity));
        let subscription = Arc::new(store.subscribe());
        let guard = NavigationGuard::new(Arc::clone(&identity), Arc::clone(&store), Arc::clone(&config));
        let orchestrator = AuthOrchestrator::new(Arc::clone(&identity), Arc::clone(&store), Arc::clone(&config));
        Self {
            identity,
            store,
            guard: Arc::new(guard),
            orchestrator: Arc::new(orchestrator),
            config,
            subscription,
        }
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }
}

/// Build the configured identity client.
///
/// # Errors
///
/// Returns an [`IdentityError`] if the HTTP client cannot be built or the
/// demo account cannot be seeded.
pub fn build_identity(config: &IdentityConfig) -> Result<Arc<dyn IdentityClient>, IdentityError> {
    match config {
        IdentityConfig::Memory { session_ttl_secs, demo } => {
            let identity = MemoryIdentity::new(Duration::seconds(*session_ttl_secs));
            if let Some(demo) = demo {
                identity.add_user(&demo.email, &demo.password, Some("Demo User"), demo.role)?;
                tracing::info!(email = %demo.email, role = demo.role.as_str(), "seeded demo account");
            }
            tracing::info!(ttl_secs = *session_ttl_secs, "using in-memory identity provider");
            Ok(Arc::new(identity))
        }
        IdentityConfig::GoTrue(gotrue) => {
            let client = GoTrueClient::new(gotrue)?;
            tracing::info!(base_url = %gotrue.base_url, "using GoTrue identity provider");
            Ok(Arc::new(client))
        }
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
