//! Listener fan-out and unsubscribe handles.
//!
//! DESIGN
//! ======
//! Listeners live in a shared `Vec` keyed by a monotonically increasing id.
//! A [`Subscription`] holds only a weak reference back to the list, so it can
//! outlive the client that issued it; unsubscribing after teardown is a no-op.
//! Delivery snapshots the listener list first and invokes callbacks with the
//! lock released, so a callback may register or drop subscriptions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::{AuthChange, AuthListener};

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, AuthListener)>,
}

/// Ordered list of change listeners owned by an identity client.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Listeners>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener; it receives every change emitted after this call.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn register(&self, listener: AuthListener) -> Subscription {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push((id, listener));
        Subscription { id, registry: Arc::downgrade(&self.inner), active: AtomicBool::new(true) }
    }

    /// Deliver `change` to every live listener in registration order.
    pub fn emit(&self, change: &AuthChange) {
        let listeners: Vec<AuthListener> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        tracing::debug!(event = change.event.as_wire(), listeners = listeners.len(), "auth change emitted");
        for listener in listeners {
            listener(change);
        }
    }

    /// Number of live listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by `on_auth_state_change`.
///
/// `unsubscribe` is idempotent and also runs on drop.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Listeners>>,
    active: AtomicBool,
}

impl Subscription {
    /// A handle that was never attached to any registry.
    #[must_use]
    pub fn detached() -> Self {
        Self { id: 0, registry: Weak::new(), active: AtomicBool::new(false) }
    }

    /// Stop delivery. Safe to call any number of times, before or after the
    /// issuing client is gone.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.registry.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.entries.retain(|(id, _)| *id != self.id);
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.registry.strong_count() > 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).field("active", &self.is_active()).finish()
    }
}

#[cfg(test)]
#[path = "subscription_test.rs"]
mod tests;
