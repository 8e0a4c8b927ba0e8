use std::sync::Arc;

use crate::{config::AuthSettings, handlers::Registry, store::Store};

/// Shared by every connection. Nothing in here is mutated after startup;
/// the store does its own locking.
pub struct ServerState<S> {
    pub(crate) store: Arc<S>,
    pub(crate) registry: Arc<Registry<S>>,
    pub(crate) auth: Arc<AuthSettings>,
}

impl<S: Store> ServerState<S> {
    /// State with the built-in handler set.
    pub fn new(store: S, auth: AuthSettings) -> Self {
        Self::with_registry(store, auth, Registry::with_defaults())
    }

    pub fn with_registry(store: S, auth: AuthSettings, registry: Registry<S>) -> Self {
        Self {
            store: Arc::new(store),
            registry: Arc::new(registry),
            auth: Arc::new(auth),
        }
    }
}

// Derived Clone would require `S: Clone`.
impl<S> Clone for ServerState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            auth: Arc::clone(&self.auth),
        }
    }
}
