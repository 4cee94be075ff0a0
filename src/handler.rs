//! Salvo middleware that saves registered sessions after each request

use salvo_core::{async_trait, Depot, FlowCtrl, Handler, Request, Response};
use std::sync::Arc;

use crate::registry::Registry;
use crate::store::SessionStore;

/// Session middleware for Salvo
///
/// Injects the store into the depot (see
/// [`SessionDepotExt`](crate::SessionDepotExt)) and, once the downstream
/// handlers ran, saves every session they obtained through
/// [`SessionStore::get`]. Sessions nobody asked for are left untouched.
pub struct SessionHandler<S: SessionStore> {
    store: Arc<S>,
}

impl<S: SessionStore> SessionHandler<S> {
    /// Create a new session handler
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Create a handler sharing an existing store
    pub fn from_arc(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The store shared with downstream handlers
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S: SessionStore> Clone for SessionHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[async_trait]
impl<S: SessionStore> Handler for SessionHandler<S> {
    async fn handle(&self, req: &mut Request, depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
        depot.inject(Arc::clone(&self.store));

        // Continue with the request
        ctrl.call_next(req, depot, res).await;

        let Some(registry) = Registry::existing(req) else {
            return;
        };
        if let Err(e) = registry.save_all(&*self.store, req, res).await {
            tracing::error!("Failed to save sessions: {}", e);
        }
    }
}
