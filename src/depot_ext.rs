//! Extension trait for Depot to easily access the session store

use salvo_core::Depot;
use std::sync::Arc;

use crate::store::SessionStore;

/// Extension trait for Salvo's Depot to reach the store injected by
/// [`SessionHandler`](crate::SessionHandler)
pub trait SessionDepotExt {
    /// Get the session store of type `S`
    fn session_store<S: SessionStore>(&self) -> Option<Arc<S>>;
}

impl SessionDepotExt for Depot {
    fn session_store<S: SessionStore>(&self) -> Option<Arc<S>> {
        self.obtain::<Arc<S>>().ok().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::MemoryCollection;
    use crate::store::MongoStore;

    #[tokio::test]
    async fn test_session_store_lookup() {
        let store = MongoStore::new(MemoryCollection::new(), 60, false, &[b"depot-test-key"])
            .await
            .unwrap();
        let mut depot = Depot::new();
        assert!(depot.session_store::<MongoStore<MemoryCollection>>().is_none());

        depot.inject(Arc::new(store));
        let store = depot.session_store::<MongoStore<MemoryCollection>>().unwrap();
        assert_eq!(store.options.max_age, 60);
    }
}
