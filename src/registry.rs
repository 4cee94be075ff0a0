//! Per-request session registry
//!
//! The registry lives in the request extensions and hands out one session per
//! name for the lifetime of the request, so every handler touching `"sid"`
//! sees the same values.

use parking_lot::Mutex;
use salvo_core::{Request, Response};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SessionError;
use crate::session::SharedSession;
use crate::store::SessionStore;

#[derive(Clone)]
struct RegistryEntry {
    session: SharedSession,
    error: Option<SessionError>,
}

/// Sessions registered on one request, keyed by name
#[derive(Clone, Default)]
pub struct Registry {
    sessions: Arc<Mutex<HashMap<String, RegistryEntry>>>,
}

impl Registry {
    /// The registry of this request, created on first use
    pub fn of(req: &mut Request) -> Self {
        if let Some(registry) = Self::existing(req) {
            return registry;
        }
        let registry = Self::default();
        req.extensions_mut().insert(registry.clone());
        registry
    }

    /// The registry of this request, if any session was requested
    pub fn existing(req: &Request) -> Option<Self> {
        req.extensions().get::<Self>().cloned()
    }

    /// Get the session for `name`, asking `store` for a new one on first use.
    /// The error from that first load is returned on every later lookup too.
    pub async fn get<S: SessionStore + ?Sized>(
        &self,
        store: &S,
        req: &mut Request,
        name: &str,
    ) -> (SharedSession, Option<SessionError>) {
        let cached = self.sessions.lock().get(name).cloned();
        if let Some(entry) = cached {
            return (entry.session, entry.error);
        }

        let (session, error) = store.new_session(req, name).await;
        let entry = self
            .sessions
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| RegistryEntry {
                session: session.into_shared(),
                error,
            })
            .clone();
        (entry.session, entry.error)
    }

    /// Names of the registered sessions
    pub fn names(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// Save every registered session.
    ///
    /// All sessions are attempted; the first error is returned.
    pub async fn save_all<S: SessionStore + ?Sized>(
        &self,
        store: &S,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<(), SessionError> {
        let sessions: Vec<SharedSession> = self
            .sessions
            .lock()
            .values()
            .map(|entry| Arc::clone(&entry.session))
            .collect();

        let mut first_error = None;
        for shared in sessions {
            let mut session = shared.read().clone();
            match store.save(req, res, &mut session).await {
                Ok(()) => *shared.write() = session,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("sessions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::MemoryCollection;
    use crate::store::MongoStore;

    const KEY: &[u8] = b"registry-test-hash-key-012345678";

    #[tokio::test]
    async fn test_one_session_per_name() {
        let store = MongoStore::new(MemoryCollection::new(), 3600, false, &[KEY])
            .await
            .unwrap();
        let mut req = Request::new();

        let (first, error) = store.get(&mut req, "sid").await;
        assert!(error.is_none());
        first.write().set("user", "alice").unwrap();

        let (second, _) = store.get(&mut req, "sid").await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.read().get::<String>("user"), Some("alice".to_string()));

        let (other, _) = store.get(&mut req, "flash").await;
        assert!(!Arc::ptr_eq(&first, &other));

        let mut names = Registry::of(&mut req).names();
        names.sort();
        assert_eq!(names, vec!["flash".to_string(), "sid".to_string()]);
    }

    #[tokio::test]
    async fn test_save_all() {
        let store = MongoStore::new(MemoryCollection::new(), 3600, false, &[KEY])
            .await
            .unwrap();
        let mut req = Request::new();
        let mut res = Response::new();

        assert!(Registry::existing(&req).is_none());
        let (session, _) = store.get(&mut req, "sid").await;
        session.write().set("views", 1).unwrap();

        let registry = Registry::existing(&req).unwrap();
        registry.save_all(&store, &mut req, &mut res).await.unwrap();

        let id = session.read().id.clone();
        assert!(!id.is_empty());
        assert!(store.collection().document(&id).is_some());
        assert!(res.cookie("sid").is_some());
    }
}
