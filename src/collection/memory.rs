//! In-memory session collection
//!
//! This is primarily for development and testing.
//! For production, use MongoCollection.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{SessionCollection, SessionDocument, TtlIndex};
use crate::error::SessionError;

/// In-memory session collection
///
/// Once a TTL index is created, expired documents are invisible to
/// `find_by_id` and are removed by `reap_expired`, which stands in for the
/// database's background reaper.
///
/// Warning: This collection is not suitable for production use because:
/// - Sessions are lost on server restart
/// - Sessions are not shared across multiple server instances
#[derive(Clone, Default)]
pub struct MemoryCollection {
    documents: Arc<RwLock<HashMap<String, SessionDocument>>>,
    ttl_index: Arc<RwLock<Option<TtlIndex>>>,
}

impl MemoryCollection {
    /// Create a new memory collection
    pub fn new() -> Self {
        Self::default()
    }

    /// The TTL index, if one was created
    pub fn ttl_index(&self) -> Option<TtlIndex> {
        self.ttl_index.read().clone()
    }

    /// Raw document by id, ignoring TTL
    pub fn document(&self, id: &str) -> Option<SessionDocument> {
        self.documents.read().get(id).cloned()
    }

    /// Number of stored documents, expired or not
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Remove documents the TTL index has expired; returns how many
    pub fn reap_expired(&self) -> usize {
        let Some(index) = self.ttl_index() else {
            return 0;
        };
        let now = Utc::now();
        let mut documents = self.documents.write();
        let before = documents.len();
        documents.retain(|_, doc| !index.is_expired(doc.modified, now));
        before - documents.len()
    }
}

impl std::fmt::Debug for MemoryCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCollection")
            .field("documents", &self.len())
            .field("ttl_index", &self.ttl_index())
            .finish()
    }
}

#[async_trait]
impl SessionCollection for MemoryCollection {
    async fn find_by_id(&self, id: &str) -> Result<Option<SessionDocument>, SessionError> {
        let index = self.ttl_index();
        let documents = self.documents.read();

        match documents.get(id) {
            Some(doc) if index.as_ref().is_some_and(|i| i.is_expired(doc.modified, Utc::now())) => Ok(None),
            Some(doc) => Ok(Some(doc.clone())),
            None => Ok(None),
        }
    }

    async fn upsert_by_id(&self, document: &SessionDocument) -> Result<(), SessionError> {
        self.documents
            .write()
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), SessionError> {
        self.documents.write().remove(id);
        Ok(())
    }

    async fn create_ttl_index(&self, index: &TtlIndex) -> Result<(), SessionError> {
        *self.ttl_index.write() = Some(index.clone());
        Ok(())
    }
}
