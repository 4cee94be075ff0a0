//! MongoDB session collection
//!
//! Documents are stored as:
//! - `_id`: session id
//! - `data`: codec-encoded session values
//! - `modified`: BSON datetime, the TTL index anchor
//!
//! BSON datetimes have millisecond precision, so a pinned `modified` comes
//! back truncated to the millisecond.

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{SessionCollection, SessionDocument, TtlIndex};
use crate::error::SessionError;

/// Default collection name used by `from_url`
pub const DEFAULT_COLLECTION: &str = "sessions";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "_id")]
    id: String,
    data: String,
    modified: bson::DateTime,
}

impl From<StoredSession> for SessionDocument {
    fn from(stored: StoredSession) -> Self {
        Self {
            id: stored.id,
            data: stored.data,
            modified: stored.modified.to_chrono(),
        }
    }
}

/// MongoDB session collection
///
/// # Example
///
/// ```rust,ignore
/// use salvo_mongo_session::MongoCollection;
///
/// let coll = MongoCollection::from_url("mongodb://127.0.0.1:27017", "app", "sessions").await?;
/// ```
#[derive(Clone, Debug)]
pub struct MongoCollection {
    coll: Collection<StoredSession>,
}

impl MongoCollection {
    /// Wrap an existing collection handle
    pub fn new<T: Send + Sync>(coll: Collection<T>) -> Self {
        Self {
            coll: coll.clone_with_type(),
        }
    }

    /// Connect and open `database.collection`
    pub async fn from_url(url: &str, database: &str, collection: &str) -> Result<Self, SessionError> {
        let client = Client::with_uri_str(url)
            .await
            .map_err(|e| SessionError::Backend(format!("Failed to create MongoDB client: {}", e)))?;
        Ok(Self {
            coll: client.database(database).collection(collection),
        })
    }

    /// Name of the underlying collection
    pub fn name(&self) -> &str {
        self.coll.name()
    }
}

#[async_trait]
impl SessionCollection for MongoCollection {
    async fn find_by_id(&self, id: &str) -> Result<Option<SessionDocument>, SessionError> {
        let stored = self.coll.find_one(doc! { "_id": id }).await?;
        Ok(stored.map(SessionDocument::from))
    }

    async fn upsert_by_id(&self, document: &SessionDocument) -> Result<(), SessionError> {
        let update = doc! {
            "$set": {
                "data": document.data.as_str(),
                "modified": bson::DateTime::from_chrono(document.modified),
            }
        };
        self.coll
            .update_one(doc! { "_id": document.id.as_str() }, update)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), SessionError> {
        self.coll.delete_one(doc! { "_id": id }).await?;
        Ok(())
    }

    async fn create_ttl_index(&self, index: &TtlIndex) -> Result<(), SessionError> {
        let options = IndexOptions::builder()
            .background(index.background)
            .sparse(index.sparse)
            .expire_after(Duration::from_secs(index.expire_after_secs))
            .build();
        let mut keys = Document::new();
        keys.insert(index.field.clone(), 1);
        let model = IndexModel::builder()
            .keys(keys)
            .options(options)
            .build();

        self.coll
            .create_index(model)
            .await
            .map_err(|e| SessionError::TtlIndex(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Tests require a running MongoDB instance
    // Run with: cargo test --features mongodb-store -- --ignored

    use super::*;
    use chrono::Utc;

    #[tokio::test]
    #[ignore]
    async fn test_mongo_collection_basic() {
        let coll = MongoCollection::from_url(
            "mongodb://127.0.0.1:27017",
            "salvo_mongo_session_test",
            DEFAULT_COLLECTION,
        )
        .await
        .unwrap();

        coll.create_ttl_index(&TtlIndex::on_modified(3600)).await.unwrap();

        let document = SessionDocument {
            id: crate::session::generate_session_id(),
            data: "encoded".to_string(),
            modified: Utc::now(),
        };
        coll.upsert_by_id(&document).await.unwrap();

        let found = coll.find_by_id(&document.id).await.unwrap().unwrap();
        assert_eq!(found.data, "encoded");
        assert_eq!(
            found.modified.timestamp_millis(),
            document.modified.timestamp_millis()
        );

        coll.delete_by_id(&document.id).await.unwrap();
        assert!(coll.find_by_id(&document.id).await.unwrap().is_none());
    }
}
