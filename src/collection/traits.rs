//! Collection gateway trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SessionError;

/// Name of the timestamp field the TTL index is built on
pub const MODIFIED_FIELD: &str = "modified";

/// One persisted session.
///
/// `data` is the codec-encoded values map; `modified` anchors TTL expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDocument {
    pub id: String,
    pub data: String,
    pub modified: DateTime<Utc>,
}

/// TTL index on the `modified` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlIndex {
    pub field: String,
    pub expire_after_secs: u64,
    pub background: bool,
    pub sparse: bool,
}

impl TtlIndex {
    /// Background, sparse index on `modified` expiring after `expire_after_secs`
    pub fn on_modified(expire_after_secs: u64) -> Self {
        Self {
            field: MODIFIED_FIELD.to_string(),
            expire_after_secs,
            background: true,
            sparse: true,
        }
    }

    /// Whether a document written at `modified` has outlived the index.
    /// A deadline past the representable range never expires.
    pub fn is_expired(&self, modified: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let deadline = i64::try_from(self.expire_after_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| modified.checked_add_signed(ttl));
        match deadline {
            Some(deadline) => deadline < now,
            None => false,
        }
    }
}

/// The document operations the store needs from its backing collection.
///
/// Every call runs inside the caller's future: dropping that future cancels
/// the operation, and errors are returned unchanged.
#[async_trait]
pub trait SessionCollection: Send + Sync + 'static {
    /// Find a document by primary key
    ///
    /// Returns None if it doesn't exist
    async fn find_by_id(&self, id: &str) -> Result<Option<SessionDocument>, SessionError>;

    /// Insert or replace the document keyed by `document.id`
    async fn upsert_by_id(&self, document: &SessionDocument) -> Result<(), SessionError>;

    /// Delete a document by primary key; a missing document is not an error
    async fn delete_by_id(&self, id: &str) -> Result<(), SessionError>;

    /// Create a TTL index
    async fn create_ttl_index(&self, index: &TtlIndex) -> Result<(), SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_index_expiry() {
        let index = TtlIndex::on_modified(60);
        assert_eq!(index.field, "modified");
        assert!(index.background);
        assert!(index.sparse);

        let now = Utc::now();
        assert!(index.is_expired(now - chrono::Duration::seconds(120), now));
        assert!(!index.is_expired(now - chrono::Duration::seconds(30), now));
    }

    #[test]
    fn test_ttl_index_out_of_range() {
        let now = Utc::now();
        assert!(!TtlIndex::on_modified(u64::MAX).is_expired(now, now));
        assert!(!TtlIndex::on_modified(i64::MAX as u64).is_expired(now, now));
        assert!(!TtlIndex::on_modified(3600).is_expired(DateTime::<Utc>::MAX_UTC, now));
    }
}
