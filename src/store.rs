//! Session store backed by a document collection

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use salvo_core::{Request, Response};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::CodecSet;
use crate::collection::{SessionCollection, SessionDocument, TtlIndex};
use crate::config::{SessionOptions, StoreConfig};
use crate::error::SessionError;
use crate::registry::Registry;
use crate::session::{generate_session_id, validate_session_id, Session, SharedSession, MODIFIED_KEY};
use crate::token::{CookieToken, TokenCarrier};

/// The contract between a session store and the request registry.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Get the session registered for `name` on this request, creating it
    /// with [`new_session`](Self::new_session) on first use.
    async fn get(&self, req: &mut Request, name: &str) -> (SharedSession, Option<SessionError>) {
        let registry = Registry::of(req);
        registry.get(self, req, name).await
    }

    /// Materialize a session for `name` without registering it.
    ///
    /// A session is always returned. The error, when present, explains why
    /// the session is fresh even though the request carried a token.
    ///
    /// When the token decodes but its record is missing, expired or
    /// unreadable, the session comes back fresh with an empty id and no
    /// error; the next save assigns a new id instead of reusing the one the
    /// token carried.
    async fn new_session(&self, req: &mut Request, name: &str) -> (Session, Option<SessionError>);

    /// Persist the session and write its token, or delete both when the
    /// session max age is negative.
    async fn save(
        &self,
        req: &mut Request,
        res: &mut Response,
        session: &mut Session,
    ) -> Result<(), SessionError>;
}

/// Stores session values in a document collection and the encoded session id
/// in a cookie.
///
/// `codecs`, `options` and `token` may be replaced before the store goes
/// into service; they are read-only afterwards.
///
/// # Example
///
/// ```rust,ignore
/// use salvo_mongo_session::{MemoryCollection, MongoStore};
///
/// let store = MongoStore::new(MemoryCollection::new(), 3600, true, &[b"hash-key"]).await?;
/// ```
pub struct MongoStore<C: SessionCollection> {
    pub codecs: CodecSet,
    pub options: SessionOptions,
    pub token: Arc<dyn TokenCarrier>,
    coll: C,
}

impl<C: SessionCollection> MongoStore<C> {
    /// Create a store from `hash_key, block_key, ...` pairs.
    ///
    /// With `ensure_ttl`, a background sparse TTL index on `modified`
    /// expiring after `max_age` seconds is created; failing to create it
    /// fails construction.
    pub async fn new<K: AsRef<[u8]>>(
        coll: C,
        max_age: i64,
        ensure_ttl: bool,
        key_pairs: &[K],
    ) -> Result<Self, SessionError> {
        let config = StoreConfig::with_key_pairs(key_pairs.iter().map(|k| k.as_ref().to_vec()))
            .with_max_age(max_age)
            .with_ttl_index(ensure_ttl);
        Self::from_config(coll, config).await
    }

    /// Create a store from a [`StoreConfig`]
    pub async fn from_config(coll: C, config: StoreConfig) -> Result<Self, SessionError> {
        let codecs = CodecSet::from_key_pairs(&config.key_pairs)?;
        let mut store = Self {
            codecs,
            options: config.options.clone(),
            token: Arc::new(CookieToken),
            coll,
        };
        store.set_max_age(config.options.max_age);
        store.set_max_length(config.max_length);

        if config.ensure_ttl {
            let index = TtlIndex::on_modified(config.ttl_seconds()?);
            store
                .coll
                .create_ttl_index(&index)
                .await
                .map_err(|e| match e {
                    SessionError::TtlIndex(_) => e,
                    other => SessionError::TtlIndex(other.to_string()),
                })?;
            tracing::debug!(
                field = %index.field,
                expire_after_secs = index.expire_after_secs,
                "ensured session TTL index"
            );
        }

        Ok(store)
    }

    /// Replace the token carrier
    pub fn with_token<T: TokenCarrier>(mut self, token: T) -> Self {
        self.token = Arc::new(token);
        self
    }

    /// Set the default max age and bound codec validity by it.
    /// Individual sessions are deleted by setting their max age below zero.
    pub fn set_max_age(&mut self, age: i64) {
        self.options.max_age = age;
        self.codecs.set_max_age(age);
    }

    /// Set the max encoded length on every codec (0 = unlimited)
    pub fn set_max_length(&mut self, length: usize) {
        self.codecs.set_max_length(length);
    }

    /// The backing collection
    pub fn collection(&self) -> &C {
        &self.coll
    }

    /// Load a session by raw id, bypassing the token carrier.
    ///
    /// Malformed ids fail with [`SessionError::InvalidId`]; a missing record
    /// fails with [`SessionError::NotFound`].
    pub async fn load_by_id(&self, name: &str, id: &str) -> Result<Session, SessionError> {
        validate_session_id(id)?;
        let mut session = Session::new(name, self.options.clone());
        session.values = self.load(name, id).await?;
        session.id = id.to_string();
        session.is_new = false;
        Ok(session)
    }

    async fn load(&self, name: &str, id: &str) -> Result<HashMap<String, Value>, SessionError> {
        let document = self
            .coll
            .find_by_id(id)
            .await?
            .ok_or(SessionError::NotFound)?;
        self.codecs.decode(name, &document.data)
    }

    async fn upsert(&self, session: &Session) -> Result<(), SessionError> {
        let modified = match session.values.get(MODIFIED_KEY) {
            Some(value) => serde_json::from_value::<DateTime<Utc>>(value.clone())
                .map_err(|_| SessionError::InvalidModified)?,
            None => Utc::now(),
        };

        let data = self.codecs.encode(session.name(), &session.values)?;
        let document = SessionDocument {
            id: session.id.clone(),
            data,
            modified,
        };
        self.coll.upsert_by_id(&document).await
    }

    async fn delete(&self, session: &Session) -> Result<(), SessionError> {
        if session.id.is_empty() {
            return Ok(());
        }
        self.coll.delete_by_id(&session.id).await
    }
}

#[async_trait]
impl<C: SessionCollection> SessionStore for MongoStore<C> {
    async fn new_session(&self, req: &mut Request, name: &str) -> (Session, Option<SessionError>) {
        let mut session = Session::new(name, self.options.clone());

        let Ok(token) = self.token.get_token(req, name) else {
            return (session, None);
        };

        let id: String = match self.codecs.decode(name, &token) {
            Ok(id) => id,
            Err(e) => return (session, Some(e)),
        };

        // A missing, expired or unreadable record yields a fresh session.
        match self.load(name, &id).await {
            Ok(values) => {
                session.id = id;
                session.values = values;
                session.is_new = false;
            }
            Err(e) => {
                tracing::debug!(session = name, error = %e, "session record unavailable, starting fresh");
            }
        }

        (session, None)
    }

    async fn save(
        &self,
        _req: &mut Request,
        res: &mut Response,
        session: &mut Session,
    ) -> Result<(), SessionError> {
        if session.options.is_delete() {
            self.delete(session).await?;
            return self
                .token
                .set_token(res, session.name(), "", &session.options);
        }

        if session.id.is_empty() {
            session.id = generate_session_id();
        }

        self.upsert(session).await?;

        let encoded = self.codecs.encode(session.name(), &session.id)?;
        self.token
            .set_token(res, session.name(), &encoded, &session.options)
    }
}

impl<C: SessionCollection + std::fmt::Debug> std::fmt::Debug for MongoStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoStore")
            .field("codecs", &self.codecs)
            .field("options", &self.options)
            .field("coll", &self.coll)
            .finish_non_exhaustive()
    }
}
