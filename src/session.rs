//! Session object handed to request handlers

use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SessionOptions;
use crate::error::SessionError;

/// Reserved value key that pins the `modified` timestamp of the stored record
pub const MODIFIED_KEY: &str = "modified";

/// Number of random bytes behind a session id
pub const SESSION_ID_BYTES: usize = 32;

/// Length of a base32 (no padding) encoded session id
pub const SESSION_ID_LEN: usize = 52;

/// A session shared between the request registry and handlers
pub type SharedSession = Arc<RwLock<Session>>;

/// Generate a new session id: 32 random bytes in unpadded base32.
pub fn generate_session_id() -> String {
    let bytes: [u8; SESSION_ID_BYTES] = rand::random();
    BASE32_NOPAD.encode(&bytes)
}

/// Check that `id` has the shape of a generated session id
pub fn validate_session_id(id: &str) -> Result<(), SessionError> {
    if id.len() != SESSION_ID_LEN {
        return Err(SessionError::InvalidId);
    }
    match BASE32_NOPAD.decode(id.as_bytes()) {
        Ok(bytes) if bytes.len() == SESSION_ID_BYTES => Ok(()),
        _ => Err(SessionError::InvalidId),
    }
}

/// Session state for one name within one request.
///
/// `id` is empty until the first save; `values` is persisted server side and
/// never travels in the cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    name: String,
    pub id: String,
    pub values: HashMap<String, Value>,
    pub is_new: bool,
    pub options: SessionOptions,
}

impl Session {
    /// Create a fresh session with a copy of the given options
    pub fn new<S: Into<String>>(name: S, options: SessionOptions) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
            values: HashMap::new(),
            is_new: true,
            options,
        }
    }

    /// The session name, used as cookie name and authentication context
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a value from the session
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in the session
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Remove a value from the session
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Check if a key exists in the session
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Clear all session values
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Pin the `modified` timestamp written on the next save
    pub fn pin_modified(&mut self, at: DateTime<Utc>) -> Result<(), SessionError> {
        self.set(MODIFIED_KEY, at)
    }

    /// Mark the session for deletion on the next save
    pub fn expire(&mut self) {
        self.options.max_age = -1;
    }

    /// Wrap the session for sharing through a registry
    pub fn into_shared(self) -> SharedSession {
        Arc::new(RwLock::new(self))
    }
}
