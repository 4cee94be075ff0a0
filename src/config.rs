//! Store configuration and per-session cookie options

use std::time::Duration;

use crate::error::SessionError;

/// Default codec max length for encoded values
pub const DEFAULT_MAX_LENGTH: usize = 4096;

/// Default max age (30 days) used by `StoreConfig::default`
pub const DEFAULT_MAX_AGE: i64 = 86400 * 30;

/// SameSite cookie attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    /// Strict - cookie only sent for same-site requests
    Strict,
    /// Lax - cookie sent for same-site requests and top-level navigations
    Lax,
    /// None - cookie sent for all requests (requires Secure)
    None,
}

/// Cookie attributes carried by every session.
///
/// `max_age` is in seconds. A negative value marks the session for deletion
/// on the next save; zero writes a browser-session cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    pub path: String,
    pub domain: Option<String>,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: DEFAULT_MAX_AGE,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }
}

impl SessionOptions {
    /// Options with the default path and the given max age
    pub fn with_max_age(max_age: i64) -> Self {
        Self {
            max_age,
            ..Default::default()
        }
    }

    /// Whether saving a session with these options deletes it
    pub fn is_delete(&self) -> bool {
        self.max_age < 0
    }
}

/// Configuration for a [`MongoStore`](crate::MongoStore)
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Key material as `hash_key, block_key, hash_key, block_key, ...`.
    /// The first pair encodes, all pairs are tried when decoding.
    /// An empty block key disables encryption for that pair.
    pub key_pairs: Vec<Vec<u8>>,

    /// Default cookie options copied into every new session
    pub options: SessionOptions,

    /// Whether to create a TTL index on `modified` at construction
    pub ensure_ttl: bool,

    /// Max length of encoded values, 0 disables the check
    pub max_length: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_pairs: Vec::new(),
            options: SessionOptions::default(),
            ensure_ttl: false,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl StoreConfig {
    /// Create a configuration with a single authentication key
    pub fn new<K: Into<Vec<u8>>>(hash_key: K) -> Self {
        Self {
            key_pairs: vec![hash_key.into()],
            ..Default::default()
        }
    }

    /// Create a configuration from rotated key pairs
    pub fn with_key_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        Self {
            key_pairs: pairs.into_iter().map(|k| k.into()).collect(),
            ..Default::default()
        }
    }

    /// Set max age in seconds
    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.options.max_age = max_age;
        self
    }

    /// Set max age from Duration
    pub fn with_max_age_duration(mut self, duration: Duration) -> Self {
        self.options.max_age = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
        self
    }

    /// Ask the store to create a TTL index on `modified`
    pub fn with_ttl_index(mut self, ensure_ttl: bool) -> Self {
        self.ensure_ttl = ensure_ttl;
        self
    }

    /// Set the max encoded length (default: 4096, 0 = unlimited)
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set the cookie path (default: "/")
    pub fn with_cookie_path<S: Into<String>>(mut self, path: S) -> Self {
        self.options.path = path.into();
        self
    }

    /// Set the cookie domain
    pub fn with_cookie_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.options.domain = Some(domain.into());
        self
    }

    /// Set the HttpOnly flag (default: false)
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.options.http_only = http_only;
        self
    }

    /// Set the Secure flag (default: false)
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.options.secure = secure;
        self
    }

    /// Set the SameSite attribute (default: unset)
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.options.same_site = Some(same_site);
        self
    }

    /// TTL index expiry derived from the configured max age
    pub fn ttl_seconds(&self) -> Result<u64, SessionError> {
        u64::try_from(self.options.max_age).map_err(|_| {
            SessionError::InvalidConfig(format!(
                "TTL index needs a non-negative max age, got {}",
                self.options.max_age
            ))
        })
    }
}
