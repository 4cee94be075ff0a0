//! Authenticated (and optionally encrypted) value encoding
//!
//! A [`SecureCookie`] turns a payload into an opaque, URL-safe string bound to
//! a name. The wire format is
//! `base64url(timestamp | base64url(payload) | hmac_sha256(name | timestamp | base64url(payload)))`,
//! where the payload is first sealed with the `cookie` crate's private jar when
//! a block key is configured. The name never travels with the value, so a value
//! minted for one name does not verify under another.
//!
//! A [`CodecSet`] holds several codecs for key rotation: the first one encodes,
//! every one is tried when decoding.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use cookie::{Cookie, CookieJar, Key};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use std::fmt;

use crate::config::{DEFAULT_MAX_AGE, DEFAULT_MAX_LENGTH};
use crate::error::SessionError;

type HmacSha256 = Hmac<Sha256>;

/// Minimum block key length accepted for encryption
const MIN_BLOCK_KEY_LEN: usize = 32;

/// An authenticated encoding primitive bound to a context name.
pub trait Codec: Send + Sync {
    /// Encode `payload` under `name`
    fn encode(&self, name: &str, payload: &[u8]) -> Result<String, SessionError>;

    /// Verify and decode `value` under `name`
    fn decode(&self, name: &str, value: &str) -> Result<Vec<u8>, SessionError>;

    /// Bound the age of values accepted by `decode`. No-op for codecs without one.
    fn set_max_age(&mut self, _age: i64) {}

    /// Bound the length of encoded values. No-op for codecs without one.
    fn set_max_length(&mut self, _length: usize) {}

    /// The age bound in seconds, if this codec has one
    fn max_age(&self) -> Option<i64> {
        None
    }

    /// The encoded length bound, if this codec has one
    fn max_length(&self) -> Option<usize> {
        None
    }
}

/// HMAC-SHA256 authenticated codec with optional encryption
pub struct SecureCookie {
    hash_key: Vec<u8>,
    block_key: Option<Key>,
    max_age: i64,
    max_length: usize,
}

impl SecureCookie {
    /// Create a codec from a hash key and an optional block key.
    ///
    /// The block key must be at least 32 bytes; it is expanded into the
    /// encryption key of the private cookie jar.
    pub fn new(hash_key: &[u8], block_key: Option<&[u8]>) -> Result<Self, SessionError> {
        if hash_key.is_empty() {
            return Err(SessionError::InvalidKey("hash key is not set".to_string()));
        }

        let block_key = match block_key {
            Some(key) if key.len() < MIN_BLOCK_KEY_LEN => {
                return Err(SessionError::InvalidKey(format!(
                    "block key must be at least {} bytes, got {}",
                    MIN_BLOCK_KEY_LEN,
                    key.len()
                )));
            }
            Some(key) => Some(Key::derive_from(key)),
            None => None,
        };

        Ok(Self {
            hash_key: hash_key.to_vec(),
            block_key,
            max_age: DEFAULT_MAX_AGE,
            max_length: DEFAULT_MAX_LENGTH,
        })
    }

    /// Whether values are encrypted before authentication
    pub fn is_encrypted(&self) -> bool {
        self.block_key.is_some()
    }

    fn mac(&self) -> Result<HmacSha256, SessionError> {
        HmacSha256::new_from_slice(&self.hash_key)
            .map_err(|e| SessionError::InvalidKey(e.to_string()))
    }

    fn encode_at(&self, name: &str, payload: &[u8], timestamp: i64) -> Result<String, SessionError> {
        let sealed = match &self.block_key {
            Some(key) => seal(key, name, payload)?,
            None => payload.to_vec(),
        };
        let value = URL_SAFE_NO_PAD.encode(sealed);
        let date = timestamp.to_string();

        let mut mac = self.mac()?;
        mac.update(format!("{}|{}|{}", name, date, value).as_bytes());
        let tag = mac.finalize().into_bytes();

        let mut raw = Vec::with_capacity(date.len() + value.len() + tag.len() + 2);
        raw.extend_from_slice(date.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(value.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(&tag);

        let encoded = URL_SAFE_NO_PAD.encode(raw);
        if self.max_length != 0 && encoded.len() > self.max_length {
            return Err(SessionError::EncodedTooLong);
        }
        Ok(encoded)
    }

    fn decode_at(&self, name: &str, value: &str, now: i64) -> Result<Vec<u8>, SessionError> {
        if self.max_length != 0 && value.len() > self.max_length {
            return Err(SessionError::EncodedTooLong);
        }

        let raw = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| SessionError::InvalidFormat(e.to_string()))?;

        // The tag is binary and may contain '|', so it takes the remainder.
        let mut parts = raw.splitn(3, |b| *b == b'|');
        let (date, body, tag) = match (parts.next(), parts.next(), parts.next()) {
            (Some(date), Some(body), Some(tag)) => (date, body, tag),
            _ => return Err(SessionError::InvalidFormat("missing value parts".to_string())),
        };

        let mut mac = self.mac()?;
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(date);
        mac.update(b"|");
        mac.update(body);
        mac.verify_slice(tag).map_err(|_| SessionError::InvalidMac)?;

        let timestamp: i64 = std::str::from_utf8(date)
            .ok()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| SessionError::InvalidFormat("invalid timestamp".to_string()))?;
        if self.max_age > 0 && timestamp < now.saturating_sub(self.max_age) {
            return Err(SessionError::Expired);
        }

        let sealed = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| SessionError::InvalidFormat(e.to_string()))?;

        match &self.block_key {
            Some(key) => open(key, name, &sealed),
            None => Ok(sealed),
        }
    }
}

impl Codec for SecureCookie {
    fn encode(&self, name: &str, payload: &[u8]) -> Result<String, SessionError> {
        self.encode_at(name, payload, chrono::Utc::now().timestamp())
    }

    fn decode(&self, name: &str, value: &str) -> Result<Vec<u8>, SessionError> {
        self.decode_at(name, value, chrono::Utc::now().timestamp())
    }

    fn set_max_age(&mut self, age: i64) {
        self.max_age = age;
    }

    fn set_max_length(&mut self, length: usize) {
        self.max_length = length;
    }

    fn max_age(&self) -> Option<i64> {
        Some(self.max_age)
    }

    fn max_length(&self) -> Option<usize> {
        Some(self.max_length)
    }
}

impl fmt::Debug for SecureCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCookie")
            .field("encrypted", &self.is_encrypted())
            .field("max_age", &self.max_age)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

/// Encrypt through a private jar, which binds `name` as associated data.
fn seal(key: &Key, name: &str, payload: &[u8]) -> Result<Vec<u8>, SessionError> {
    let mut jar = CookieJar::new();
    jar.private_mut(key)
        .add(Cookie::new(name.to_string(), URL_SAFE_NO_PAD.encode(payload)));

    let sealed = jar
        .get(name)
        .ok_or_else(|| SessionError::Crypto("failed to encrypt value".to_string()))?;
    Ok(sealed.value().as_bytes().to_vec())
}

fn open(key: &Key, name: &str, sealed: &[u8]) -> Result<Vec<u8>, SessionError> {
    let sealed = std::str::from_utf8(sealed)
        .map_err(|_| SessionError::Crypto("sealed value is not utf-8".to_string()))?;

    let jar = CookieJar::new();
    let opened = jar
        .private(key)
        .decrypt(Cookie::new(name.to_string(), sealed.to_string()))
        .ok_or_else(|| SessionError::Crypto("failed to decrypt value".to_string()))?;

    URL_SAFE_NO_PAD
        .decode(opened.value())
        .map_err(|e| SessionError::InvalidFormat(e.to_string()))
}

/// Ordered, non-empty list of codecs used for key rotation
pub struct CodecSet {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecSet {
    /// Build a set from explicit codecs
    pub fn new(codecs: Vec<Box<dyn Codec>>) -> Result<Self, SessionError> {
        if codecs.is_empty() {
            return Err(SessionError::NoCodecs);
        }
        Ok(Self { codecs })
    }

    /// Build a set from `hash_key, block_key, hash_key, block_key, ...`.
    ///
    /// A missing or empty block key leaves that codec unencrypted.
    pub fn from_key_pairs<K: AsRef<[u8]>>(pairs: &[K]) -> Result<Self, SessionError> {
        let codecs = pairs
            .chunks(2)
            .map(|pair| {
                let block = pair.get(1).map(|k| k.as_ref()).filter(|k| !k.is_empty());
                SecureCookie::new(pair[0].as_ref(), block).map(|c| Box::new(c) as Box<dyn Codec>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(codecs)
    }

    /// Serialize `value` as JSON and encode it with the first codec
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String, SessionError> {
        let payload = serde_json::to_vec(value)?;
        self.codecs
            .first()
            .ok_or(SessionError::NoCodecs)?
            .encode(name, &payload)
    }

    /// Decode `value` with each codec in turn; the first error is returned
    /// when none succeeds.
    pub fn decode<T: DeserializeOwned>(&self, name: &str, value: &str) -> Result<T, SessionError> {
        let mut first_error = None;
        for codec in &self.codecs {
            let decoded = codec
                .decode(name, value)
                .and_then(|payload| serde_json::from_slice(&payload).map_err(SessionError::from));
            match decoded {
                Ok(decoded) => return Ok(decoded),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        Err(first_error.unwrap_or(SessionError::NoCodecs))
    }

    /// Propagate a max age to every codec that supports one
    pub fn set_max_age(&mut self, age: i64) {
        for codec in &mut self.codecs {
            codec.set_max_age(age);
        }
    }

    /// Propagate a max length to every codec that supports one
    pub fn set_max_length(&mut self, length: usize) {
        for codec in &mut self.codecs {
            codec.set_max_length(length);
        }
    }

    /// The codecs in decode order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Codec> + '_ {
        self.codecs.iter().map(|codec| codec.as_ref())
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl fmt::Debug for CodecSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecSet").field("len", &self.codecs.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const K0: &[u8] = b"key-zero-key-zero-key-zero-key-0";
    const K1: &[u8] = b"key-one-key-one-key-one-key-one1";
    const K2: &[u8] = b"key-two-key-two-key-two-key-two2";
    const BLOCK: &[u8] = b"block-key-block-key-block-key-32";

    fn set(keys: &[&[u8]]) -> CodecSet {
        let codecs = keys
            .iter()
            .map(|k| Box::new(SecureCookie::new(k, None).unwrap()) as Box<dyn Codec>)
            .collect();
        CodecSet::new(codecs).unwrap()
    }

    #[test]
    fn test_encode_and_decode() {
        let codecs = set(&[K1]);
        let encoded = codecs.encode("sid", "session-id").unwrap();
        assert!(!encoded.contains("session-id"));

        let decoded: String = codecs.decode("sid", &encoded).unwrap();
        assert_eq!(decoded, "session-id");
    }

    #[test]
    fn test_name_binding() {
        let codecs = set(&[K1]);
        let encoded = codecs.encode("A", "session-id").unwrap();

        let result = codecs.decode::<String>("B", &encoded);
        assert!(matches!(result, Err(SessionError::InvalidMac)));
    }

    #[test]
    fn test_tampered_value() {
        let codecs = set(&[K1]);
        let encoded = codecs.encode("sid", "session-id").unwrap();

        let mut bytes = encoded.into_bytes();
        let last = bytes.len() - 3;
        bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(codecs.decode::<String>("sid", &tampered).is_err());
    }

    #[test]
    fn test_key_rotation() {
        let encoded = set(&[K1, K2]).encode("sid", "session-id").unwrap();

        let decoded: String = set(&[K0, K1]).decode("sid", &encoded).unwrap();
        assert_eq!(decoded, "session-id");

        assert!(set(&[K0]).decode::<String>("sid", &encoded).is_err());
    }

    #[test]
    fn test_expired_timestamp() {
        let mut codec = SecureCookie::new(K1, None).unwrap();
        codec.set_max_age(60);
        let now = chrono::Utc::now().timestamp();

        let old = codec.encode_at("sid", b"\"v\"", now - 120).unwrap();
        assert!(matches!(codec.decode_at("sid", &old, now), Err(SessionError::Expired)));

        let fresh = codec.encode_at("sid", b"\"v\"", now - 30).unwrap();
        assert_eq!(codec.decode_at("sid", &fresh, now).unwrap(), b"\"v\"".to_vec());

        codec.set_max_age(0);
        assert!(codec.decode_at("sid", &old, now).is_ok());
    }

    #[test]
    fn test_max_length() {
        let mut codecs = set(&[K1]);
        codecs.set_max_length(64);
        let long = "x".repeat(200);
        assert!(matches!(codecs.encode("sid", &long), Err(SessionError::EncodedTooLong)));

        codecs.set_max_length(0);
        let encoded = codecs.encode("sid", &long).unwrap();
        let decoded: String = codecs.decode("sid", &encoded).unwrap();
        assert_eq!(decoded, long);
    }

    #[test]
    fn test_encrypted_codec() {
        let codecs = CodecSet::from_key_pairs(&[K1, BLOCK]).unwrap();
        let encoded = codecs.encode("sid", "plain-secret").unwrap();

        let raw = URL_SAFE_NO_PAD.decode(&encoded).unwrap();
        let raw = String::from_utf8_lossy(&raw);
        assert!(!raw.contains(&URL_SAFE_NO_PAD.encode("\"plain-secret\"")));

        let decoded: String = codecs.decode("sid", &encoded).unwrap();
        assert_eq!(decoded, "plain-secret");

        // Same hash key without the block key authenticates but cannot read it.
        let unencrypted = CodecSet::from_key_pairs(&[K1]).unwrap();
        assert!(unencrypted.decode::<String>("sid", &encoded).is_err());
    }

    #[test]
    fn test_invalid_keys() {
        assert!(matches!(SecureCookie::new(b"", None), Err(SessionError::InvalidKey(_))));
        assert!(matches!(
            SecureCookie::new(K1, Some(&b"short"[..])),
            Err(SessionError::InvalidKey(_))
        ));
        let empty: [&[u8]; 0] = [];
        assert!(matches!(CodecSet::from_key_pairs(&empty), Err(SessionError::NoCodecs)));
    }

    #[test]
    fn test_pairs_with_empty_block_key() {
        let empty: &[u8] = b"";
        let codecs = CodecSet::from_key_pairs(&[K1, empty, K2]).unwrap();
        assert_eq!(codecs.len(), 2);
    }

    #[test]
    fn test_set_max_age_propagates() {
        let mut codecs = set(&[K1, K2]);
        assert!(codecs.iter().all(|c| c.max_age() == Some(DEFAULT_MAX_AGE)));

        let now = chrono::Utc::now().timestamp();
        let old = SecureCookie::new(K1, None)
            .unwrap()
            .encode_at("sid", b"\"session-id\"", now - 120)
            .unwrap();
        assert_eq!(codecs.decode::<String>("sid", &old).unwrap(), "session-id");

        codecs.set_max_age(60);
        assert!(codecs.iter().all(|c| c.max_age() == Some(60)));
        assert!(matches!(codecs.decode::<String>("sid", &old), Err(SessionError::Expired)));

        let fresh = codecs.encode("sid", "session-id").unwrap();
        assert_eq!(codecs.decode::<String>("sid", &fresh).unwrap(), "session-id");
    }

    #[test]
    fn test_set_max_length_propagates() {
        let mut codecs = set(&[K0, K1]);
        assert!(codecs.iter().all(|c| c.max_length() == Some(DEFAULT_MAX_LENGTH)));
        codecs.set_max_length(0);
        assert!(codecs.iter().all(|c| c.max_length() == Some(0)));
    }

    #[test]
    fn test_unbounded_max_age() {
        let mut codec = SecureCookie::new(K1, None).unwrap();
        codec.set_max_age(i64::MAX);
        let now = chrono::Utc::now().timestamp();
        let old = codec.encode_at("sid", b"\"v\"", 0).unwrap();
        assert!(codec.decode_at("sid", &old, now).is_ok());
    }
}
