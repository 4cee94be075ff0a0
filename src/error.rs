//! Session error types

use thiserror::Error;

/// Errors that can occur during session operations
///
/// The enum is `Clone` so a request registry can hand the same error back on
/// every lookup of a session name.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// A raw session id does not have the shape of a generated id
    #[error("mgostore: invalid session id")]
    InvalidId,

    /// The reserved `modified` value is present but is not a timestamp
    #[error("mongostore: invalid modified value")]
    InvalidModified,

    /// The token carrier found no token for this session name
    #[error("session token not present: {0}")]
    TokenNotPresent(String),

    /// The token carrier could not write the token
    #[error("invalid session token: {0}")]
    InvalidToken(String),

    /// A codec set was built without any codec
    #[error("securecookie: no codecs provided")]
    NoCodecs,

    /// A hash or block key is unusable
    #[error("securecookie: invalid key: {0}")]
    InvalidKey(String),

    /// The encoded value could not be split or base64-decoded
    #[error("securecookie: invalid value format: {0}")]
    InvalidFormat(String),

    /// The MAC does not match the value under this name
    #[error("securecookie: the value is not valid")]
    InvalidMac,

    /// The encoded value is older than the codec max age
    #[error("securecookie: expired timestamp")]
    Expired,

    /// The encoded value exceeds the codec max length
    #[error("securecookie: the value is too long")]
    EncodedTooLong,

    /// Encryption or decryption failed
    #[error("securecookie: {0}")]
    Crypto(String),

    /// No document exists for the session id
    #[error("session record not found")]
    NotFound,

    /// Error during serialization/deserialization
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Error from the backing collection
    #[error("session backend error: {0}")]
    Backend(String),

    /// The TTL index requested at construction could not be created
    #[error("failed to ensure TTL index: {0}")]
    TtlIndex(String),

    /// The store configuration is inconsistent
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

#[cfg(feature = "mongodb-store")]
impl From<mongodb::error::Error> for SessionError {
    fn from(err: mongodb::error::Error) -> Self {
        SessionError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_error_messages() {
        assert_eq!(SessionError::InvalidId.to_string(), "mgostore: invalid session id");
        assert_eq!(
            SessionError::InvalidModified.to_string(),
            "mongostore: invalid modified value"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<String>("not json").unwrap_err();
        assert!(matches!(SessionError::from(err), SessionError::Serialization(_)));
    }
}
