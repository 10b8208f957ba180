//! Identifier types for the Raven client.
//!
//! Session tokens name a browser session in the store; request ids are the
//! nonces echoed back by the identity provider in the `params` field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of random bytes in a freshly generated [`RequestId`].
const REQUEST_ID_BYTES: usize = 16;

/// Opaque token identifying a browser session (UUID v4).
///
/// The surrounding web layer hands this to the browser, usually as a cookie,
/// and uses it to key session entries in the store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionToken(uuid::Uuid);

impl SessionToken {
    /// Rebuild a `SessionToken` from its 16 raw UUID bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Uuid::from_bytes(bytes))
    }

    /// Generate a new random `SessionToken`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Return the bytes of the UUID.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl FromStr for SessionToken {
    type Err = IdError;

    /// Parse a `SessionToken` from a UUID string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({})", self.0)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SessionToken {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionToken> for String {
    fn from(token: SessionToken) -> Self {
        token.0.to_string()
    }
}

/// Single-use nonce sent as the `params` value of an authentication request.
///
/// Generated ids are 32 lowercase hex characters, so they survive the
/// provider's `!`-delimited response format without escaping. Ids echoed back
/// by the provider are compared as plain strings.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh nonce from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;

        let mut rng = rand::rng();
        let bytes: [u8; REQUEST_ID_BYTES] = rng.random();
        Self(hex::encode(bytes))
    }

    /// Wrap an existing nonce value.
    ///
    /// # Errors
    ///
    /// Returns `IdError::EmptyRequestId` if the value is empty.
    pub fn from_string(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdError::EmptyRequestId);
        }
        Ok(Self(value))
    }

    /// Return the nonce as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this nonce equals a value echoed back by the provider.
    #[must_use]
    pub fn matches(&self, echoed: &str) -> bool {
        self.0 == echoed
    }
}

impl FromStr for RequestId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl fmt::Debug for RequestId {
    // Only a prefix is shown so full nonces stay out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "RequestId({prefix}..)")
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RequestId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_string(value)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,

    /// A request id must not be empty.
    #[error("request id is empty")]
    EmptyRequestId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_roundtrip() {
        let token = SessionToken::generate();
        let str_repr = token.to_string();
        let parsed = SessionToken::from_str(&str_repr).unwrap();
        assert_eq!(token, parsed);
    }

    #[test]
    fn session_token_from_raw_bytes() {
        let token = SessionToken::generate();
        assert_eq!(SessionToken::from_bytes(*token.as_bytes()), token);
    }

    #[test]
    fn session_token_invalid_uuid() {
        let result = SessionToken::from_str("not-a-uuid");
        assert!(matches!(result, Err(IdError::InvalidUuid)));
    }

    #[test]
    fn session_token_serde_json() {
        let token = SessionToken::generate();
        let json = serde_json::to_string(&token).unwrap();
        let parsed: SessionToken = serde_json::from_str(&json).unwrap();
        assert_eq!(token, parsed);
    }

    #[test]
    fn request_id_is_hex() {
        let id = RequestId::generate();
        assert_eq!(id.as_str().len(), REQUEST_ID_BYTES * 2);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!id.as_str().contains('!'));
    }

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn request_id_rejects_empty() {
        assert_eq!(RequestId::from_string(""), Err(IdError::EmptyRequestId));
        assert!(serde_json::from_str::<RequestId>("\"\"").is_err());
    }

    #[test]
    fn request_id_matches_echo() {
        let id = RequestId::from_string("123456").unwrap();
        assert!(id.matches("123456"));
        assert!(!id.matches("123457"));
        assert!(!id.matches(""));
    }

    #[test]
    fn request_id_debug_is_truncated() {
        let id = RequestId::from_string("abcdef0123456789").unwrap();
        assert_eq!(format!("{id:?}"), "RequestId(abcdef..)");
    }
}
