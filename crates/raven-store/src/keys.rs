//! Key encoding utilities for `RocksDB`.

use raven_core::SessionToken;

/// Encode a session key (the 16 raw UUID bytes of the token).
#[must_use]
pub fn session_key(token: &SessionToken) -> Vec<u8> {
    token.as_bytes().to_vec()
}

/// Decode a session key back into its token.
///
/// Returns `None` for keys that are not 16 bytes long.
#[must_use]
pub fn token_from_key(key: &[u8]) -> Option<SessionToken> {
    <[u8; 16]>::try_from(key).ok().map(SessionToken::from_bytes)
}
