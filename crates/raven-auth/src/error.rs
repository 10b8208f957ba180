//! Authentication error types.
//!
//! Protocol denials are not errors: they are returned as
//! [`AuthOutcome::Denied`](crate::AuthOutcome::Denied). The variants here
//! cover local failures the caller has to decide how to handle.

use std::path::PathBuf;

use raven_store::StoreError;
use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The signed response could not be parsed.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The signature field is not valid base64 after alphabet translation.
    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),

    /// A verification key could not be read from disk.
    #[error("failed to read key file {path}: {source}")]
    KeyFile {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A verification key is not a usable ASCII-armored RSA public key.
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    /// Stored request parameters could not be encoded or decoded.
    #[error("stored parameters unavailable: {0}")]
    Parameters(String),

    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The session store failed.
    #[error("session store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Returns `true` if the failure came from session storage rather than
    /// from the response or local configuration.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns `true` if a store wait timed out.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Store(StoreError::Timeout(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn store_errors_are_infrastructure() {
        let err = AuthError::from(StoreError::Database("down".into()));
        assert!(err.is_infrastructure());
        assert!(!err.is_timeout());

        let err = AuthError::from(StoreError::Timeout(Duration::from_millis(5)));
        assert!(err.is_infrastructure());
        assert!(err.is_timeout());

        assert!(!AuthError::MalformedResponse("short".into()).is_infrastructure());
    }

    #[test]
    fn messages_name_the_problem() {
        let err = AuthError::MalformedResponse("expected 13 fields, got 4".into());
        assert_eq!(
            err.to_string(),
            "malformed response: expected 13 fields, got 4"
        );
    }
}
