//! Core types for the Raven web authentication client.
//!
//! This crate provides the identifiers shared by the store, the
//! authentication pipeline and the demo gateway:
//!
//! - **`SessionToken`**: opaque token naming a browser session
//! - **`RequestId`**: single-use nonce binding an issued request to its response
//!
//! # Example
//!
//! ```
//! use raven_core::{RequestId, SessionToken};
//!
//! // Mint a token for a browser that arrived without a cookie
//! let token = SessionToken::generate();
//! let parsed: SessionToken = token.to_string().parse().unwrap();
//! assert_eq!(token, parsed);
//!
//! // Fresh nonce for an outgoing authentication request
//! let nonce = RequestId::generate();
//! assert_eq!(nonce.as_str().len(), 32);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{IdError, RequestId, SessionToken};
