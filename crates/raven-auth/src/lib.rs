//! Raven (Ucam WebAuth) authentication for web applications.
//!
//! This crate implements the client side of a ticket-based single sign-on
//! protocol: it redirects unauthenticated users to the identity provider,
//! verifies the signed response the provider sends back, and caches the
//! authenticated principal in a server-side session.
//!
//! - [`codec`] parses responses and builds request URLs
//! - [`signature`] and [`keyring`] verify response signatures
//! - [`session`] serializes access to per-browser session state
//! - [`coordinator`] runs the three-stage authentication pipeline
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Web handler    │────▶│  Authenticator   │
//! └────────┬─────────┘     └───┬──────────┬───┘
//!          │ open/close        │          │
//!          │                   │ parse    │ verify
//! ┌────────▼─────────┐  ┌──────▼─────┐ ┌──▼──────────┐
//! │  SessionGateway  │  │   codec    │ │   Keyring   │
//! └────────┬─────────┘  └────────────┘ └─────────────┘
//!          │
//! ┌────────▼─────────┐
//! │  Store (Rocks)   │
//! └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use raven_auth::{AuthOutcome, Authenticator, Keyring, RavenConfig, RequestParams, SessionGateway};
//! use raven_core::SessionToken;
//! use raven_store::MemoryStore;
//! use url::Url;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RavenConfig::new(Url::parse("https://app.example.com/")?);
//! let mut keyring = Keyring::new();
//! keyring.load_pem_file("2", "pubkey2.txt")?;
//!
//! let auth = Authenticator::new(config, keyring);
//! let sessions = SessionGateway::new(Arc::new(MemoryStore::new()));
//!
//! // In a request handler:
//! let mut params = RequestParams::from_query("page=2");
//! let mut session = sessions.open(SessionToken::generate())?;
//! let outcome = auth.authenticate(&mut params, &mut session, None, None)?;
//! session.close()?;
//!
//! match outcome {
//!     AuthOutcome::Authenticated(principal) => println!("Hello, {principal}"),
//!     AuthOutcome::Denied(status) => println!("Denied: {}", status.description()),
//!     AuthOutcome::PendingRedirect { location } => println!("Redirect to {location}"),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod keyring;
pub mod params;
pub mod session;
pub mod signature;
pub mod status;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use clock::{Clock, SystemClock};
pub use codec::SignedAssertion;
pub use config::{Interaction, RavenConfig};
pub use coordinator::{log_off, AuthOutcome, Authenticator};
pub use error::{AuthError, Result};
pub use keyring::Keyring;
pub use params::{ParamValue, RequestParams, RESPONSE_PARAM};
pub use session::{Session, SessionGateway};
pub use signature::{DigestAlgorithm, RsaVerificationKey, VerificationKey};
pub use status::StatusCode;

#[cfg(any(test, feature = "test-utils"))]
pub use clock::FixedClock;
