//! Demonstration web application protected by Raven authentication.
//!
//! The gateway serves a single protected page. Visitors without a valid
//! session are redirected to the identity provider; when they come back with
//! a signed response the page shows who they are, or why they were refused.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Browser                            │
//! └─────────────────────────────────────────────────────────────┘
//!                 │ raven_session cookie        ▲ 302 to provider
//!                 ▼                             │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       raven-gateway                         │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  Session    │ │   Router    │ │   Purge task        │    │
//! │  │  cookie     │ │ + Handlers  │ │                     │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ spawn_blocking
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!        ┌──────────────┐              ┌──────────────┐
//!        │ Authenticator│              │ SessionStore │
//!        └──────────────┘              └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use raven_auth::{Authenticator, Keyring, SessionGateway};
//! use raven_gateway::{create_router, GatewayState};
//! use raven_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (config, raven) = raven_gateway::config::from_env()?;
//!
//! let mut keyring = Keyring::new();
//! keyring.load_pem_file(&config.key_id, &config.key_file)?;
//!
//! let store = Arc::new(RocksStore::open("/tmp/raven-sessions")?);
//! let sessions = SessionGateway::with_lock_timeout(store, config.session_lock_timeout());
//! let state = GatewayState::new(Authenticator::new(raven, keyring), sessions, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, create_router(state)).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cleanup;
pub mod config;
pub mod cookie;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use cookie::SessionCookie;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
