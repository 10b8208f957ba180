//! Session persistence for the Raven web authentication client.
//!
//! This crate stores the per-browser session state the authentication
//! pipeline relies on: the cached principal and its expiry, the request
//! parameters captured before a redirect, and the outstanding request nonce.
//!
//! Two backends implement the [`Store`] trait:
//!
//! - [`RocksStore`]: durable `RocksDB` storage, one column family, CBOR values
//! - [`MemoryStore`]: process-local map for tests and single-process setups
//!
//! # Example
//!
//! ```no_run
//! use raven_core::SessionToken;
//! use raven_store::{RocksStore, SessionRecord, Store};
//!
//! let store = RocksStore::open("/tmp/raven-sessions").unwrap();
//!
//! let token = SessionToken::generate();
//! store.put_session(&SessionRecord::new(token, chrono::Utc::now())).unwrap();
//! assert!(store.get_session(&token).unwrap().is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use rocks::RocksStore;
pub use types::SessionRecord;

use chrono::{DateTime, Utc};
use raven_core::SessionToken;

/// The storage trait defining all session operations.
///
/// Calls are synchronous. Implementations must not cache records across
/// calls in a way that hides writes made through another handle.
pub trait Store: Send + Sync {
    /// Insert or replace a session record.
    ///
    /// The write is durable once this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_session(&self, record: &SessionRecord) -> Result<()>;

    /// Get a session record by token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_session(&self, token: &SessionToken) -> Result<Option<SessionRecord>>;

    /// Delete a session record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the session doesn't exist.
    fn delete_session(&self, token: &SessionToken) -> Result<()>;

    /// List the tokens of records that are stale per [`SessionRecord::is_stale`],
    /// plus any record that can no longer be decoded.
    ///
    /// Nothing is removed. The list is a snapshot; callers must re-check each
    /// record under the session lock before deleting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn stale_sessions(
        &self,
        idle_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionToken>>;

    /// Count stored sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_sessions(&self) -> Result<usize>;
}
