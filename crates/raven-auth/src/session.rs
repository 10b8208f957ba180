//! Per-browser session access.
//!
//! The [`SessionGateway`] sits between the authentication pipeline and the
//! persistent [`Store`]. Opening a session takes an exclusive per-token lock
//! that is held until the [`Session`] handle is dropped, so concurrent
//! requests carrying the same token (duplicate tabs, retried redirects) are
//! applied one after another. A nonce written by one request can therefore
//! never be overwritten by an interleaved request before the first one has
//! committed and sent its redirect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use raven_core::{RequestId, SessionToken};
use raven_store::{Result, SessionRecord, Store, StoreError};

/// Default bound on waiting for another request holding the same session.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Access point for session state.
pub struct SessionGateway {
    store: Arc<dyn Store>,
    locks: Mutex<HashMap<SessionToken, Arc<Mutex<()>>>>,
    lock_timeout: Duration,
}

impl SessionGateway {
    /// Create a gateway over `store` with the default lock timeout.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_lock_timeout(store, DEFAULT_LOCK_TIMEOUT)
    }

    /// Create a gateway with a custom bound on lock waits.
    #[must_use]
    pub fn with_lock_timeout(store: Arc<dyn Store>, lock_timeout: Duration) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            lock_timeout,
        }
    }

    /// Open the session for `token`, creating an empty one if none is stored.
    ///
    /// Blocks while another handle for the same token is open.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Timeout` if the session stays busy for longer
    /// than the lock timeout, or the store's error if the read fails.
    pub fn open(&self, token: SessionToken) -> Result<Session<'_>> {
        let guard = self.acquire_or_timeout(token)?;

        let record = match self.store.get_session(&token) {
            Ok(record) => record,
            Err(e) => {
                drop(guard);
                self.release(token);
                return Err(e);
            }
        };

        let (record, is_new) = match record {
            Some(record) => (record, false),
            None => (SessionRecord::new(token, Utc::now()), true),
        };

        Ok(Session {
            gateway: self,
            record,
            is_new,
            dirty: false,
            guard: Some(guard),
        })
    }

    /// Remove the whole session for `token` (log-off).
    ///
    /// Returns `false` if there was nothing to remove. Must not be called
    /// while a [`Session`] for the same token is open on this thread.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Timeout` if the session stays busy, or the
    /// store's error if the delete fails.
    pub fn delete(&self, token: SessionToken) -> Result<bool> {
        let guard = self.acquire_or_timeout(token)?;
        let result = match self.store.delete_session(&token) {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        };
        drop(guard);
        self.release(token);
        result
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Remove sessions that are stale per `SessionRecord::is_stale`.
    ///
    /// Candidates are listed first; each one is then re-read and re-checked
    /// under its session lock before it is deleted, so a record committed by
    /// a concurrent request is never lost. Sessions that are open elsewhere
    /// are in use and skipped without waiting. Records that can no longer be
    /// decoded are removed.
    ///
    /// Returns the number of sessions removed.
    ///
    /// # Errors
    ///
    /// Returns the store's error if listing, reading or deleting fails.
    pub fn purge_stale(&self, idle_before: DateTime<Utc>, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;

        for token in self.store.stale_sessions(idle_before, now)? {
            let Some(guard) = self.acquire(token, Duration::ZERO) else {
                tracing::debug!(token = %token, "Skipping purge of busy session");
                continue;
            };
            let result = self.purge_locked(token, idle_before, now);
            drop(guard);
            self.release(token);

            if result? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn purge_locked(
        &self,
        token: SessionToken,
        idle_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let stale = match self.store.get_session(&token) {
            Ok(Some(record)) => record.is_stale(idle_before, now),
            Ok(None) => false,
            Err(StoreError::Serialization(e)) => {
                tracing::warn!(token = %token, error = %e, "Dropping undecodable session record");
                true
            }
            Err(e) => return Err(e),
        };
        if !stale {
            return Ok(false);
        }

        match self.store.delete_session(&token) {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn acquire_or_timeout(&self, token: SessionToken) -> Result<ArcMutexGuard<RawMutex, ()>> {
        self.acquire(token, self.lock_timeout).ok_or_else(|| {
            tracing::warn!(
                token = %token,
                timeout_ms = self.lock_timeout.as_millis(),
                "Timed out waiting for session lock"
            );
            StoreError::Timeout(self.lock_timeout)
        })
    }

    fn acquire(
        &self,
        token: SessionToken,
        timeout: Duration,
    ) -> Option<ArcMutexGuard<RawMutex, ()>> {
        let lock = Arc::clone(self.locks.lock().entry(token).or_default());

        let guard = lock.try_lock_arc_for(timeout);
        if guard.is_none() {
            drop(lock);
            self.release(token);
        }
        guard
    }

    /// Drop the lock entry for `token` once nobody else holds or waits on it.
    fn release(&self, token: SessionToken) {
        let mut locks = self.locks.lock();
        if locks
            .get(&token)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&token);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().len()
    }
}

/// An open session.
///
/// Changes are buffered and written by [`Session::close`]. Dropping the
/// handle without closing discards them.
pub struct Session<'g> {
    gateway: &'g SessionGateway,
    record: SessionRecord,
    is_new: bool,
    dirty: bool,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl Session<'_> {
    /// The session token.
    #[must_use]
    pub fn token(&self) -> SessionToken {
        self.record.token
    }

    /// Whether the session did not exist in the store when opened.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    /// The stored principal, regardless of expiry.
    #[must_use]
    pub fn principal(&self) -> Option<&str> {
        self.record.principal.as_deref()
    }

    /// The principal if it is still valid at `now`.
    #[must_use]
    pub fn authenticated_principal(&self, now: chrono::DateTime<Utc>) -> Option<&str> {
        self.record.authenticated_principal(now)
    }

    /// Record a successful authentication. Principal and expiry are only
    /// ever written together.
    pub fn set_authenticated(&mut self, principal: impl Into<String>, expires_at: i64) {
        self.record.principal = Some(principal.into());
        self.record.expires_at = Some(expires_at);
        self.dirty = true;
    }

    /// The serialized request parameters captured before the last redirect.
    #[must_use]
    pub fn stored_parameters(&self) -> Option<&str> {
        self.record.stored_parameters.as_deref()
    }

    /// Replace the stored request parameters.
    pub fn set_stored_parameters(&mut self, stored: String) {
        self.record.stored_parameters = Some(stored);
        self.dirty = true;
    }

    /// The outstanding request nonce.
    #[must_use]
    pub const fn request_id(&self) -> Option<&RequestId> {
        self.record.request_id.as_ref()
    }

    /// Store the nonce of a newly issued request.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.record.request_id = Some(request_id);
        self.dirty = true;
    }

    /// Remove and return the outstanding nonce. A nonce is only ever
    /// compared once.
    pub fn take_request_id(&mut self) -> Option<RequestId> {
        let taken = self.record.request_id.take();
        if taken.is_some() {
            self.dirty = true;
        }
        taken
    }

    /// Whether there are unwritten changes.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write pending changes and release the session.
    ///
    /// The write is durable when this returns, so it is safe to send the
    /// response to the browser afterwards.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write fails; the changes are lost.
    pub fn close(mut self) -> Result<()> {
        if self.dirty {
            self.record.updated_at = Utc::now();
            self.gateway.store.put_session(&self.record)?;
            self.dirty = false;
            tracing::debug!(token = %self.record.token, "Session committed");
        }
        Ok(())
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.dirty {
            tracing::debug!(token = %self.record.token, "Session dropped without commit");
        }
        drop(self.guard.take());
        self.gateway.release(self.record.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_store::MemoryStore;
    use std::thread;

    fn gateway() -> SessionGateway {
        SessionGateway::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn open_missing_session_is_new_and_not_written() {
        let gateway = gateway();
        let token = SessionToken::generate();

        let session = gateway.open(token).unwrap();
        assert!(session.is_new());
        assert!(!session.is_dirty());
        session.close().unwrap();

        assert_eq!(gateway.store().count_sessions().unwrap(), 0);
    }

    #[test]
    fn close_commits_changes() {
        let gateway = gateway();
        let token = SessionToken::generate();

        let mut session = gateway.open(token).unwrap();
        session.set_request_id(RequestId::from_string("n1").unwrap());
        session.set_stored_parameters("{}".to_string());
        session.close().unwrap();

        let session = gateway.open(token).unwrap();
        assert!(!session.is_new());
        assert_eq!(session.request_id().map(RequestId::as_str), Some("n1"));
        assert_eq!(session.stored_parameters(), Some("{}"));
    }

    #[test]
    fn drop_without_close_discards_changes() {
        let gateway = gateway();
        let token = SessionToken::generate();

        {
            let mut session = gateway.open(token).unwrap();
            session.set_authenticated("alice", i64::MAX);
        }

        let session = gateway.open(token).unwrap();
        assert!(session.principal().is_none());
    }

    #[test]
    fn authenticated_fields_are_written_together() {
        let gateway = gateway();
        let token = SessionToken::generate();
        let now = Utc::now();

        let mut session = gateway.open(token).unwrap();
        session.set_authenticated("alice", now.timestamp() + 60);
        session.close().unwrap();

        let record = gateway.store().get_session(&token).unwrap().unwrap();
        assert_eq!(record.principal.as_deref(), Some("alice"));
        assert_eq!(record.expires_at, Some(now.timestamp() + 60));
        assert_eq!(record.authenticated_principal(now), Some("alice"));
    }

    #[test]
    fn take_request_id_consumes() {
        let gateway = gateway();
        let mut session = gateway.open(SessionToken::generate()).unwrap();

        assert!(session.take_request_id().is_none());
        assert!(!session.is_dirty());

        session.set_request_id(RequestId::from_string("n1").unwrap());
        assert_eq!(session.take_request_id().unwrap().as_str(), "n1");
        assert!(session.take_request_id().is_none());
    }

    #[test]
    fn delete_removes_session() {
        let gateway = gateway();
        let token = SessionToken::generate();

        let mut session = gateway.open(token).unwrap();
        session.set_authenticated("alice", i64::MAX);
        session.close().unwrap();

        assert!(gateway.delete(token).unwrap());
        assert!(!gateway.delete(token).unwrap());
        assert!(gateway.open(token).unwrap().is_new());
    }

    #[test]
    fn second_open_times_out_while_first_is_held() {
        let gateway =
            SessionGateway::with_lock_timeout(Arc::new(MemoryStore::new()), Duration::from_millis(20));
        let token = SessionToken::generate();

        let held = gateway.open(token).unwrap();
        let result = thread::scope(|scope| scope.spawn(|| gateway.open(token).map(|_| ())).join());
        assert!(matches!(result.unwrap(), Err(StoreError::Timeout(_))));

        drop(held);
        assert!(gateway.open(token).is_ok());
    }

    #[test]
    fn other_tokens_are_not_blocked() {
        let gateway =
            SessionGateway::with_lock_timeout(Arc::new(MemoryStore::new()), Duration::from_millis(20));

        let _held = gateway.open(SessionToken::generate()).unwrap();
        assert!(gateway.open(SessionToken::generate()).is_ok());
    }

    #[test]
    fn concurrent_writers_are_serialized() {
        let gateway = gateway();
        let token = SessionToken::generate();

        thread::scope(|scope| {
            for i in 0..8 {
                let gateway = &gateway;
                scope.spawn(move || {
                    let mut session = gateway.open(token).unwrap();
                    let count: usize = session
                        .stored_parameters()
                        .map_or(0, |s| s.parse().unwrap());
                    thread::yield_now();
                    session.set_stored_parameters((count + 1).to_string());
                    session.set_request_id(RequestId::from_string(format!("n{i}")).unwrap());
                    session.close().unwrap();
                });
            }
        });

        let session = gateway.open(token).unwrap();
        assert_eq!(session.stored_parameters(), Some("8"));
    }

    fn put_idle(store: &dyn Store, token: SessionToken) {
        let record = SessionRecord::new(token, Utc::now() - chrono::Duration::hours(2));
        store.put_session(&record).unwrap();
    }

    /// Offers every stored record as a purge candidate, fresh or not.
    struct ListEverything(MemoryStore);

    impl Store for ListEverything {
        fn put_session(&self, record: &SessionRecord) -> Result<()> {
            self.0.put_session(record)
        }

        fn get_session(&self, token: &SessionToken) -> Result<Option<SessionRecord>> {
            self.0.get_session(token)
        }

        fn delete_session(&self, token: &SessionToken) -> Result<()> {
            self.0.delete_session(token)
        }

        fn stale_sessions(
            &self,
            _idle_before: DateTime<Utc>,
            now: DateTime<Utc>,
        ) -> Result<Vec<SessionToken>> {
            self.0.stale_sessions(DateTime::<Utc>::MAX_UTC, now)
        }

        fn count_sessions(&self) -> Result<usize> {
            self.0.count_sessions()
        }
    }

    #[test]
    fn purge_removes_idle_sessions() {
        let gateway = gateway();
        let idle = SessionToken::generate();
        put_idle(gateway.store().as_ref(), idle);

        let active = SessionToken::generate();
        let mut session = gateway.open(active).unwrap();
        session.set_request_id(RequestId::generate());
        session.close().unwrap();

        let now = Utc::now();
        assert_eq!(gateway.purge_stale(now - chrono::Duration::hours(1), now).unwrap(), 1);
        assert!(gateway.store().get_session(&idle).unwrap().is_none());
        assert!(gateway.store().get_session(&active).unwrap().is_some());
        assert_eq!(gateway.tracked_locks(), 0);
    }

    #[test]
    fn purge_skips_session_held_open() {
        let gateway = gateway();
        let token = SessionToken::generate();
        put_idle(gateway.store().as_ref(), token);

        let mut session = gateway.open(token).unwrap();
        session.set_request_id(RequestId::from_string("n1").unwrap());

        let now = Utc::now();
        assert_eq!(gateway.purge_stale(now - chrono::Duration::hours(1), now).unwrap(), 0);
        session.close().unwrap();

        let record = gateway.store().get_session(&token).unwrap().unwrap();
        assert_eq!(record.request_id.as_ref().map(RequestId::as_str), Some("n1"));
    }

    #[test]
    fn purge_rechecks_record_under_lock() {
        let gateway = SessionGateway::new(Arc::new(ListEverything(MemoryStore::new())));
        let token = SessionToken::generate();

        // Listed as a candidate, but committed just now by a request.
        let mut session = gateway.open(token).unwrap();
        session.set_request_id(RequestId::from_string("n1").unwrap());
        session.close().unwrap();

        let now = Utc::now();
        assert_eq!(gateway.purge_stale(now - chrono::Duration::hours(1), now).unwrap(), 0);
        assert!(gateway.store().get_session(&token).unwrap().is_some());
    }

    #[test]
    fn lock_table_is_cleaned_up() {
        let gateway = gateway();
        let token = SessionToken::generate();

        let session = gateway.open(token).unwrap();
        assert_eq!(gateway.tracked_locks(), 1);
        drop(session);
        assert_eq!(gateway.tracked_locks(), 0);

        gateway.delete(token).unwrap();
        assert_eq!(gateway.tracked_locks(), 0);
    }
}
