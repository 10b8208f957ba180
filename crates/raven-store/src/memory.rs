//! In-memory storage implementation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use raven_core::SessionToken;

use crate::error::{Result, StoreError};
use crate::types::SessionRecord;
use crate::Store;

/// Process-local session store.
///
/// Records are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionToken, SessionRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn put_session(&self, record: &SessionRecord) -> Result<()> {
        self.sessions.write().insert(record.token, record.clone());
        Ok(())
    }

    fn get_session(&self, token: &SessionToken) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.read().get(token).cloned())
    }

    fn delete_session(&self, token: &SessionToken) -> Result<()> {
        self.sessions
            .write()
            .remove(token)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn stale_sessions(
        &self,
        idle_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionToken>> {
        Ok(self
            .sessions
            .read()
            .values()
            .filter(|record| record.is_stale(idle_before, now))
            .map(|record| record.token)
            .collect())
    }

    fn count_sessions(&self) -> Result<usize> {
        Ok(self.sessions.read().len())
    }
}
