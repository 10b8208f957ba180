//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use raven_core::SessionToken;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::SessionRecord;
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl Store for RocksStore {
    fn put_session(&self, record: &SessionRecord) -> Result<()> {
        let cf = self.cf(cf::SESSIONS)?;
        let key = keys::session_key(&record.token);
        let value = Self::serialize(record)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_session(&self, token: &SessionToken) -> Result<Option<SessionRecord>> {
        let cf = self.cf(cf::SESSIONS)?;
        let key = keys::session_key(token);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn delete_session(&self, token: &SessionToken) -> Result<()> {
        let cf = self.cf(cf::SESSIONS)?;
        let key = keys::session_key(token);

        let exists = self
            .db
            .get_pinned_cf(&cf, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if !exists {
            return Err(StoreError::NotFound);
        }

        self.db
            .delete_cf(&cf, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn stale_sessions(
        &self,
        idle_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionToken>> {
        let cf = self.cf(cf::SESSIONS)?;
        let mut stale = Vec::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            let Some(token) = keys::token_from_key(&key) else {
                tracing::warn!(key_len = key.len(), "Skipping session entry with malformed key");
                continue;
            };

            // Undecodable records are listed too; nothing can ever read them.
            let is_stale = match Self::deserialize::<SessionRecord>(&value) {
                Ok(record) => record.is_stale(idle_before, now),
                Err(e) => {
                    tracing::warn!(token = %token, error = %e, "Found undecodable session record");
                    true
                }
            };

            if is_stale {
                stale.push(token);
            }
        }

        Ok(stale)
    }

    fn count_sessions(&self) -> Result<usize> {
        let cf = self.cf(cf::SESSIONS)?;

        let mut count = 0usize;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            item.map_err(|e| StoreError::Database(e.to_string()))?;
            count += 1;
        }

        Ok(count)
    }
}
