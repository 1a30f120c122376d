//! Redb (Rust embedded database) backend for the aggregate.
//!
//! The compare and the write run inside one redb write transaction. Redb
//! admits a single writer at a time, so no other writer can slip in between
//! reading the current value and inserting the next one. A conflict aborts
//! the transaction and leaves the file untouched.
//!
//! Redb locks its file for one process. Deployments with several replicas
//! sharing one aggregate use the Redis backend instead.

use crate::backend::matches_expected;
use crate::{Aggregate, AggregateStore, CasOutcome, StoreError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Table definition for the aggregate slot
const AGGREGATE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("centroid_aggregate");

/// Redb backend holding the aggregate under a single key.
pub struct RedbStore {
    db: Arc<Database>,
    key: String,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// ```no_run
    /// use store::RedbStore;
    ///
    /// let store = RedbStore::open("/tmp/centroid.redb", "centroid:aggregate").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, key: &str) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(StoreError::unavailable)?;

        // Accessing the table creates it if it doesn't exist
        let write_txn = db.begin_write().map_err(StoreError::unavailable)?;
        {
            let _table = write_txn
                .open_table(AGGREGATE_TABLE)
                .map_err(StoreError::unavailable)?;
        }
        write_txn.commit().map_err(StoreError::unavailable)?;

        Ok(Self {
            db: Arc::new(db),
            key: key.to_string(),
        })
    }
}

impl AggregateStore for RedbStore {
    fn load(&self) -> Result<Option<Aggregate>, StoreError> {
        let read_txn = self.db.begin_read().map_err(StoreError::unavailable)?;
        let table = read_txn
            .open_table(AGGREGATE_TABLE)
            .map_err(StoreError::unavailable)?;

        match table
            .get(self.key.as_str())
            .map_err(StoreError::unavailable)?
        {
            Some(value) => Aggregate::decode(value.value()).map(Some),
            None => Ok(None),
        }
    }

    fn compare_and_store(
        &self,
        expected: Option<&Aggregate>,
        next: &Aggregate,
    ) -> Result<CasOutcome, StoreError> {
        let payload = next.encode()?;
        let write_txn = self.db.begin_write().map_err(StoreError::unavailable)?;

        let matched = {
            let mut table = write_txn
                .open_table(AGGREGATE_TABLE)
                .map_err(StoreError::unavailable)?;
            let current = table
                .get(self.key.as_str())
                .map_err(StoreError::unavailable)?
                .map(|guard| guard.value().to_vec());

            let matched = matches_expected(current.as_deref(), expected)?;
            if matched {
                table
                    .insert(self.key.as_str(), payload.as_slice())
                    .map_err(StoreError::unavailable)?;
            }
            matched
        };

        if !matched {
            write_txn.abort().map_err(StoreError::unavailable)?;
            debug!(key = %self.key, "redb compare-and-store conflict");
            return Ok(CasOutcome::Conflict);
        }

        write_txn.commit().map_err(StoreError::unavailable)?;
        Ok(CasOutcome::Stored)
    }

    fn name(&self) -> &'static str {
        "redb"
    }
}
