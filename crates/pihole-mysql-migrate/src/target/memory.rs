//! In-process destination for pipeline tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::{DestinationStore, MigrationRecord};
use crate::error::{MigrateError, Result};

/// Shared view of the committed rows, kept after the store moves into a writer.
#[derive(Clone, Default)]
pub struct MemoryTable {
    rows: Arc<Mutex<Vec<MigrationRecord>>>,
    fail_inserts: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MemoryTable {
    pub fn ids(&self) -> Vec<i64> {
        self.rows.lock().unwrap().iter().map(|r| r.query_id).collect()
    }

    pub fn rows(&self) -> Vec<MigrationRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Make every following insert fail and roll back.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Destination backed by a vector, with primary key semantics on `query_id`.
#[derive(Default)]
pub struct MemoryDestination {
    table: MemoryTable,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `records` already committed.
    pub fn with_rows(records: Vec<MigrationRecord>) -> Self {
        let store = Self::new();
        *store.table.rows.lock().unwrap() = records;
        store
    }

    pub fn table(&self) -> MemoryTable {
        self.table.clone()
    }
}

#[async_trait]
impl DestinationStore for MemoryDestination {
    async fn max_cursor(&mut self) -> Result<Option<i64>> {
        Ok(self.table.rows.lock().unwrap().iter().map(|r| r.query_id).max())
    }

    async fn approximate_row_count(&mut self) -> Result<i64> {
        Ok(self.table.len() as i64)
    }

    async fn insert_batch(&mut self, records: &[MigrationRecord]) -> Result<u64> {
        if self.table.fail_inserts.load(Ordering::SeqCst) {
            return Err(MigrateError::connectivity("memory", "insert rejected"));
        }

        let mut rows = self.table.rows.lock().unwrap();
        let mut ids: HashSet<i64> = rows.iter().map(|r| r.query_id).collect();
        for record in records {
            if !ids.insert(record.query_id) {
                return Err(MigrateError::connectivity(
                    "memory",
                    format!("duplicate query_id {}", record.query_id),
                ));
            }
        }
        rows.extend_from_slice(records);
        Ok(records.len() as u64)
    }

    fn store_type(&self) -> &str {
        "memory"
    }

    async fn close(&mut self) {
        self.table.closed.store(true, Ordering::SeqCst);
    }
}
