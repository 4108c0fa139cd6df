//! Store traits at the boundary between the pipeline and the databases.
//!
//! - [`SourceStore`]: the Pi-hole query log being read
//! - [`DestinationStore`]: the table migrated records are committed to
//!
//! The reader and writer are generic over these traits, so the pipeline can be
//! exercised against in-process stores.

use async_trait::async_trait;

use crate::error::Result;

use super::record::MigrationRecord;
use super::value::SourceRow;

/// Read access to the source query log.
///
/// Implementations are shared between the counter and enrichment tasks, and
/// each call opens and closes its own connection, so no connection is ever
/// used by two tasks.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Fetch up to `limit` joined rows with `id > after_id`, ascending by id.
    async fn fetch_after(&self, after_id: i64, limit: usize) -> Result<Vec<SourceRow>>;

    /// Count all rows in the source query table.
    async fn count_queries(&self) -> Result<i64>;

    /// Get the store type identifier (e.g., "sqlite").
    fn store_type(&self) -> &str;
}

/// Write access to the destination table.
///
/// Owned exclusively by the batch writer.
#[async_trait]
pub trait DestinationStore: Send {
    /// Highest `query_id` already committed, or `None` for an empty table.
    async fn max_cursor(&mut self) -> Result<Option<i64>>;

    /// Engine's catalog estimate of the table's row count.
    async fn approximate_row_count(&mut self) -> Result<i64>;

    /// Insert all records in one transaction.
    ///
    /// On any failure the transaction is rolled back and nothing is kept.
    async fn insert_batch(&mut self, records: &[MigrationRecord]) -> Result<u64>;

    /// Get the store type identifier (e.g., "mysql").
    fn store_type(&self) -> &str;

    /// Close the underlying connection.
    async fn close(&mut self);
}
