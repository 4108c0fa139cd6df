//! Pi-hole FTL SQLite reader.
//!
//! Every call opens its own read-only connection and closes it before
//! returning. The FTL daemon keeps writing to the file while we read, and the
//! counter and enrichment tasks never share a handle.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::core::{SourceRow, SourceStore, SourceValue};
use crate::error::{MigrateError, Result};

/// Row count query used by the counter task.
pub const COUNT_QUERY: &str = "SELECT COUNT(id) FROM queries";

/// Pi-hole query log stored in an FTL SQLite database file.
pub struct SqliteSource {
    db_path: PathBuf,
}

impl SqliteSource {
    /// Create a source for the database file at `db_path`.
    ///
    /// No connection is opened until the first read.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    /// Build the joined load query for one enrichment cycle.
    ///
    /// Both bounds are integers, so they are inlined rather than bound.
    pub fn load_query(after_id: i64, limit: usize) -> String {
        format!(
            "SELECT q.id, q.timestamp, q.type, q.status, q.domain, q.client, q.forward, \
             q.additional_info, na.network_id, na.ip, na.lastSeen, na.name, na.nameUpdated \
             FROM queries AS q \
             LEFT JOIN network_addresses AS na ON na.ip = q.client \
             WHERE q.id > {} ORDER BY q.id LIMIT {};",
            after_id, limit
        )
    }

    async fn connect(&self) -> Result<SqliteConnection> {
        SqliteConnectOptions::new()
            .filename(&self.db_path)
            .read_only(true)
            .connect()
            .await
            .map_err(|e| {
                MigrateError::connectivity(
                    "pihole",
                    format!("opening {}: {}", self.db_path.display(), e),
                )
            })
    }

    /// Convert one row by each cell's storage class.
    fn row_to_values(row: &SqliteRow) -> Result<SourceRow> {
        (0..row.len())
            .map(|i| {
                let raw = row.try_get_raw(i)?;
                if raw.is_null() {
                    return Ok(SourceValue::Null);
                }
                let storage = raw.type_info().name().to_ascii_uppercase();
                let value = match storage.as_str() {
                    "INTEGER" => SourceValue::Integer(row.try_get::<i64, _>(i)?),
                    "REAL" => SourceValue::Real(row.try_get::<f64, _>(i)?),
                    "BLOB" => SourceValue::Blob(row.try_get::<Vec<u8>, _>(i)?),
                    _ => SourceValue::Text(row.try_get::<String, _>(i)?),
                };
                Ok(value)
            })
            .collect()
    }
}

#[async_trait]
impl SourceStore for SqliteSource {
    async fn fetch_after(&self, after_id: i64, limit: usize) -> Result<Vec<SourceRow>> {
        let sql = Self::load_query(after_id, limit);
        let mut conn = self.connect().await?;
        let fetched = sqlx::query(&sql).fetch_all(&mut conn).await;
        conn.close().await.ok();

        let rows = fetched?;
        debug!("SQLite: fetched {} rows after query id {}", rows.len(), after_id);
        rows.iter().map(Self::row_to_values).collect()
    }

    async fn count_queries(&self) -> Result<i64> {
        let mut conn = self.connect().await?;
        let counted = sqlx::query_scalar::<_, i64>(COUNT_QUERY)
            .fetch_one(&mut conn)
            .await;
        conn.close().await.ok();
        Ok(counted?)
    }

    fn store_type(&self) -> &str {
        "sqlite"
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{create_db, execute, generated_queries};
    use super::*;

    #[test]
    fn test_load_query_bounds() {
        let sql = SqliteSource::load_query(1200, 75000);
        assert!(sql.contains("WHERE q.id > 1200 ORDER BY q.id LIMIT 75000;"));
        assert!(sql.contains("LEFT JOIN network_addresses AS na ON na.ip = q.client"));
    }

    #[tokio::test]
    async fn test_fetch_after_joins_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pihole-FTL.db");
        create_db(
            &path,
            &[
                "INSERT INTO queries VALUES (3, 1700000003, 1, 2, 'c.example', '10.0.0.9', NULL, NULL)",
                "INSERT INTO queries VALUES (1, 1700000001, 1, 2, 'a.example', '10.0.0.1', '1.1.1.1#53', NULL)",
                "INSERT INTO queries VALUES (2, 1700000002.5, 16, 3, 'b.example', '10.0.0.1', NULL, X'6869')",
                "INSERT INTO network_addresses VALUES (4, '10.0.0.1', 1699999999, 'desk.lan', 1699000000)",
            ],
        )
        .await;

        let source = SqliteSource::new(&path);
        let rows = source.fetch_after(0, 10).await.unwrap();
        assert_eq!(rows.len(), 3);
        let ids: Vec<_> = rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(
            ids,
            vec![
                SourceValue::Integer(1),
                SourceValue::Integer(2),
                SourceValue::Integer(3)
            ]
        );

        let first = &rows[0];
        assert_eq!(first.len(), 13);
        assert_eq!(first[6], SourceValue::Text("1.1.1.1#53".into()));
        assert_eq!(first[8], SourceValue::Integer(4));
        assert_eq!(first[11], SourceValue::Text("desk.lan".into()));

        assert_eq!(rows[1][1], SourceValue::Real(1_700_000_002.5));
        assert_eq!(rows[1][7], SourceValue::Blob(b"hi".to_vec()));

        let unmatched = &rows[2];
        assert!(unmatched[8..].iter().all(|v| *v == SourceValue::Null));
    }

    #[tokio::test]
    async fn test_fetch_after_respects_cursor_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pihole-FTL.db");
        create_db(&path, &[generated_queries(1, 10).as_str()]).await;

        let source = SqliteSource::new(&path);
        let rows = source.fetch_after(4, 3).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(
            ids,
            vec![
                SourceValue::Integer(5),
                SourceValue::Integer(6),
                SourceValue::Integer(7)
            ]
        );
        assert!(source.fetch_after(10, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_queries_tracks_new_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pihole-FTL.db");
        create_db(&path, &[generated_queries(1, 25).as_str()]).await;

        let source = SqliteSource::new(&path);
        assert_eq!(source.count_queries().await.unwrap(), 25);

        execute(&path, &[generated_queries(26, 5).as_str()]).await;
        assert_eq!(source.count_queries().await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_missing_file_is_connectivity_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = SqliteSource::new(dir.path().join("absent.db"));
        let err = source.count_queries().await.unwrap_err();
        assert!(matches!(err, MigrateError::Connectivity { .. }));
    }
}
