//! MySQL destination writer.
//!
//! Holds one long-lived connection that only the batch writer uses.
//! Batches are written with multi-row INSERT statements inside a single
//! transaction.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, TxOpts};
use tracing::{debug, info};

use crate::config::TargetConfig;
use crate::core::{DestinationStore, MigrationRecord, SqlValue};
use crate::error::{MigrateError, Result};
use crate::mapper::destination_columns;

/// MySQL max placeholders per prepared statement.
const MYSQL_MAX_PLACEHOLDERS: usize = 65535;

/// MySQL destination for migrated query records.
pub struct MysqlDestination {
    conn: Option<Conn>,
    database: String,
    table: String,
}

impl MysqlDestination {
    /// Open the destination connection and verify it responds.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.username))
            .pass(Some(&config.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        let opts: Opts = builder.into();
        let mut conn = Conn::new(opts)
            .await
            .map_err(|e| MigrateError::connectivity("mysql", e))?;

        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::connectivity("mysql", e))?;

        info!(
            "Connected to MySQL destination: {}:{}/{}.{}",
            config.host, config.port, config.database, config.table
        );

        Ok(Self {
            conn: Some(conn),
            database: config.database.clone(),
            table: config.table.clone(),
        })
    }

    /// Quote a MySQL identifier.
    fn quote_ident(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Qualify a table name with database.
    fn qualify_table(database: &str, table: &str) -> String {
        format!(
            "{}.{}",
            Self::quote_ident(database),
            Self::quote_ident(table)
        )
    }

    fn qualified_table(&self) -> String {
        Self::qualify_table(&self.database, &self.table)
    }

    fn conn(&mut self) -> Result<&mut Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| MigrateError::connectivity("mysql", "connection already closed"))
    }

    /// Build the INSERT statement for `rows` records.
    fn insert_sql(qualified_table: &str, rows: usize) -> String {
        let columns: Vec<String> = destination_columns().map(Self::quote_ident).collect();
        let row_placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            qualified_table,
            columns.join(", "),
            vec![row_placeholders; rows].join(", ")
        )
    }

    /// Records per INSERT statement without exceeding the placeholder cap.
    fn rows_per_statement() -> usize {
        MYSQL_MAX_PLACEHOLDERS / destination_columns().count()
    }
}

#[async_trait]
impl DestinationStore for MysqlDestination {
    async fn max_cursor(&mut self) -> Result<Option<i64>> {
        let sql = format!("SELECT MAX(query_id) FROM {}", self.qualified_table());
        let max: Option<Option<i64>> = self.conn()?.query_first(&sql).await?;
        Ok(max.flatten())
    }

    async fn approximate_row_count(&mut self) -> Result<i64> {
        let sql = "SELECT table_rows FROM information_schema.tables \
                   WHERE table_schema = ? AND table_name = ?";
        let params = (self.database.clone(), self.table.clone());
        let rows: Option<Option<i64>> = self.conn()?.exec_first(sql, params).await?;
        Ok(rows.flatten().unwrap_or(0))
    }

    async fn insert_batch(&mut self, records: &[MigrationRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let qualified_table = self.qualified_table();
        let max_rows = Self::rows_per_statement();
        let conn = self.conn()?;
        let mut tx = conn.start_transaction(TxOpts::default()).await?;

        for chunk in records.chunks(max_rows) {
            let sql = Self::insert_sql(&qualified_table, chunk.len());
            let params: Vec<mysql_async::Value> = chunk
                .iter()
                .flat_map(|record| record.to_values().into_iter().map(sql_value_to_mysql))
                .collect();

            if let Err(e) = tx.exec_drop(&sql, params).await {
                tx.rollback().await.ok();
                return Err(e.into());
            }
        }

        tx.commit().await?;

        debug!(
            "MySQL: wrote {} rows to {} using INSERT",
            records.len(),
            qualified_table
        );
        Ok(records.len() as u64)
    }

    fn store_type(&self) -> &str {
        "mysql"
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.disconnect().await.ok();
        }
    }
}

/// Convert SqlValue to mysql_async::Value.
fn sql_value_to_mysql(value: SqlValue) -> mysql_async::Value {
    match value {
        SqlValue::Null => mysql_async::Value::NULL,
        SqlValue::Int(i) => mysql_async::Value::from(i),
        SqlValue::Text(s) => mysql_async::Value::from(s),
        SqlValue::DateTime(dt) => mysql_async::Value::from(dt),
    }
}
