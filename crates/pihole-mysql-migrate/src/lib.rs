//! # pihole-mysql-migrate
//!
//! Continuous migration of the Pi-hole FTL query log into a MySQL table.
//!
//! The pipeline runs three tasks until it is cancelled:
//!
//! - **counter**: periodically counts the source queries for progress reporting
//! - **enrichment**: pulls the next batch of queries past the read cursor,
//!   joins client details, and queues the batch
//! - **writer**: commits each queued batch in one transaction and logs
//!   throughput and progress
//!
//! Migration resumes after the highest `query_id` already in the destination,
//! so restarts never duplicate rows.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pihole_mysql_migrate::{Config, Migrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> pihole_mysql_migrate::Result<()> {
//!     let config = Config::load("config.json")?;
//!     let cancel = CancellationToken::new();
//!     let summary = Migrator::new(config).run(cancel).await?;
//!     println!("Migrated {} queries", summary.queries_migrated);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod mapper;
pub mod orchestrator;
pub mod queue;
pub mod reader;
pub mod source;
pub mod target;
pub mod writer;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use core::{Batch, DestinationStore, MigrationRecord, SourceStore};
pub use error::{MigrateError, Result};
pub use orchestrator::{run_pipeline, MigrationSummary, Migrator, PipelineSettings};
pub use queue::{LoadQueue, LoadReceiver, LoadSender};
pub use reader::{EnrichOutcome, ReaderSettings, SourceCursorReader};
pub use source::SqliteSource;
pub use target::MysqlDestination;
pub use writer::{CommitReport, DestinationBatchWriter, WriterSummary};
