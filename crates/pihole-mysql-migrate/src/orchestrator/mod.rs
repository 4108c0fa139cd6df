//! Migration orchestrator - wires the reader, queue and writer together.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, MigrationConfig};
use crate::core::{DestinationStore, SourceStore};
use crate::error::Result;
use crate::queue::LoadQueue;
use crate::reader::{ReaderSettings, SourceCursorReader};
use crate::source::SqliteSource;
use crate::target::MysqlDestination;
use crate::writer::DestinationBatchWriter;

/// Reader cadence plus queue sizing for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub reader: ReaderSettings,
    pub queue_capacity: usize,
}

impl From<&MigrationConfig> for PipelineSettings {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            reader: ReaderSettings::from(config),
            queue_capacity: config.load_queue_capacity,
        }
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSummary {
    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration stopped.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Batches committed during this run.
    pub batches_committed: u64,

    /// Queries committed during this run.
    pub queries_migrated: u64,

    /// Last source id handed to the writer.
    pub read_cursor: i64,

    /// Highest `query_id` in the destination.
    pub resume_cursor: i64,

    /// Destination row estimate at shutdown.
    pub destination_total: i64,
}

/// Migration orchestrator for the Pi-hole to MySQL pipeline.
pub struct Migrator {
    config: Config,
}

impl Migrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Connect to both databases and migrate until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<MigrationSummary> {
        let source = SqliteSource::new(&self.config.source.db_path);
        info!("Reading Pi-hole queries from {}", source.db_path().display());

        let destination = MysqlDestination::connect(&self.config.target).await?;
        run_pipeline(
            Arc::new(source),
            destination,
            PipelineSettings::from(&self.config.migration),
            cancel,
        )
        .await
    }
}

/// Run the reader and writer against the given stores until `cancel` fires
/// or a commit fails.
///
/// The reader resumes after the destination's highest `query_id`. A commit
/// failure cancels `cancel` so the reader tasks stop too, and is returned.
pub async fn run_pipeline<S, D>(
    source: Arc<S>,
    destination: D,
    settings: PipelineSettings,
    cancel: CancellationToken,
) -> Result<MigrationSummary>
where
    S: SourceStore + 'static,
    D: DestinationStore,
{
    let started_at = Utc::now();
    let start = Instant::now();

    let destination_type = destination.store_type().to_string();
    let writer = DestinationBatchWriter::initialize(destination).await?;
    let resume_cursor = writer.resume_cursor();
    info!(
        "Migrating {} -> {} after query id {}",
        source.store_type(),
        destination_type,
        resume_cursor
    );

    let reader = SourceCursorReader::new(source, settings.reader, resume_cursor);
    let (queue_tx, queue_rx) = LoadQueue::bounded(settings.queue_capacity);
    let tasks = reader.spawn(queue_tx, cancel.clone());

    let written = writer.run(queue_rx).await;
    if let Err(e) = &written {
        if e.is_fatal() {
            error!("Stopping migration after fatal error");
        }
        cancel.cancel();
    }

    let read_cursor = match tasks.enrichment.await {
        Ok(cursor) => cursor,
        Err(e) => {
            warn!("Enrichment task did not finish cleanly: {}", e);
            resume_cursor
        }
    };
    if let Err(e) = tasks.counter.await {
        warn!("Counter task did not finish cleanly: {}", e);
    }

    let writer = written?;
    let summary = MigrationSummary {
        started_at,
        completed_at: Utc::now(),
        duration_seconds: start.elapsed().as_secs_f64(),
        batches_committed: writer.batches,
        queries_migrated: writer.records,
        read_cursor,
        resume_cursor: writer.resume_cursor,
        destination_total: writer.destination_total,
    };

    info!(
        "Migration stopped: {} queries in {} batches, {:.1}s",
        summary.queries_migrated, summary.batches_committed, summary.duration_seconds
    );
    Ok(summary)
}
