//! Source-side cursor and the two periodic reader tasks.
//!
//! The counter task refreshes the source row total and publishes it on a
//! watch channel. The enrichment task pulls the next rows past the read
//! cursor, transforms them and hands the batch to the writer. Each task waits
//! its interval only after a cycle completes, so a task never overlaps itself.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MigrationConfig;
use crate::core::{Batch, SourceStore, StageTimings};
use crate::error::Result;
use crate::format::millify;
use crate::mapper::transform_row;
use crate::queue::LoadSender;

/// Delay before the first cycle of each task.
pub const START_DELAY: Duration = Duration::from_secs(1);

/// Reader cadence and sizing.
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    pub batch_size: usize,
    pub enrich_interval: Duration,
    pub counter_interval: Duration,
    pub start_delay: Duration,
}

impl From<&MigrationConfig> for ReaderSettings {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            batch_size: config.enrich_batch_size,
            enrich_interval: config.enrich_cycle_interval,
            counter_interval: config.counter_cycle_interval,
            start_delay: START_DELAY,
        }
    }
}

/// Result of one enrichment cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// No rows past the cursor.
    Idle,
    /// A batch was queued and the cursor advanced.
    Enqueued {
        records: usize,
        from_cursor: i64,
        to_cursor: i64,
    },
    /// A row failed to transform; nothing was queued and the cursor stayed put.
    Discarded { attempted: usize, transformed: usize },
    /// The writer is gone; the batch was dropped and the cursor stayed put.
    QueueClosed,
}

/// Join handles for the spawned reader tasks.
pub struct ReaderTasks {
    /// Resolves to the final read cursor.
    pub enrichment: JoinHandle<i64>,
    pub counter: JoinHandle<()>,
}

/// Owns the read cursor and drives the counter and enrichment tasks.
pub struct SourceCursorReader<S: SourceStore> {
    source: Arc<S>,
    settings: ReaderSettings,
    read_cursor: i64,
    totals_tx: Arc<watch::Sender<Option<i64>>>,
    totals_rx: watch::Receiver<Option<i64>>,
}

impl<S: SourceStore + 'static> SourceCursorReader<S> {
    /// Create a reader that resumes after `resume_cursor`.
    pub fn new(source: Arc<S>, settings: ReaderSettings, resume_cursor: i64) -> Self {
        let (totals_tx, totals_rx) = watch::channel(None);
        Self {
            source,
            settings,
            read_cursor: resume_cursor,
            totals_tx: Arc::new(totals_tx),
            totals_rx,
        }
    }

    /// Last source id handed to the writer.
    pub fn read_cursor(&self) -> i64 {
        self.read_cursor
    }

    /// Subscribe to source row total updates.
    pub fn source_totals(&self) -> watch::Receiver<Option<i64>> {
        self.totals_rx.clone()
    }

    /// Run one counter cycle.
    pub async fn refresh_source_total(&self) -> Result<i64> {
        count_cycle(self.source.as_ref(), self.totals_tx.as_ref()).await
    }

    /// Run one enrichment cycle.
    pub async fn enrich_once(&mut self, queue: &LoadSender) -> Result<EnrichOutcome> {
        let mut timing = StageTimings::new();

        let started = Instant::now();
        let rows = self
            .source
            .fetch_after(self.read_cursor, self.settings.batch_size)
            .await?;
        timing.record("enriched", started.elapsed());

        if rows.is_empty() {
            debug!("No new queries after id {}", self.read_cursor);
            return Ok(EnrichOutcome::Idle);
        }

        let started = Instant::now();
        let attempted = rows.len();
        let mut records = Vec::with_capacity(attempted);
        let mut first_error = None;
        for row in &rows {
            match transform_row(row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!("Failed to transform query {:?}: {}", row.first(), e);
                    first_error.get_or_insert(e);
                }
            }
        }
        let transform_elapsed = started.elapsed();
        timing.record("transform", transform_elapsed);

        if let Some(e) = first_error {
            error!(
                "{}/{} queries transformed, batch discarded: {}, Duration: {:.3}",
                records.len(),
                attempted,
                e,
                transform_elapsed.as_secs_f64()
            );
            return Ok(EnrichOutcome::Discarded {
                attempted,
                transformed: records.len(),
            });
        }

        let source_total = *self.totals_rx.borrow();
        let from_cursor = self.read_cursor;
        let Some(batch) = Batch::new(records, from_cursor, source_total, timing) else {
            return Ok(EnrichOutcome::Idle);
        };
        let to_cursor = batch.to_cursor;
        let count = batch.len();

        if queue.enqueue(batch).await.is_err() {
            warn!("Load queue closed, dropping queries {}..={}", from_cursor + 1, to_cursor);
            return Ok(EnrichOutcome::QueueClosed);
        }
        self.read_cursor = to_cursor;

        debug!(
            "Queued {} queries ({}..={}), {} queue slots free",
            count,
            from_cursor + 1,
            to_cursor,
            queue.available()
        );
        Ok(EnrichOutcome::Enqueued {
            records: count,
            from_cursor,
            to_cursor,
        })
    }

    /// Start the counter and enrichment tasks.
    ///
    /// Both stop at their next wake after `cancel` fires; an in-flight cycle
    /// is allowed to finish. The enrichment task owns `queue`, so the writer
    /// sees end-of-stream once it stops.
    pub fn spawn(self, queue: LoadSender, cancel: CancellationToken) -> ReaderTasks {
        let counter = tokio::spawn(run_counter(
            self.source.clone(),
            self.totals_tx.clone(),
            self.settings.clone(),
            cancel.clone(),
        ));
        let enrichment = tokio::spawn(self.run_enrichment(queue, cancel));
        ReaderTasks {
            enrichment,
            counter,
        }
    }

    async fn run_enrichment(mut self, queue: LoadSender, cancel: CancellationToken) -> i64 {
        info!(
            "Enrichment started after query id {}, batch size {}",
            self.read_cursor, self.settings.batch_size
        );

        let mut wait = self.settings.start_delay;
        while sleep_or_cancel(wait, &cancel).await {
            match self.enrich_once(&queue).await {
                Ok(EnrichOutcome::QueueClosed) => break,
                Ok(_) => {}
                Err(e) => error!("Enrichment cycle failed: {}", e),
            }
            wait = self.settings.enrich_interval;
        }

        info!("Enrichment stopped at query id {}", self.read_cursor);
        self.read_cursor
    }
}

async fn run_counter<S: SourceStore>(
    source: Arc<S>,
    totals: Arc<watch::Sender<Option<i64>>>,
    settings: ReaderSettings,
    cancel: CancellationToken,
) {
    let mut wait = settings.start_delay;
    while sleep_or_cancel(wait, &cancel).await {
        if let Err(e) = count_cycle(source.as_ref(), totals.as_ref()).await {
            error!("Failed to count PiHole queries: {}", e);
        }
        wait = settings.counter_interval;
    }
    debug!("Counter stopped");
}

async fn count_cycle<S: SourceStore + ?Sized>(
    source: &S,
    totals: &watch::Sender<Option<i64>>,
) -> Result<i64> {
    debug!("Loading PiHole metadata from {}", source.store_type());
    let started = Instant::now();
    let total = source.count_queries().await?;
    totals.send_replace(Some(total));
    info!(
        "{} queries found in PiHole DB, Duration: {:.3}",
        millify(total as f64, 3),
        started.elapsed().as_secs_f64()
    );
    Ok(total)
}

/// Sleep for `wait`; `false` if cancelled first.
async fn sleep_or_cancel(wait: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(wait) => true,
    }
}
