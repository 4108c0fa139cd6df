//! Destination-side batch writer.
//!
//! Drains the load queue one batch at a time. Every batch is committed in a
//! single transaction; a failed commit is rolled back and stops the writer.
//! After each commit the destination is read back to refresh the resume cursor
//! and the row total used for progress reporting.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::core::{Batch, DestinationStore, StageTimings};
use crate::error::{MigrateError, Result};
use crate::format::{format_progress, millify, progress_ratio};
use crate::queue::LoadReceiver;

/// What one commit did, as logged.
#[derive(Debug, Clone)]
pub struct CommitReport {
    pub records: usize,
    pub to_cursor: i64,
    /// Records per second over commit and stats refresh time.
    pub rate: f64,
    /// Destination total over the batch's source total snapshot.
    pub progress: Option<f64>,
    pub timing: StageTimings,
}

/// Totals for a finished drain loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterSummary {
    pub batches: u64,
    pub records: u64,
    pub resume_cursor: i64,
    pub destination_total: i64,
}

/// Owns the destination connection, the resume cursor and the destination total.
pub struct DestinationBatchWriter<D: DestinationStore> {
    store: D,
    resume_cursor: i64,
    destination_total: i64,
    batches: u64,
    records: u64,
}

impl<D: DestinationStore> DestinationBatchWriter<D> {
    /// Prime the resume cursor and destination total from `store`.
    pub async fn initialize(mut store: D) -> Result<Self> {
        let started = Instant::now();
        let resume_cursor = store.max_cursor().await?.unwrap_or(0);
        let destination_total = store.approximate_row_count().await?;

        let mut timing = StageTimings::new();
        timing.record("stats", started.elapsed());
        info!(
            "Database contains {} queries, Duration: {}",
            millify(destination_total as f64, 3),
            timing
        );
        debug!(
            "Resuming {} destination after query id {}",
            store.store_type(),
            resume_cursor
        );

        Ok(Self {
            store,
            resume_cursor,
            destination_total,
            batches: 0,
            records: 0,
        })
    }

    /// Highest committed `query_id`, 0 for an empty destination.
    pub fn resume_cursor(&self) -> i64 {
        self.resume_cursor
    }

    pub fn destination_total(&self) -> i64 {
        self.destination_total
    }

    pub fn summary(&self) -> WriterSummary {
        WriterSummary {
            batches: self.batches,
            records: self.records,
            resume_cursor: self.resume_cursor,
            destination_total: self.destination_total,
        }
    }

    /// Commit one batch and refresh destination statistics.
    ///
    /// Fails with [`MigrateError::Commit`] if the insert did not commit.
    pub async fn commit_batch(&mut self, batch: Batch) -> Result<CommitReport> {
        let first_id = batch
            .records()
            .first()
            .map_or(batch.from_cursor + 1, |r| r.query_id);
        let mut timing = batch.timing.clone();

        let started = Instant::now();
        self.store
            .insert_batch(batch.records())
            .await
            .map_err(|e| MigrateError::commit(first_id, batch.to_cursor, e))?;
        let commit_elapsed = started.elapsed();
        timing.record("commit", commit_elapsed);

        self.batches += 1;
        self.records += batch.len() as u64;

        let started = Instant::now();
        self.refresh_statistics(batch.to_cursor).await;
        let stats_elapsed = started.elapsed();
        timing.record("stats", stats_elapsed);
        timing.record("batch", timing.total());

        let rate = throughput(batch.len(), commit_elapsed + stats_elapsed);
        let progress = progress_ratio(self.destination_total, batch.source_total_count);
        let progress_str = match (progress, batch.source_total_count) {
            (Some(ratio), Some(source_total)) => format!(
                " - {} [{}/{}]",
                format_progress(ratio),
                millify(self.destination_total as f64, 3),
                millify(source_total as f64, 3)
            ),
            _ => String::new(),
        };

        info!(
            "{} queries migrated at {}/s{}, Duration: {}",
            millify(batch.len() as f64, 0),
            millify(rate, 3),
            progress_str,
            timing
        );

        Ok(CommitReport {
            records: batch.len(),
            to_cursor: batch.to_cursor,
            rate,
            progress,
            timing,
        })
    }

    /// Re-read cursor and total; a failed read keeps the committed cursor.
    async fn refresh_statistics(&mut self, committed_to: i64) {
        match self.store.max_cursor().await {
            Ok(cursor) => self.resume_cursor = cursor.unwrap_or(committed_to),
            Err(e) => {
                warn!("Failed to refresh destination cursor: {}", e);
                self.resume_cursor = self.resume_cursor.max(committed_to);
            }
        }
        match self.store.approximate_row_count().await {
            Ok(total) => self.destination_total = total,
            Err(e) => warn!("Failed to refresh destination row count: {}", e),
        }
    }

    /// Drain `queue` until it is closed and empty, then close the connection.
    ///
    /// A commit failure stops the loop immediately; batches still queued are
    /// dropped and the error is returned.
    pub async fn run(mut self, mut queue: LoadReceiver) -> Result<WriterSummary> {
        let result = loop {
            let Some(batch) = queue.next().await else {
                break Ok(());
            };
            if let Err(e) = self.commit_batch(batch).await {
                error!("{}", e.format_detailed());
                queue.close();
                break Err(e);
            }
        };

        self.store.close().await;
        info!(
            "Writer stopped after {} batches ({} queries), resume cursor {}",
            self.batches, self.records, self.resume_cursor
        );
        result.map(|_| self.summary())
    }
}

fn throughput(records: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        records as f64 / secs
    } else {
        0.0
    }
}
