//! Migration record and batch types.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDateTime;

use super::value::SqlValue;

/// One normalized Pi-hole query event, joined with its client's network entry.
///
/// Client fields that come from `network_addresses` are `None` when the join
/// found no matching entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRecord {
    pub query_id: i64,
    pub query_timestamp: NaiveDateTime,
    pub query_type: i64,
    pub query_status: i64,
    pub query_domain: String,
    pub query_forward: Option<String>,
    pub query_additional_info: Option<String>,
    pub client_ip: String,
    pub client_network_id: Option<i64>,
    pub client_last_seen: Option<NaiveDateTime>,
    pub client_name: Option<String>,
    pub client_last_update: Option<NaiveDateTime>,
}

impl MigrationRecord {
    /// Destination values in [`crate::mapper::destination_columns`] order.
    pub fn to_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Int(self.query_id),
            SqlValue::DateTime(self.query_timestamp),
            SqlValue::Int(self.query_type),
            SqlValue::Int(self.query_status),
            SqlValue::Text(self.query_domain.clone()),
            self.query_forward.clone().into(),
            self.query_additional_info.clone().into(),
            SqlValue::Text(self.client_ip.clone()),
            self.client_network_id.into(),
            self.client_last_seen.into(),
            self.client_name.clone().into(),
            self.client_last_update.into(),
        ]
    }
}

/// Named per-stage durations, kept in the order the stages ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageTimings {
    stages: Vec<(&'static str, Duration)>,
}

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stage, replacing an earlier entry with the same name.
    pub fn record(&mut self, stage: &'static str, elapsed: Duration) {
        match self.stages.iter_mut().find(|(name, _)| *name == stage) {
            Some(entry) => entry.1 = elapsed,
            None => self.stages.push((stage, elapsed)),
        }
    }

    pub fn get(&self, stage: &str) -> Option<Duration> {
        self.stages
            .iter()
            .find(|(name, _)| *name == stage)
            .map(|(_, d)| *d)
    }

    pub fn total(&self) -> Duration {
        self.stages.iter().map(|(_, d)| *d).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Duration)> + '_ {
        self.stages.iter().copied()
    }
}

impl fmt::Display for StageTimings {
    /// `enriched=0.012 / transform=0.003`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, elapsed)) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" / ")?;
            }
            write!(f, "{}={:.3}", name, elapsed.as_secs_f64())?;
        }
        Ok(())
    }
}

/// An ordered, non-empty group of records produced by one enrichment cycle.
#[derive(Debug, Clone)]
pub struct Batch {
    records: Vec<MigrationRecord>,
    /// Total source rows as last counted when the batch was built.
    pub source_total_count: Option<i64>,
    /// Read cursor before this batch (exclusive lower bound).
    pub from_cursor: i64,
    /// `query_id` of the last record (inclusive upper bound).
    pub to_cursor: i64,
    pub timing: StageTimings,
}

impl Batch {
    /// Build a batch from records already ordered by `query_id`.
    ///
    /// Returns `None` for an empty record list; empty batches are never queued.
    pub fn new(
        records: Vec<MigrationRecord>,
        from_cursor: i64,
        source_total_count: Option<i64>,
        timing: StageTimings,
    ) -> Option<Self> {
        let to_cursor = records.last()?.query_id;
        Some(Self {
            records,
            source_total_count,
            from_cursor,
            to_cursor,
            timing,
        })
    }

    pub fn records(&self) -> &[MigrationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
