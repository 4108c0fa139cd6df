//! Core types shared by the reader, the writer and the stores.
//!
//! - [`value`]: raw source cells and typed destination values
//! - [`record`]: migration records, batches and stage timings
//! - [`traits`]: source and destination store abstractions

pub mod record;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use record::{Batch, MigrationRecord, StageTimings};
pub use traits::{DestinationStore, SourceStore};
pub use value::{SourceRow, SourceValue, SqlValue};
