//! Source query log access.

mod sqlite;

pub use sqlite::{SqliteSource, COUNT_QUERY};

#[cfg(test)]
pub(crate) use sqlite::fixtures;
