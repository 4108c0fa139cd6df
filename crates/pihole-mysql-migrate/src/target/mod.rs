//! Destination table access.

mod mysql;

#[cfg(test)]
pub(crate) mod memory;

pub use mysql::MysqlDestination;
