//! Configuration type definitions and defaults.

use std::fmt;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    /// Source database configuration (Pi-hole FTL SQLite file).
    pub source: SourceConfig,

    /// Destination database configuration (MySQL).
    pub target: TargetConfig,

    /// Migration cadence and sizing.
    pub migration: MigrationConfig,

    /// Enable debug logging (default: false).
    pub debug: bool,
}

/// Source database (Pi-hole) configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Path to `pihole-FTL.db`.
    pub db_path: String,
}

/// Destination database (MySQL) configuration.
#[derive(Clone)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Destination table for migrated queries.
    pub table: String,

    /// Username.
    pub username: String,

    /// Password.
    pub password: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("table", &self.table)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Maximum rows pulled from the source per enrichment cycle.
    pub enrich_batch_size: usize,

    /// Delay between enrichment cycles.
    pub enrich_cycle_interval: Duration,

    /// Delay between source row count refreshes.
    pub counter_cycle_interval: Duration,

    /// Maximum number of batches waiting for the writer.
    pub load_queue_capacity: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            enrich_batch_size: DEFAULT_ENRICH_BATCH_SIZE,
            enrich_cycle_interval: Duration::from_secs_f64(DEFAULT_CYCLE_INTERVAL_SECS),
            counter_cycle_interval: Duration::from_secs_f64(DEFAULT_CYCLE_INTERVAL_SECS),
            load_queue_capacity: DEFAULT_LOAD_QUEUE_CAPACITY,
        }
    }
}

pub const DEFAULT_ENRICH_BATCH_SIZE: usize = 75_000;
pub const DEFAULT_CYCLE_INTERVAL_SECS: f64 = 60.0;
pub const DEFAULT_LOAD_QUEUE_CAPACITY: usize = 4;
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Configuration keys, as they appear in the config file (lower or upper case)
/// and in the environment (upper case).
pub mod keys {
    pub const MYSQL_USERNAME: &str = "mysql_username";
    pub const MYSQL_PASSWORD: &str = "mysql_password";
    pub const MYSQL_HOST: &str = "mysql_host";
    pub const MYSQL_PORT: &str = "mysql_port";
    pub const MYSQL_DATABASE: &str = "mysql_database";
    pub const MYSQL_TABLE: &str = "mysql_table";
    pub const PIHOLE_DB_PATH: &str = "pihole_db_path";
    pub const DEBUG: &str = "debug";
    pub const PIHOLE_ENRICH_BATCH_SIZE: &str = "pihole_enrich_batch_size";
    pub const PIHOLE_ENRICH_CYCLE_INTERVAL: &str = "pihole_enrich_cycle_interval";
    pub const PIHOLE_COUNTER_CYCLE_INTERVAL: &str = "pihole_counter_cycle_interval";
    pub const LOAD_QUEUE_CAPACITY: &str = "load_queue_capacity";
}
