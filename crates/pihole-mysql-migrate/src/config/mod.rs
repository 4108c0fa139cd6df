//! Configuration loading and validation.
//!
//! Values come from an optional config file (JSON or YAML) merged with
//! environment variables; the environment wins. Environment variables use the
//! upper-cased key, e.g. `MYSQL_HOST` or `PIHOLE_ENRICH_BATCH_SIZE`.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use serde::de::{Deserializer, Error as _};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Every configuration key, lower case.
const ALL_KEYS: [&str; 12] = [
    keys::MYSQL_USERNAME,
    keys::MYSQL_PASSWORD,
    keys::MYSQL_HOST,
    keys::MYSQL_PORT,
    keys::MYSQL_DATABASE,
    keys::MYSQL_TABLE,
    keys::PIHOLE_DB_PATH,
    keys::DEBUG,
    keys::PIHOLE_ENRICH_BATCH_SIZE,
    keys::PIHOLE_ENRICH_CYCLE_INTERVAL,
    keys::PIHOLE_COUNTER_CYCLE_INTERVAL,
    keys::LOAD_QUEUE_CAPACITY,
];

/// Flat key/value shape shared by the config file and the environment.
///
/// Scalars are accepted as strings too, since environment values always are.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default, deserialize_with = "lenient")]
    mysql_username: String,

    #[serde(default, deserialize_with = "lenient")]
    mysql_password: String,

    #[serde(default, deserialize_with = "lenient")]
    mysql_host: String,

    #[serde(default = "default_mysql_port", deserialize_with = "lenient")]
    mysql_port: u16,

    #[serde(default, deserialize_with = "lenient")]
    mysql_database: String,

    #[serde(default, deserialize_with = "lenient")]
    mysql_table: String,

    #[serde(default, deserialize_with = "lenient")]
    pihole_db_path: String,

    #[serde(default, deserialize_with = "lenient_flag")]
    debug: bool,

    #[serde(default = "default_enrich_batch_size", deserialize_with = "lenient")]
    pihole_enrich_batch_size: usize,

    #[serde(default = "default_cycle_interval", deserialize_with = "lenient")]
    pihole_enrich_cycle_interval: f64,

    #[serde(default = "default_cycle_interval", deserialize_with = "lenient")]
    pihole_counter_cycle_interval: f64,

    #[serde(default = "default_load_queue_capacity", deserialize_with = "lenient")]
    load_queue_capacity: usize,
}

fn default_mysql_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

fn default_enrich_batch_size() -> usize {
    DEFAULT_ENRICH_BATCH_SIZE
}

fn default_cycle_interval() -> f64 {
    DEFAULT_CYCLE_INTERVAL_SECS
}

fn default_load_queue_capacity() -> usize {
    DEFAULT_LOAD_QUEUE_CAPACITY
}

impl Config {
    /// Load configuration from a file merged with the process environment.
    ///
    /// A missing file is not an error: every value may come from the
    /// environment instead.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = if path.exists() {
            Some(std::fs::read_to_string(path)?)
        } else {
            debug!("Config file {:?} not found, using environment only", path);
            None
        };
        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build configuration from file content and an environment lookup.
    pub fn from_sources<F>(file: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = match file {
            Some(content) if !content.trim().is_empty() => match serde_yaml::from_str(content)? {
                Value::Mapping(map) => normalize_keys(map),
                Value::Null => Mapping::new(),
                _ => {
                    return Err(MigrateError::Config(
                        "config file must contain a key/value object".into(),
                    ))
                }
            },
            _ => Mapping::new(),
        };

        for key in ALL_KEYS {
            if let Some(value) = env(&key.to_uppercase()) {
                values.insert(Value::from(key), Value::from(value));
            }
        }

        let raw: RawConfig = serde_yaml::from_value(Value::Mapping(values))?;
        let config = Config {
            source: SourceConfig {
                db_path: raw.pihole_db_path,
            },
            target: TargetConfig {
                host: raw.mysql_host,
                port: raw.mysql_port,
                database: raw.mysql_database,
                table: raw.mysql_table,
                username: raw.mysql_username,
                password: raw.mysql_password,
            },
            migration: MigrationConfig {
                enrich_batch_size: raw.pihole_enrich_batch_size,
                enrich_cycle_interval: interval(
                    keys::PIHOLE_ENRICH_CYCLE_INTERVAL,
                    raw.pihole_enrich_cycle_interval,
                )?,
                counter_cycle_interval: interval(
                    keys::PIHOLE_COUNTER_CYCLE_INTERVAL,
                    raw.pihole_counter_cycle_interval,
                )?,
                load_queue_capacity: raw.load_queue_capacity,
            },
            debug: raw.debug,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

/// Lower-case the file's keys and drop null entries so they fall back to
/// defaults.
fn normalize_keys(map: Mapping) -> Mapping {
    map.into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| match key {
            Value::String(k) => (Value::String(k.to_lowercase()), value),
            other => (other, value),
        })
        .collect()
}

fn interval(key: &str, secs: f64) -> Result<Duration> {
    if secs.is_finite() && secs > 0.0 {
        Ok(Duration::from_secs_f64(secs))
    } else {
        Err(MigrateError::Config(format!(
            "{} must be a positive number of seconds, got {}",
            key, secs
        )))
    }
}

/// Deserialize a scalar (string, number or bool) through its text form.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let value = Value::deserialize(deserializer)?;
    let raw = scalar_to_string(&value)
        .ok_or_else(|| D::Error::custom(format!("expected a scalar value, got {:?}", value)))?;
    raw.trim()
        .parse()
        .map_err(|e| D::Error::custom(format!("invalid value '{}': {}", raw, e)))
}

/// `true` in any letter case enables the flag; anything else disables it.
fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
