//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.db_path.is_empty() {
        return Err(MigrateError::Config("pihole_db_path is required".into()));
    }

    // Destination validation
    let required = [
        ("mysql_host", &config.target.host),
        ("mysql_database", &config.target.database),
        ("mysql_table", &config.target.table),
        ("mysql_username", &config.target.username),
    ];
    for (key, value) in required {
        if value.trim().is_empty() {
            return Err(MigrateError::Config(format!("{} is required", key)));
        }
    }

    // The table name is spliced into SQL text, so keep it to a plain identifier
    if !config
        .target
        .table
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(MigrateError::Config(format!(
            "mysql_table '{}' must be a plain identifier",
            config.target.table
        )));
    }

    if config.target.port == 0 {
        return Err(MigrateError::Config("mysql_port must be non-zero".into()));
    }

    // Migration config validation
    if config.migration.enrich_batch_size == 0 {
        return Err(MigrateError::Config(
            "pihole_enrich_batch_size must be at least 1".into(),
        ));
    }
    if config.migration.load_queue_capacity == 0 {
        return Err(MigrateError::Config(
            "load_queue_capacity must be at least 1".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                db_path: "/etc/pihole/pihole-FTL.db".to_string(),
            },
            target: TargetConfig {
                host: "localhost".to_string(),
                port: 3306,
                database: "pihole".to_string(),
                table: "queries".to_string(),
                username: "pihole".to_string(),
                password: "password".to_string(),
            },
            migration: MigrationConfig::default(),
            debug: false,
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_db_path() {
        let mut config = valid_config();
        config.source.db_path = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_mysql_host() {
        let mut config = valid_config();
        config.target.host = "  ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_table_must_be_identifier() {
        let mut config = valid_config();
        config.target.table = "queries; DROP TABLE x".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = valid_config();
        config.migration.enrich_batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut config = valid_config();
        config.migration.load_queue_capacity = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
