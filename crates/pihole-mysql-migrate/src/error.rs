//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid file, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source (Pi-hole SQLite) connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Destination (MySQL) connection or query error
    #[error("Destination database error: {0}")]
    Target(#[from] mysql_async::Error),

    /// A store could not be reached, with context
    #[error("Connectivity error ({store}): {message}")]
    Connectivity { store: String, message: String },

    /// A source row could not be coerced into a migration record
    #[error("Transform failed for column {column}: {message}")]
    Transform { column: String, message: String },

    /// Bulk insert or commit of a batch failed; the batch was rolled back
    #[error("Commit failed for queries {from_cursor}..={to_cursor}: {message}")]
    Commit {
        from_cursor: i64,
        to_cursor: i64,
        message: String,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML/JSON deserialization error
    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error (run summary output)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Connectivity error with the name of the store it concerns
    pub fn connectivity(store: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::Connectivity {
            store: store.into(),
            message: message.to_string(),
        }
    }

    /// Create a Transform error
    pub fn transform(column: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transform {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a Commit error for the batch covering `from_cursor..=to_cursor`
    pub fn commit(from_cursor: i64, to_cursor: i64, message: impl std::fmt::Display) -> Self {
        MigrateError::Commit {
            from_cursor,
            to_cursor,
            message: message.to_string(),
        }
    }

    /// Whether this error must stop the whole migration.
    ///
    /// Only commit failures escalate beyond the worker that produced them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MigrateError::Commit { .. })
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 1,
            MigrateError::Commit { .. } => 3,
            MigrateError::Source(_)
            | MigrateError::Target(_)
            | MigrateError::Connectivity { .. } => 4,
            MigrateError::Io(_) | MigrateError::Json(_) => 7,
            MigrateError::Cancelled => 130,
            MigrateError::Transform { .. } => 2,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_commit_errors_are_fatal() {
        assert!(MigrateError::commit(1, 10, "deadlock").is_fatal());
        assert!(!MigrateError::transform("query_type", "not a number").is_fatal());
        assert!(!MigrateError::connectivity("pihole", "unable to open").is_fatal());
        assert!(!MigrateError::Config("missing".into()).is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), 1);
        assert_eq!(MigrateError::commit(0, 1, "x").exit_code(), 3);
        assert_eq!(MigrateError::connectivity("mysql", "x").exit_code(), 4);
        assert_eq!(MigrateError::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_json_error_is_not_a_config_error() {
        let err: MigrateError = serde_json::from_str::<u8>("[").unwrap_err().into();
        assert!(matches!(err, MigrateError::Json(_)));
        assert_eq!(err.exit_code(), 7);
        assert!(err.to_string().starts_with("JSON error:"));
    }

    #[test]
    fn test_commit_error_message_names_range() {
        let err = MigrateError::commit(100, 175, "Duplicate entry");
        assert_eq!(
            err.to_string(),
            "Commit failed for queries 100..=175: Duplicate entry"
        );
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.json");
        let err = MigrateError::Io(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: config.json"));
    }
}
