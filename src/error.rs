//! Error types for litemodel.

use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;

/// The main error type for model, query and catalog operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Unknown table or column, or an invalid schema descriptor.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Malformed statement arguments (empty value set, misplaced LIMIT, ...).
    #[error("Query error: {0}")]
    Query(String),

    /// Failed to parse a filter expression.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Constraint violation or rejected write (duplicate primary key, ...).
    #[error("Write error: {0}")]
    Write(String),

    /// UPDATE without a condition.
    #[error("Update error: {0}")]
    Update(String),

    /// Database file inaccessible or the connection is closed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Any other engine failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an unknown column error.
    pub fn unknown_column(table: &str, column: &str) -> Self {
        Self::Schema(format!("unknown column '{}' on table '{}'", column, table))
    }

    /// Create an unknown table error.
    pub fn unknown_table(table: &str) -> Self {
        Self::Schema(format!("unknown table '{}'", table))
    }
}

impl From<sqlx::Error> for ModelError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if is_constraint(db.as_ref()) => {
                Self::Write(db.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connection(e.to_string()),
            _ => Self::Database(e.to_string()),
        }
    }
}

fn is_constraint(err: &dyn DatabaseError) -> bool {
    !matches!(err.kind(), ErrorKind::Other) || err.message().contains("constraint failed")
}

/// Result type alias for litemodel operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::parse(5, "unexpected character");
        assert_eq!(
            err.to_string(),
            "Parse error at position 5: unexpected character"
        );
    }

    #[test]
    fn test_unknown_column_message() {
        let err = ModelError::unknown_column("reviews", "stars");
        assert_eq!(
            err.to_string(),
            "Schema error: unknown column 'stars' on table 'reviews'"
        );
    }

    #[test]
    fn test_pool_closed_is_connection_error() {
        let err: ModelError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, ModelError::Connection(_)));
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err: ModelError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ModelError::Database(_)));
    }
}
