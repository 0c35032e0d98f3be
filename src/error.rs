//! Error types for the data-access layer.
//!
//! This module defines all error types using `thiserror` for ergonomic error
//! handling. Builder errors fail fast; driver errors are classified so callers
//! can tell a broken descriptor from a broken backend.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Unsupported query operation: {operation}")]
    UnsupportedOperation { operation: String },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42S02" for unknown table
        sql_state: Option<String>,
    },

    #[error("Key-value store error: {message}")]
    Cache { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DataError {
    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error.
    pub fn unsupported_operation(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a key-value store error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for descriptor problems the caller must fix; these are never
    /// worth retrying against the backend.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuery { .. } | Self::UnsupportedOperation { .. }
        )
    }
}

/// Convert sqlx errors to DataError.
impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DataError::connection(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DataError::database(db_err.message(), code)
            }
            sqlx::Error::PoolTimedOut => {
                DataError::connection("Timed out acquiring a pooled connection")
            }
            sqlx::Error::PoolClosed => DataError::connection("Connection pool is closed"),
            sqlx::Error::Io(io_err) => DataError::connection(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => DataError::connection(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => DataError::connection(format!("Protocol error: {}", msg)),
            sqlx::Error::ColumnDecode { index, source } => {
                DataError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DataError::internal(format!("Decode error: {}", source)),
            _ => DataError::database(err.to_string(), None),
        }
    }
}

/// Convert redis errors to DataError.
impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_io_error() {
            DataError::connection(err.to_string())
        } else {
            DataError::cache(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for data-layer operations.
pub type DataResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataError::invalid_query("missing table");
        assert!(err.to_string().contains("Invalid query"));

        let err = DataError::unsupported_operation("truncate");
        assert!(err.to_string().contains("truncate"));
    }

    #[test]
    fn test_caller_errors() {
        assert!(DataError::invalid_query("bad").is_caller_error());
        assert!(DataError::unsupported_operation("merge").is_caller_error());
        assert!(!DataError::connection("refused").is_caller_error());
        assert!(!DataError::cache("down").is_caller_error());
    }

    #[test]
    fn test_database_error_keeps_sql_state() {
        let err = DataError::database("unknown table", Some("42S02".to_string()));
        match err {
            DataError::Database { sql_state, .. } => {
                assert_eq!(sql_state.as_deref(), Some("42S02"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_serde_error_maps_to_serialization() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: DataError = parse_err.into();
        assert!(matches!(err, DataError::Serialization { .. }));
    }
}
