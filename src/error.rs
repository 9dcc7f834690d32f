//! Error types for sqlbatis.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Setup and assembly failures are hard errors returned to the caller; the only
//! class that is absorbed instead of returned is [`BatisError::LogResolution`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatisError {
    #[error("Setup error: {message}")]
    SetupUsage { message: String, suggestion: String },

    #[error("Log implementation '{name}' could not be resolved: {reason}")]
    LogResolution { name: String, reason: String },

    #[error("Executor assembly failed in interceptor '{interceptor}': {reason}")]
    ExecutorAssembly { interceptor: String, reason: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Executor {executor_id} is closed")]
    ExecutorClosed { executor_id: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BatisError {
    /// Create a setup usage error with a helpful suggestion.
    pub fn setup_usage(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::SetupUsage {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a log resolution error.
    pub fn log_resolution(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LogResolution {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an executor assembly error.
    pub fn executor_assembly(interceptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutorAssembly {
            interceptor: interceptor.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an executor closed error.
    pub fn executor_closed(executor_id: impl ToString) -> Self {
        Self::ExecutorClosed {
            executor_id: executor_id.to_string(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::SetupUsage { suggestion, .. } => Some(suggestion),
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Check if this error means the configuration itself cannot be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SetupUsage { .. } | Self::ExecutorAssembly { .. }
        )
    }
}

/// Convert sqlx errors to BatisError.
impl From<sqlx::Error> for BatisError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => BatisError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                BatisError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => BatisError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => BatisError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                BatisError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => BatisError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => BatisError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => BatisError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => BatisError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                BatisError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                BatisError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::AnyDriverError(err) => BatisError::connection(
                format!("Driver error: {}", err),
                "Check that the database driver is enabled and installed",
            ),
            sqlx::Error::WorkerCrashed => BatisError::internal("Database worker crashed"),
            _ => BatisError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for sqlbatis operations.
pub type BatisResult<T> = Result<T, BatisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BatisError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = BatisError::database(
            "Syntax error",
            Some("42601".to_string()),
            "Check SQL syntax",
        );
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));

        let err = BatisError::setup_usage("duplicate mapper", "Register each mapper once");
        assert_eq!(err.suggestion(), Some("Register each mapper once"));
    }

    #[test]
    fn test_error_retryable() {
        assert!(BatisError::timeout("query", 30).is_retryable());
        assert!(BatisError::connection("err", "sugg").is_retryable());
        assert!(!BatisError::invalid_input("bad").is_retryable());
    }

    #[test]
    fn test_fatal_classes() {
        assert!(BatisError::setup_usage("x", "y").is_fatal());
        assert!(BatisError::executor_assembly("audit", "wrap failed").is_fatal());
        assert!(!BatisError::log_resolution("NOPE", "unknown").is_fatal());
        assert!(!BatisError::timeout("query", 1).is_fatal());
    }

    #[test]
    fn test_executor_assembly_names_interceptor() {
        let err = BatisError::executor_assembly("audit", "dropped the cache capability");
        let msg = err.to_string();
        assert!(msg.contains("audit"));
        assert!(msg.contains("cache capability"));
    }

    #[test]
    fn test_from_sqlx_pool_closed() {
        let err: BatisError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, BatisError::Connection { .. }));
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let err: BatisError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, BatisError::Database { sql_state: None, .. }));
    }
}
