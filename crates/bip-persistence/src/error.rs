//! Error types for the persistence layer.
//!
//! Errors are classified so the retry combinator can tell transient
//! connectivity failures from faults that retrying would not fix:
//! - Retryable: connection refused, reset, server starting up or shutting down
//! - Fatal: authentication, configuration, statement, schema and data errors

use bip_model::ModelError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transient connectivity failure (retryable)
    Connection,
    Authentication,
    Configuration,
    /// Statement execution, including commit and rollback
    Execution,
    /// Missing table, unknown column
    Schema,
    /// Dataset values that cannot be written as-is
    Data,
    /// A write or query aborted part way
    Operation,
}

impl ErrorCategory {
    #[inline]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Connection)
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("authentication failed: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("connection handle is closed")]
    HandleClosed,

    #[error("statement failed: {message}")]
    Statement {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    #[error("schema error for table '{table}': {message}")]
    Schema { table: String, message: String },

    #[error("type conversion error for column '{column}': {message}")]
    TypeConversion { column: String, message: String },

    #[error("conflict column '{column}' is null in row {row}")]
    NullConflictKey { column: String, row: usize },

    #[error("upsert into '{table}' failed ({rows_committed} rows committed): {source}")]
    Upsert {
        table: String,
        rows_committed: u64,
        #[source]
        source: Box<PersistenceError>,
    },

    #[error("query failed: {source}")]
    Query {
        #[source]
        source: Box<PersistenceError>,
    },

    #[error("write to '{table}' failed: {source}")]
    Write {
        table: String,
        #[source]
        source: Box<PersistenceError>,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl PersistenceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Configuration { .. } | Self::HandleClosed => ErrorCategory::Configuration,
            Self::Statement { .. } => ErrorCategory::Execution,
            Self::Schema { .. } => ErrorCategory::Schema,
            Self::TypeConversion { .. } | Self::NullConflictKey { .. } | Self::Model(_) => {
                ErrorCategory::Data
            }
            Self::Upsert { .. } | Self::Query { .. } | Self::Write { .. } => {
                ErrorCategory::Operation
            }
        }
    }

    /// Whether retrying the operation may succeed
    #[inline]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn authentication_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Authentication {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn statement(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Statement {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    pub fn statement_with_source(
        message: impl Into<String>,
        sql: Option<&str>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Statement {
            message: message.into(),
            sql: sql.map(str::to_string),
            source: Some(Box::new(source)),
        }
    }

    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn type_conversion(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeConversion {
            column: column.into(),
            message: message.into(),
        }
    }

    /// The innermost error, looking through `Upsert`, `Query` and `Write`.
    pub fn root_cause(&self) -> &PersistenceError {
        match self {
            Self::Upsert { source, .. } | Self::Query { source } | Self::Write { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connection_errors_retry() {
        assert!(PersistenceError::connection("refused").is_retryable());
        assert!(!PersistenceError::config("bad port").is_retryable());
        assert!(
            !PersistenceError::Authentication {
                message: "password authentication failed".into(),
                source: None,
            }
            .is_retryable()
        );
        assert!(!PersistenceError::statement("syntax error", "SELEC 1").is_retryable());
        assert!(!PersistenceError::HandleClosed.is_retryable());
    }

    #[test]
    fn test_wrapped_display_and_root_cause() {
        let err = PersistenceError::Upsert {
            table: "retail".into(),
            rows_committed: 1000,
            source: Box::new(PersistenceError::statement("deadlock detected", "INSERT")),
        };
        assert_eq!(
            err.to_string(),
            "upsert into 'retail' failed (1000 rows committed): statement failed: deadlock detected"
        );
        assert!(matches!(err.root_cause(), PersistenceError::Statement { .. }));
        assert_eq!(err.category(), ErrorCategory::Operation);
    }
}
