//! Error types for model validation.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised while building or validating model values.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("column '{name}' not found in dataset")]
    ColumnNotFound { name: String },

    #[error("conflict spec for table '{table}' has no columns")]
    EmptyConflictColumns { table: String },

    #[error("conflict column '{column}' is listed more than once")]
    DuplicateConflictColumn { column: String },

    #[error("table name must not be empty")]
    EmptyTableName,

    #[error("column '{column}' is not numeric ({dtype})")]
    NotNumeric { column: String, dtype: String },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
