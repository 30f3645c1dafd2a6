//! Error types for dataset normalization.

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizationError {
    /// A stage was invoked before any dataset was loaded.
    #[error("no dataset loaded; load the input file first")]
    NotLoaded,

    #[error("imputation failed for column '{column}': {source}")]
    Imputation {
        column: String,
        #[source]
        source: PolarsError,
    },

    #[error("type correction failed for column '{column}': {source}")]
    TypeCorrection {
        column: String,
        #[source]
        source: PolarsError,
    },

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, NormalizationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NormalizationError::Imputation {
            column: "CustomerID".to_string(),
            source: PolarsError::ComputeError("boom".into()),
        };
        assert!(err.to_string().starts_with("imputation failed for column 'CustomerID'"));
        assert_eq!(
            NormalizationError::NotLoaded.to_string(),
            "no dataset loaded; load the input file first"
        );
    }
}
