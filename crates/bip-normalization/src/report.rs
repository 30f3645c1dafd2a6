//! Reports returned by the normalization stages.

use bip_model::{ColumnKind, IntegerWidth};
use serde::Serialize;

/// How a column's missing values were handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    /// No missing values.
    Untouched,
    Median,
    Mode,
    /// Text column with no non-null value, filled with `"Unknown"`.
    Sentinel,
    /// No fill value could be determined; the column is unchanged.
    Skipped,
}

impl FillStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Untouched => "untouched",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::Sentinel => "sentinel",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnImputation {
    pub column: String,
    pub kind: ColumnKind,
    pub null_count: usize,
    pub null_percent: f64,
    pub strategy: FillStrategy,
    /// Rendered fill value, when one was applied.
    pub fill_value: Option<String>,
}

/// A column that could not be processed; it is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnFailure {
    pub column: String,
    pub message: String,
}

/// Missing-value analysis and the fills applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImputationReport {
    pub rows: usize,
    pub columns: Vec<ColumnImputation>,
    /// Columns above the critical missing share, still imputed.
    pub critical_columns: Vec<String>,
    pub failures: Vec<ColumnFailure>,
    /// Null cells left after imputation, across all columns.
    pub remaining_nulls: usize,
}

impl ImputationReport {
    pub fn column(&self, name: &str) -> Option<&ColumnImputation> {
        self.columns.iter().find(|c| c.column == name)
    }

    /// Columns that had at least one missing value.
    pub fn with_missing(&self) -> impl Iterator<Item = &ColumnImputation> {
        self.columns.iter().filter(|c| c.null_count > 0)
    }
}

/// Name, kind and physical type of a column at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
    pub dtype: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatetimeCoercion {
    pub column: String,
    /// Values that parsed to a timestamp.
    pub parsed: usize,
    /// Non-null values that failed to parse and became null.
    pub coerced_to_null: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Narrowing {
    pub column: String,
    pub from: String,
    pub to: IntegerWidth,
}

/// Schema before and after type correction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeCorrectionReport {
    pub before: Vec<ColumnSchema>,
    pub after: Vec<ColumnSchema>,
    pub datetime_coercions: Vec<DatetimeCoercion>,
    pub narrowings: Vec<Narrowing>,
    /// Float columns left as float because a value is fractional.
    pub kept_float: Vec<String>,
    pub failures: Vec<ColumnFailure>,
    pub memory_before: usize,
    pub memory_after: usize,
}

impl TypeCorrectionReport {
    /// Bytes saved; negative when the dataset grew.
    pub fn memory_saved(&self) -> i64 {
        self.memory_before as i64 - self.memory_after as i64
    }
}
