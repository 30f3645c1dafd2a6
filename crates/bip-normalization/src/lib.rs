//! Dataset normalization.
//!
//! Two stages, each taking the dataset by value and returning it with a
//! report:
//!
//! - [`impute_missing_values`]: numeric nulls become the column median, text
//!   nulls the column mode (or `"Unknown"`). Rows are never dropped.
//! - [`correct_datatypes`]: columns named like a date or time are parsed to
//!   timestamps (unparseable values become null), and integral float columns
//!   are narrowed to the smallest integer width covering their range.
//!
//! Per-column failures are logged and recorded in the report; the affected
//! column is left as it was and the remaining columns are still processed.
//!
//! # Example
//!
//! ```ignore
//! use bip_normalization::{correct_datatypes, impute_missing_values};
//!
//! let imputed = impute_missing_values(dataset)?;
//! let corrected = correct_datatypes(imputed.dataset)?;
//! println!("{} -> {} bytes", corrected.report.memory_before, corrected.report.memory_after);
//! ```

mod datetime;
mod error;
mod impute;
mod report;
mod stats;
mod types;

pub use datetime::{is_temporal_column_name, parse_timestamp};
pub use error::{NormalizationError, Result};
pub use impute::{CRITICAL_MISSING_PERCENT, ImputationOutcome, UNKNOWN_SENTINEL, impute_missing_values};
pub use report::{
    ColumnFailure, ColumnImputation, ColumnSchema, DatetimeCoercion, FillStrategy,
    ImputationReport, Narrowing, TypeCorrectionReport,
};
pub use stats::{ColumnStats, median};
pub use types::{TypeCorrectionOutcome, correct_datatypes};
