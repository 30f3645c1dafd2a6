//! Datetime coercion and integer narrowing.

use bip_model::{ColumnKind, Dataset, IntegerWidth};
use polars::prelude::*;

use crate::datetime::{is_temporal_column_name, parse_timestamp};
use crate::error::{NormalizationError, Result};
use crate::report::{ColumnFailure, ColumnSchema, DatetimeCoercion, Narrowing, TypeCorrectionReport};
use crate::stats::ColumnStats;

const TIMESTAMP_DTYPE: DataType = DataType::Datetime(TimeUnit::Microseconds, None);

// Bounds (exclusive above) of integral floats an integer width can hold.
const MIN_SIGNED: f64 = i64::MIN as f64;
const MAX_SIGNED: f64 = 9_223_372_036_854_775_808.0;
const MAX_UNSIGNED: f64 = 18_446_744_073_709_551_616.0;

/// Corrected dataset plus the schema report.
#[derive(Debug, Clone)]
pub struct TypeCorrectionOutcome {
    pub dataset: Dataset,
    pub report: TypeCorrectionReport,
}

enum Change {
    Datetime(Column, DatetimeCoercion),
    Narrowed(Column, Narrowing),
    KeptFloat,
    Unchanged,
}

/// Parses date/time columns and narrows integral float columns.
///
/// Columns whose name contains "date" or "time" (any case) are parsed to
/// microsecond timestamps; values that do not parse become null. Numeric
/// columns with such names hold durations or keys rather than calendar
/// values and go through narrowing like any other. Float columns whose non-null
/// values are all integral are cast to the narrowest [`IntegerWidth`] for
/// their range; any fractional value keeps the column as float.
///
/// A failure on one column is recorded in the report and the remaining
/// columns are still processed.
///
/// # Errors
///
/// [`NormalizationError::NotLoaded`] when called without a dataset.
pub fn correct_datatypes(dataset: impl Into<Option<Dataset>>) -> Result<TypeCorrectionOutcome> {
    let Some(dataset) = dataset.into() else {
        tracing::error!("type correction requested before a dataset was loaded");
        return Err(NormalizationError::NotLoaded);
    };
    Ok(correct_with(dataset, |column| {
        if is_temporal_column_name(column.name()) {
            coerce_datetime(column)
        } else {
            narrow(column)
        }
    }))
}

fn correct_with<F>(dataset: Dataset, correct: F) -> TypeCorrectionOutcome
where
    F: Fn(&Column) -> PolarsResult<Change>,
{
    let _span = tracing::info_span!("correct_datatypes", columns = dataset.width()).entered();

    let mut report = TypeCorrectionReport {
        before: schema_of(dataset.frame()),
        memory_before: dataset.estimated_size(),
        ..TypeCorrectionReport::default()
    };
    let mut frame = dataset.into_frame();

    let columns: Vec<Column> = frame.get_columns().to_vec();
    for column in &columns {
        let name = column.name().to_string();

        let applied = correct(column).and_then(|change| {
            match &change {
                Change::Datetime(replacement, _) | Change::Narrowed(replacement, _) => {
                    frame.with_column(replacement.clone())?;
                }
                Change::KeptFloat | Change::Unchanged => {}
            }
            Ok(change)
        });

        match applied {
            Ok(Change::Datetime(_, coercion)) => {
                tracing::info!(
                    column = %name,
                    parsed = coercion.parsed,
                    coerced_to_null = coercion.coerced_to_null,
                    "converted column to datetime"
                );
                report.datetime_coercions.push(coercion);
            }
            Ok(Change::Narrowed(_, narrowing)) => {
                tracing::info!(
                    column = %name,
                    from = %narrowing.from,
                    to = %narrowing.to,
                    "narrowed column"
                );
                report.narrowings.push(narrowing);
            }
            Ok(Change::KeptFloat) => {
                tracing::debug!(column = %name, "fractional values, kept as float");
                report.kept_float.push(name);
            }
            Ok(Change::Unchanged) => {}
            Err(source) => {
                let err = NormalizationError::TypeCorrection {
                    column: name.clone(),
                    source,
                };
                tracing::error!(column = %name, error = %err, "type correction failed");
                report.failures.push(ColumnFailure {
                    column: name,
                    message: err.to_string(),
                });
            }
        }
    }

    report.after = schema_of(&frame);
    report.memory_after = frame.estimated_size();
    tracing::info!(
        memory_before = report.memory_before,
        memory_after = report.memory_after,
        "memory footprint"
    );

    TypeCorrectionOutcome {
        dataset: Dataset::new(frame),
        report,
    }
}

fn schema_of(frame: &DataFrame) -> Vec<ColumnSchema> {
    frame
        .get_columns()
        .iter()
        .map(|c| ColumnSchema {
            name: c.name().to_string(),
            kind: ColumnKind::from_dtype(c.dtype()),
            dtype: c.dtype().to_string(),
        })
        .collect()
}

fn coerce_datetime(column: &Column) -> PolarsResult<Change> {
    let name = column.name().to_string();
    match column.dtype() {
        DataType::String => {
            let mut parsed = 0;
            let mut coerced_to_null = 0;
            let micros: Vec<Option<i64>> = column
                .str()?
                .into_iter()
                .map(|value| {
                    let value = value?;
                    match parse_timestamp(value) {
                        Some(dt) => {
                            parsed += 1;
                            Some(dt.and_utc().timestamp_micros())
                        }
                        None => {
                            coerced_to_null += 1;
                            None
                        }
                    }
                })
                .collect();
            let replacement = Column::new(column.name().clone(), micros).cast(&TIMESTAMP_DTYPE)?;
            Ok(Change::Datetime(
                replacement,
                DatetimeCoercion {
                    column: name,
                    parsed,
                    coerced_to_null,
                },
            ))
        }
        DataType::Date => {
            let replacement = column.cast(&TIMESTAMP_DTYPE)?;
            let parsed = replacement.len() - replacement.null_count();
            Ok(Change::Datetime(
                replacement,
                DatetimeCoercion {
                    column: name,
                    parsed,
                    coerced_to_null: 0,
                },
            ))
        }
        DataType::Datetime(_, _) => Ok(Change::Unchanged),
        other => {
            tracing::debug!(column = %name, dtype = %other, "not a text column, not parsed");
            narrow(column)
        }
    }
}

fn narrow(column: &Column) -> PolarsResult<Change> {
    if !matches!(column.dtype(), DataType::Float32 | DataType::Float64) {
        return Ok(Change::Unchanged);
    }

    let stats = ColumnStats::compute(column)?;
    let (Some(min), Some(max)) = (stats.min, stats.max) else {
        return Ok(Change::Unchanged);
    };
    let representable = if min < 0.0 {
        min >= MIN_SIGNED && max < MAX_SIGNED
    } else {
        max < MAX_UNSIGNED
    };
    if !stats.all_integral || !representable {
        return Ok(Change::KeptFloat);
    }

    let width = IntegerWidth::select(min as i128, max as i128);
    let replacement = column.cast(&width.dtype())?;
    Ok(Change::Narrowed(
        replacement,
        Narrowing {
            column: column.name().to_string(),
            from: column.dtype().to_string(),
            to: width,
        },
    ))
}
