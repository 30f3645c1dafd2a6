//! Missing-value imputation.

use std::collections::HashMap;
use std::hash::Hash;

use bip_common::format_numeric;
use bip_model::{ColumnKind, Dataset};
use polars::prelude::*;

use crate::error::{NormalizationError, Result};
use crate::report::{ColumnFailure, ColumnImputation, FillStrategy, ImputationReport};
use crate::stats::median;

/// Columns missing more than this share of values are reported as critical.
pub const CRITICAL_MISSING_PERCENT: f64 = 50.0;

/// Fill value for text columns without any non-null value.
pub const UNKNOWN_SENTINEL: &str = "Unknown";

/// Imputed dataset plus the analysis of what was filled.
#[derive(Debug, Clone)]
pub struct ImputationOutcome {
    pub dataset: Dataset,
    pub report: ImputationReport,
}

/// Fills missing values column by column.
///
/// - Numeric columns: median of the non-null values. Integer columns whose
///   median is fractional are widened to `Float64` first. All-null numeric
///   columns are skipped.
/// - Text columns: most frequent value, ties going to the value seen first;
///   `"Unknown"` when the column has no value at all. Null-typed columns are
///   treated as text.
///
/// Rows are never dropped. A column that fails is left as it was and listed
/// in [`ImputationReport::failures`].
///
/// # Errors
///
/// [`NormalizationError::NotLoaded`] when called without a dataset.
pub fn impute_missing_values(dataset: impl Into<Option<Dataset>>) -> Result<ImputationOutcome> {
    let Some(dataset) = dataset.into() else {
        tracing::error!("missing-value handling requested before a dataset was loaded");
        return Err(NormalizationError::NotLoaded);
    };
    Ok(impute_with(dataset, fill_column))
}

fn impute_with<F>(dataset: Dataset, fill: F) -> ImputationOutcome
where
    F: Fn(&Column, ColumnKind) -> PolarsResult<Fill>,
{
    let rows = dataset.height();
    let _span = tracing::info_span!("impute_missing_values", rows).entered();

    let mut frame = dataset.into_frame();
    let mut report = ImputationReport {
        rows,
        ..ImputationReport::default()
    };

    let columns: Vec<Column> = frame.get_columns().to_vec();
    for column in &columns {
        let name = column.name().to_string();
        let kind = ColumnKind::from_dtype(column.dtype());
        let null_count = column.null_count();
        let null_percent = if rows == 0 {
            0.0
        } else {
            null_count as f64 / rows as f64 * 100.0
        };

        let mut entry = ColumnImputation {
            column: name.clone(),
            kind,
            null_count,
            null_percent,
            strategy: FillStrategy::Untouched,
            fill_value: None,
        };

        if null_count == 0 {
            report.columns.push(entry);
            continue;
        }

        tracing::info!(
            column = %name,
            null_count,
            null_percent = %format!("{null_percent:.2}"),
            "missing values"
        );
        if null_percent > CRITICAL_MISSING_PERCENT {
            tracing::warn!(
                column = %name,
                null_percent = %format!("{null_percent:.2}"),
                "more than half of the values are missing"
            );
            report.critical_columns.push(name.clone());
        }

        let applied = fill(column, kind).and_then(|fill| {
            if let Some(filled) = fill.column {
                frame.with_column(filled)?;
            }
            Ok((fill.strategy, fill.value))
        });

        match applied {
            Ok((strategy, value)) => {
                match strategy {
                    FillStrategy::Skipped => tracing::warn!(
                        column = %name,
                        kind = %kind,
                        "no fill value available, column left unchanged"
                    ),
                    _ => tracing::info!(
                        column = %name,
                        strategy = strategy.as_str(),
                        value = value.as_deref().unwrap_or_default(),
                        "filled missing values"
                    ),
                }
                entry.strategy = strategy;
                entry.fill_value = value;
            }
            Err(source) => {
                let err = NormalizationError::Imputation {
                    column: name.clone(),
                    source,
                };
                tracing::error!(column = %name, error = %err, "imputation failed");
                entry.strategy = FillStrategy::Skipped;
                report.failures.push(ColumnFailure {
                    column: name,
                    message: err.to_string(),
                });
            }
        }
        report.columns.push(entry);
    }

    report.remaining_nulls = frame.get_columns().iter().map(Column::null_count).sum();
    tracing::info!(
        remaining_nulls = report.remaining_nulls,
        rows = frame.height(),
        "missing-value handling complete"
    );

    ImputationOutcome {
        dataset: Dataset::new(frame),
        report,
    }
}

struct Fill {
    strategy: FillStrategy,
    value: Option<String>,
    column: Option<Column>,
}

impl Fill {
    fn skipped() -> Self {
        Self {
            strategy: FillStrategy::Skipped,
            value: None,
            column: None,
        }
    }
}

fn fill_column(column: &Column, kind: ColumnKind) -> PolarsResult<Fill> {
    match kind {
        ColumnKind::Integer | ColumnKind::Float => fill_numeric(column, kind),
        ColumnKind::Text => match column.dtype() {
            DataType::String => fill_text(column),
            DataType::Boolean => fill_boolean(column),
            _ => Ok(Fill::skipped()),
        },
        ColumnKind::Unknown if column.dtype() == &DataType::Null => {
            let values = vec![UNKNOWN_SENTINEL; column.len()];
            Ok(Fill {
                strategy: FillStrategy::Sentinel,
                value: Some(UNKNOWN_SENTINEL.to_string()),
                column: Some(Column::new(column.name().clone(), values)),
            })
        }
        ColumnKind::Unknown | ColumnKind::Datetime => Ok(Fill::skipped()),
    }
}

fn fill_numeric(column: &Column, kind: ColumnKind) -> PolarsResult<Fill> {
    let Some(median) = median(column)? else {
        return Ok(Fill::skipped());
    };

    let filled = if kind == ColumnKind::Integer && median.trunc() == median {
        let fill = median as i64;
        let values: Vec<i64> = column
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.unwrap_or(fill))
            .collect();
        Column::new(column.name().clone(), values).cast(column.dtype())?
    } else {
        let values: Vec<f64> = column
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(median))
            .collect();
        let filled = Column::new(column.name().clone(), values);
        if column.dtype() == &DataType::Float32 {
            filled.cast(&DataType::Float32)?
        } else {
            filled
        }
    };

    Ok(Fill {
        strategy: FillStrategy::Median,
        value: Some(format_numeric(median)),
        column: Some(filled),
    })
}

fn fill_text(column: &Column) -> PolarsResult<Fill> {
    let ca = column.str()?;
    let (strategy, fill) = match mode(ca.into_iter()) {
        Some(value) => (FillStrategy::Mode, value),
        None => (FillStrategy::Sentinel, UNKNOWN_SENTINEL),
    };
    let values: Vec<&str> = ca.into_iter().map(|v| v.unwrap_or(fill)).collect();

    Ok(Fill {
        strategy,
        value: Some(fill.to_string()),
        column: Some(Column::new(column.name().clone(), values)),
    })
}

fn fill_boolean(column: &Column) -> PolarsResult<Fill> {
    let ca = column.bool()?;
    let Some(fill) = mode(ca.into_iter()) else {
        return Ok(Fill::skipped());
    };
    let values: Vec<bool> = ca.into_iter().map(|v| v.unwrap_or(fill)).collect();

    Ok(Fill {
        strategy: FillStrategy::Mode,
        value: Some(fill.to_string()),
        column: Some(Column::new(column.name().clone(), values)),
    })
}

/// Most frequent non-null value; ties go to the value encountered first.
fn mode<T>(values: impl IntoIterator<Item = Option<T>>) -> Option<T>
where
    T: Eq + Hash + Copy,
{
    let mut counts: HashMap<T, (usize, usize)> = HashMap::new();
    for (index, value) in values.into_iter().enumerate() {
        if let Some(value) = value {
            counts.entry(value).or_insert((0, index)).0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value)
}
