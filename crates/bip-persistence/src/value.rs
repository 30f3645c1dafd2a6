//! Backend-neutral SQL values and types.

use std::fmt;

use bip_common::{any_to_naive_datetime, format_numeric};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::error::{PersistenceError, Result};

/// Column types used when creating tables and materializing query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    DoublePrecision,
    Text,
    Timestamp,
    Date,
    Numeric,
    Other(String),
}

impl SqlType {
    /// Column type for a Polars dtype.
    pub fn for_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Boolean => Self::Boolean,
            DataType::Int8 | DataType::Int16 | DataType::UInt8 => Self::SmallInt,
            DataType::Int32 | DataType::UInt16 => Self::Integer,
            DataType::Int64 | DataType::UInt32 | DataType::UInt64 => Self::BigInt,
            DataType::Float32 => Self::Real,
            DataType::Float64 => Self::DoublePrecision,
            DataType::Datetime(_, _) => Self::Timestamp,
            DataType::Date => Self::Date,
            _ => Self::Text,
        }
    }

    pub fn as_sql(&self) -> &str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Real => "REAL",
            Self::DoublePrecision => "DOUBLE PRECISION",
            Self::Text => "TEXT",
            Self::Timestamp => "TIMESTAMP",
            Self::Date => "DATE",
            Self::Numeric => "NUMERIC",
            Self::Other(name) => name,
        }
    }

    /// Polars dtype used when reading values of this type back.
    pub fn dtype(&self) -> DataType {
        match self {
            Self::Boolean => DataType::Boolean,
            Self::SmallInt => DataType::Int16,
            Self::Integer => DataType::Int32,
            Self::BigInt => DataType::Int64,
            Self::Real => DataType::Float32,
            Self::DoublePrecision | Self::Numeric => DataType::Float64,
            Self::Timestamp => DataType::Datetime(TimeUnit::Microseconds, None),
            Self::Date => DataType::Date,
            Self::Text | Self::Other(_) => DataType::String,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A single statement parameter or result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
}

impl SqlValue {
    /// Converts a dataset cell. `column` is only used in the error message.
    pub fn from_any(column: &str, value: AnyValue<'_>) -> Result<Self> {
        let converted = match value {
            AnyValue::Null => Self::Null,
            AnyValue::Boolean(b) => Self::Bool(b),
            AnyValue::Int8(v) => Self::Int(i64::from(v)),
            AnyValue::Int16(v) => Self::Int(i64::from(v)),
            AnyValue::Int32(v) => Self::Int(i64::from(v)),
            AnyValue::Int64(v) => Self::Int(v),
            AnyValue::UInt8(v) => Self::Int(i64::from(v)),
            AnyValue::UInt16(v) => Self::Int(i64::from(v)),
            AnyValue::UInt32(v) => Self::Int(i64::from(v)),
            AnyValue::UInt64(v) => Self::Int(i64::try_from(v).map_err(|_| {
                PersistenceError::type_conversion(column, format!("{v} exceeds BIGINT"))
            })?),
            AnyValue::Float32(v) => Self::Float(f64::from(v)),
            AnyValue::Float64(v) => Self::Float(v),
            AnyValue::String(s) => Self::Text(s.to_string()),
            AnyValue::StringOwned(s) => Self::Text(s.to_string()),
            AnyValue::Date(days) => {
                let date = NaiveDate::from_num_days_from_ce_opt(days + EPOCH_DAYS_FROM_CE)
                    .ok_or_else(|| {
                        PersistenceError::type_conversion(column, format!("date {days} out of range"))
                    })?;
                Self::Date(date)
            }
            other => match any_to_naive_datetime(other.clone()) {
                Some(ts) => Self::Timestamp(ts),
                None => {
                    return Err(PersistenceError::type_conversion(
                        column,
                        format!("unsupported value type {}", other.dtype()),
                    ));
                }
            },
        };
        Ok(converted)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

// Days from 0001-01-01 to 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => f.write_str(&format_numeric(*v)),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Reads dataset rows as parameter lists, in the order of `columns`.
pub(crate) struct RowReader<'a> {
    columns: Vec<&'a Column>,
}

impl<'a> RowReader<'a> {
    pub(crate) fn new(frame: &'a DataFrame, names: &[String]) -> Result<Self> {
        let columns = names
            .iter()
            .map(|name| {
                frame.column(name).map_err(|_| {
                    PersistenceError::type_conversion(name.as_str(), "column missing from dataset")
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub(crate) fn row(&self, index: usize) -> Result<Vec<SqlValue>> {
        self.columns
            .iter()
            .map(|column| {
                let cell = column.get(index).map_err(|e| {
                    PersistenceError::type_conversion(column.name().as_str(), e.to_string())
                })?;
                SqlValue::from_any(column.name(), cell)
            })
            .collect()
    }
}

/// Builds a Polars column from result cells of one SQL type.
pub(crate) fn column_from_values<'v>(
    name: &str,
    sql_type: &SqlType,
    values: impl Iterator<Item = &'v SqlValue>,
) -> Result<Column> {
    let mismatch = |value: &SqlValue| {
        PersistenceError::type_conversion(name, format!("unexpected value {value:?} for {sql_type}"))
    };

    let column = match sql_type {
        SqlType::Boolean => {
            let cells = values
                .map(|v| match v {
                    SqlValue::Null => Ok(None),
                    SqlValue::Bool(b) => Ok(Some(*b)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Column::new(name.into(), cells)
        }
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => {
            let cells = values
                .map(|v| match v {
                    SqlValue::Null => Ok(None),
                    SqlValue::Int(i) => Ok(Some(*i)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Column::new(name.into(), cells)
        }
        SqlType::Real | SqlType::DoublePrecision | SqlType::Numeric => {
            let cells = values
                .map(|v| match v {
                    SqlValue::Null => Ok(None),
                    SqlValue::Float(f) => Ok(Some(*f)),
                    SqlValue::Int(i) => Ok(Some(*i as f64)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Column::new(name.into(), cells)
        }
        SqlType::Timestamp => {
            let cells = values
                .map(|v| match v {
                    SqlValue::Null => Ok(None),
                    SqlValue::Timestamp(ts) => Ok(Some(ts.and_utc().timestamp_micros())),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Column::new(name.into(), cells)
        }
        SqlType::Date => {
            let cells = values
                .map(|v| match v {
                    SqlValue::Null => Ok(None),
                    SqlValue::Date(d) => Ok(Some(d.num_days_from_ce() - EPOCH_DAYS_FROM_CE)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Column::new(name.into(), cells)
        }
        SqlType::Text | SqlType::Other(_) => {
            let cells: Vec<Option<String>> = values
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect();
            Column::new(name.into(), cells)
        }
    };

    column
        .cast(&sql_type.dtype())
        .map_err(|e| PersistenceError::type_conversion(name, e.to_string()))
}
