//! Polars `AnyValue` conversions.
//!
//! Cells coming out of a `DataFrame` are dynamically typed. These helpers
//! turn them into strings and timestamps without panicking on
//! unexpected variants: anything that does not convert yields `None` (or an
//! empty string for [`any_to_string`]).

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

/// Converts a Polars `AnyValue` to a `String` representation.
///
/// Returns an empty string for `Null` and formats floats without trailing
/// zeros.
///
/// # Examples
///
/// ```
/// use polars::prelude::AnyValue;
/// use bip_common::any_to_string;
///
/// assert_eq!(any_to_string(AnyValue::Null), "");
/// assert_eq!(any_to_string(AnyValue::Int32(42)), "42");
/// assert_eq!(any_to_string(AnyValue::Float64(2.50)), "2.5");
/// assert_eq!(any_to_string(AnyValue::String("85123A")), "85123A");
/// ```
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Boolean(b) => b.to_string(),
        other => match any_to_naive_datetime(other.clone()) {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => other.to_string(),
        },
    }
}

/// Formats a floating-point number without trailing zeros.
///
/// # Examples
///
/// ```
/// use bip_common::format_numeric;
///
/// assert_eq!(format_numeric(20.3), "20.3");
/// assert_eq!(format_numeric(17850.0), "17850");
/// assert_eq!(format_numeric(0.0), "0");
/// ```
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Converts a temporal `AnyValue` to a naive (UTC) timestamp.
///
/// Handles `Datetime` in every time unit and `Date` (midnight).
pub fn any_to_naive_datetime(value: AnyValue<'_>) -> Option<NaiveDateTime> {
    match value {
        AnyValue::Datetime(v, unit, _) => micros_to_naive_datetime(to_micros(v, unit)),
        AnyValue::DatetimeOwned(v, unit, _) => micros_to_naive_datetime(to_micros(v, unit)),
        AnyValue::Date(days) => {
            DateTime::from_timestamp(i64::from(days) * 86_400, 0).map(|dt| dt.naive_utc())
        }
        _ => None,
    }
}

fn to_micros(value: i64, unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Nanoseconds => value / 1_000,
        TimeUnit::Microseconds => value,
        TimeUnit::Milliseconds => value.saturating_mul(1_000),
    }
}

/// Converts microseconds since the Unix epoch to a naive timestamp.
pub fn micros_to_naive_datetime(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

/// Parses a string as `f64`, returning `None` for invalid or empty strings.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Parses a string as `i64`, returning `None` for invalid or empty strings.
pub fn parse_i64(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i64>().ok()
}
