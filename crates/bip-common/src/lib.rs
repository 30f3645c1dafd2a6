//! Shared utilities for the BI pipeline crates.
//!
//! Conversions between Polars `AnyValue` cells and plain Rust values, used by
//! normalization (statistics, datetime coercion) and persistence (binding
//! cells as statement parameters).

pub mod polars;

pub use polars::{
    any_to_naive_datetime, any_to_string, format_numeric, micros_to_naive_datetime, parse_f64,
    parse_i64,
};
