//! Column value kinds.

use std::fmt;

use polars::prelude::DataType;
use serde::{Deserialize, Serialize};

/// Declared value kind of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Datetime,
    /// Null-only or otherwise untyped column.
    Unknown,
}

impl ColumnKind {
    /// Classifies a Polars dtype.
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Self::Integer,
            DataType::Float32 | DataType::Float64 => Self::Float,
            DataType::String | DataType::Boolean => Self::Text,
            DataType::Date | DataType::Datetime(_, _) => Self::Datetime,
            _ => Self::Unknown,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Datetime => "datetime",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::TimeUnit;

    #[test]
    fn test_from_dtype() {
        assert_eq!(ColumnKind::from_dtype(&DataType::UInt8), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_dtype(&DataType::Float64), ColumnKind::Float);
        assert_eq!(ColumnKind::from_dtype(&DataType::String), ColumnKind::Text);
        assert_eq!(
            ColumnKind::from_dtype(&DataType::Datetime(TimeUnit::Microseconds, None)),
            ColumnKind::Datetime
        );
        assert_eq!(ColumnKind::from_dtype(&DataType::Null), ColumnKind::Unknown);
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&ColumnKind::Datetime).unwrap();
        assert_eq!(json, "\"datetime\"");
    }
}
