//! Integer width selection for numeric narrowing.

use std::fmt;

use polars::prelude::DataType;
use serde::{Deserialize, Serialize};

/// Fixed-width integer representation chosen for a narrowed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegerWidth {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
}

impl IntegerWidth {
    /// Picks the narrowest width covering `[min, max]`.
    ///
    /// Unsigned widths are used whenever `min >= 0`. Bounds are checked in
    /// order from 8 to 64 bits; the upper bound is exclusive.
    ///
    /// # Examples
    ///
    /// ```
    /// use bip_model::IntegerWidth;
    ///
    /// assert_eq!(IntegerWidth::select(0, 255), IntegerWidth::U8);
    /// assert_eq!(IntegerWidth::select(0, 256), IntegerWidth::U16);
    /// assert_eq!(IntegerWidth::select(-1, 127), IntegerWidth::I8);
    /// assert_eq!(IntegerWidth::select(-129, 0), IntegerWidth::I16);
    /// ```
    pub fn select(min: i128, max: i128) -> Self {
        if min >= 0 {
            if max < 1 << 8 {
                Self::U8
            } else if max < 1 << 16 {
                Self::U16
            } else if max < 1 << 32 {
                Self::U32
            } else {
                Self::U64
            }
        } else if min >= -(1 << 7) && max < 1 << 7 {
            Self::I8
        } else if min >= -(1 << 15) && max < 1 << 15 {
            Self::I16
        } else if min >= -(1 << 31) && max < 1 << 31 {
            Self::I32
        } else {
            Self::I64
        }
    }

    pub fn dtype(self) -> DataType {
        match self {
            Self::U8 => DataType::UInt8,
            Self::U16 => DataType::UInt16,
            Self::U32 => DataType::UInt32,
            Self::U64 => DataType::UInt64,
            Self::I8 => DataType::Int8,
            Self::I16 => DataType::Int16,
            Self::I32 => DataType::Int32,
            Self::I64 => DataType::Int64,
        }
    }

    /// Storage cost of one value in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 => 4,
            Self::U64 | Self::I64 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
        }
    }
}

impl fmt::Display for IntegerWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
