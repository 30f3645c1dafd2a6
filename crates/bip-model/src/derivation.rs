//! Derived columns filled in before a write.

use polars::prelude::{Column, DataType};
use serde::{Deserialize, Serialize};

use crate::column::ColumnKind;
use crate::dataset::Dataset;
use crate::error::{ModelError, Result};

/// A column computed from other columns when the dataset lacks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnDerivation {
    /// `target = left * right`, null when either operand is null.
    Product {
        target: String,
        left: String,
        right: String,
    },
}

impl ColumnDerivation {
    /// `TotalPrice = Quantity * UnitPrice`.
    pub fn line_total() -> Self {
        Self::Product {
            target: "TotalPrice".to_string(),
            left: "Quantity".to_string(),
            right: "UnitPrice".to_string(),
        }
    }

    /// Default derivations for retail line items.
    pub fn defaults() -> Vec<Self> {
        vec![Self::line_total()]
    }

    pub fn target(&self) -> &str {
        match self {
            Self::Product { target, .. } => target,
        }
    }

    /// Adds the derived column to `dataset` unless it is already present.
    ///
    /// Returns `true` when a column was added.
    pub fn apply(&self, dataset: &mut Dataset) -> Result<bool> {
        if dataset.has_column(self.target()) {
            return Ok(false);
        }
        match self {
            Self::Product {
                target,
                left,
                right,
            } => {
                let lhs = numeric_as_f64(dataset, left)?;
                let rhs = numeric_as_f64(dataset, right)?;
                let values: Vec<Option<f64>> = lhs
                    .f64()?
                    .into_iter()
                    .zip(rhs.f64()?)
                    .map(|(a, b)| Some(a? * b?))
                    .collect();
                dataset.set_column(Column::new(target.as_str().into(), values))?;
            }
        }
        Ok(true)
    }
}

fn numeric_as_f64(dataset: &Dataset, name: &str) -> Result<Column> {
    let column = dataset.column(name)?;
    if !ColumnKind::from_dtype(column.dtype()).is_numeric() {
        return Err(ModelError::NotNumeric {
            column: name.to_string(),
            dtype: column.dtype().to_string(),
        });
    }
    Ok(column.cast(&DataType::Float64)?)
}
