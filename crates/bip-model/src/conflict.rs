//! Conflict-key specification for upserts.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{ModelError, Result};

/// Target table plus the ordered column set forming its uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSpec {
    table: String,
    columns: Vec<String>,
}

impl ConflictSpec {
    /// Builds a spec, rejecting an empty table, an empty key or duplicate key columns.
    ///
    /// # Examples
    ///
    /// ```
    /// use bip_model::ConflictSpec;
    ///
    /// let spec = ConflictSpec::new("retail_sales", ["InvoiceNo", "StockCode"]).unwrap();
    /// assert_eq!(spec.columns(), ["InvoiceNo", "StockCode"]);
    /// assert!(ConflictSpec::new("retail_sales", Vec::<String>::new()).is_err());
    /// ```
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = table.into();
        if table.trim().is_empty() {
            return Err(ModelError::EmptyTableName);
        }
        let mut seen: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            if seen.contains(&column) {
                return Err(ModelError::DuplicateConflictColumn { column });
            }
            seen.push(column);
        }
        if seen.is_empty() {
            return Err(ModelError::EmptyConflictColumns { table });
        }
        Ok(Self {
            table,
            columns: seen,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Verifies every key column exists in `dataset`.
    pub fn validate_against(&self, dataset: &Dataset) -> Result<()> {
        for column in &self.columns {
            if !dataset.has_column(column) {
                return Err(ModelError::ColumnNotFound {
                    name: column.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn test_rejects_duplicates() {
        let err = ConflictSpec::new("t", ["a", "a"]).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateConflictColumn { column } if column == "a"));
    }

    #[test]
    fn test_rejects_blank_table() {
        assert!(matches!(
            ConflictSpec::new("  ", ["a"]),
            Err(ModelError::EmptyTableName)
        ));
    }

    #[test]
    fn test_validate_against_dataset() {
        let dataset = Dataset::new(
            df! {
                "InvoiceNo" => ["536365"],
                "Quantity" => [6i64],
            }
            .unwrap(),
        );
        let ok = ConflictSpec::new("t", ["InvoiceNo"]).unwrap();
        assert!(ok.validate_against(&dataset).is_ok());

        let missing = ConflictSpec::new("t", ["InvoiceNo", "StockCode"]).unwrap();
        let err = missing.validate_against(&dataset).unwrap_err();
        assert!(matches!(err, ModelError::ColumnNotFound { name } if name == "StockCode"));
    }
}
