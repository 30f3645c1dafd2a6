//! The in-memory dataset threaded through the pipeline.

use polars::prelude::{Column, DataFrame};

use crate::column::ColumnKind;
use crate::error::{ModelError, Result};

/// An ordered set of named, equal-length columns.
///
/// Owned by the caller for the duration of a run. Each stage takes the
/// dataset by value and hands back the next state.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Number of records.
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.frame
            .column(name)
            .map_err(|_| ModelError::ColumnNotFound {
                name: name.to_string(),
            })
    }

    pub fn columns(&self) -> &[Column] {
        self.frame.get_columns()
    }

    pub fn column_kind(&self, name: &str) -> Result<ColumnKind> {
        Ok(ColumnKind::from_dtype(self.column(name)?.dtype()))
    }

    /// Total null cells across all columns.
    pub fn null_count(&self) -> usize {
        self.frame.get_columns().iter().map(Column::null_count).sum()
    }

    /// Approximate heap footprint in bytes.
    pub fn estimated_size(&self) -> usize {
        self.frame.estimated_size()
    }

    /// Adds `column`, replacing any existing column of the same name.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        self.frame.with_column(column)?;
        Ok(())
    }
}

impl From<DataFrame> for Dataset {
    fn from(frame: DataFrame) -> Self {
        Self::new(frame)
    }
}

impl From<Dataset> for DataFrame {
    fn from(dataset: Dataset) -> Self {
        dataset.frame
    }
}
