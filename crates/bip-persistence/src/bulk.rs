//! Bulk Writer: whole-dataset writes in fixed-size multi-row batches.
//!
//! Weaker than [`upsert`](crate::upsert()): batches commit independently, so
//! readers can observe a partially written table and a rerun in `Append`
//! mode duplicates rows.

use std::fmt;
use std::str::FromStr;

use bip_model::Dataset;
use serde::{Deserialize, Serialize};
use tracing::{Instrument as _, error, info};

use crate::error::{PersistenceError, Result};
use crate::schema::{TableSchema, fetch_table_schema, qualified_table, quote_identifier, table_exists};
use crate::session::Session;
use crate::value::{RowReader, SqlType, SqlValue};

/// Rows per insert statement.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

// PostgreSQL bind parameter limit per statement.
const MAX_PARAMS: usize = 65_535;

/// What to do when the destination table already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Error out.
    Fail,
    /// Drop and recreate it from the dataset's column types.
    #[default]
    Replace,
    /// Insert into it.
    Append,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Replace => "replace",
            Self::Append => "append",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            other => Err(format!(
                "unknown write mode '{other}' (expected fail, replace or append)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub mode: WriteMode,
    pub batch_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            mode: WriteMode::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl WriteOptions {
    pub fn new(mode: WriteMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub table: String,
    pub mode: WriteMode,
    pub rows_written: u64,
    pub batches: u64,
    /// The table was created by this write.
    pub created: bool,
}

/// Drops and recreates `table`, then fills it from `dataset`.
pub async fn replace_write(
    session: &dyn Session,
    dataset: &Dataset,
    table: &str,
) -> Result<WriteSummary> {
    save_dataset(session, dataset, table, &WriteOptions::new(WriteMode::Replace)).await
}

/// Writes `dataset` into `table` according to `options.mode`.
pub async fn save_dataset(
    session: &dyn Session,
    dataset: &Dataset,
    table: &str,
    options: &WriteOptions,
) -> Result<WriteSummary> {
    let result = write(session, dataset, table, options)
        .instrument(tracing::info_span!("bulk_write", table, mode = %options.mode))
        .await;

    match result {
        Ok(summary) => {
            info!(
                table,
                mode = %summary.mode,
                rows = summary.rows_written,
                batches = summary.batches,
                "rows saved"
            );
            Ok(summary)
        }
        Err(err) => {
            error!(table, error = %err, "bulk write failed");
            Err(PersistenceError::Write {
                table: table.to_string(),
                source: Box::new(err),
            })
        }
    }
}

async fn write(
    session: &dyn Session,
    dataset: &Dataset,
    table: &str,
    options: &WriteOptions,
) -> Result<WriteSummary> {
    let target = qualified_table(table)?;
    let columns = dataset.column_names();
    if columns.is_empty() {
        return Err(PersistenceError::schema(table, "dataset has no columns"));
    }

    let exists = table_exists(session, table).await?;
    let mut created = false;

    match (options.mode, exists) {
        (WriteMode::Fail, true) => {
            return Err(PersistenceError::schema(table, "table already exists"));
        }
        (WriteMode::Replace, true) => {
            session
                .batch_execute(&format!("DROP TABLE {target}"))
                .await?;
            session.batch_execute(&create_table_sql(&target, dataset)).await?;
            created = true;
        }
        (WriteMode::Append, true) => {
            let schema = fetch_table_schema(session, table).await?;
            check_columns_exist(&schema, &columns)?;
        }
        (_, false) => {
            session.batch_execute(&create_table_sql(&target, dataset)).await?;
            created = true;
        }
    }

    let rows_per_batch = options.batch_size.max(1).min(MAX_PARAMS / columns.len()).max(1);
    let reader = RowReader::new(dataset.frame(), &columns)?;
    let mut summary = WriteSummary {
        table: table.to_string(),
        mode: options.mode,
        rows_written: 0,
        batches: 0,
        created,
    };

    let height = dataset.height();
    let mut start = 0;
    while start < height {
        let end = (start + rows_per_batch).min(height);
        let mut params: Vec<SqlValue> = Vec::with_capacity((end - start) * columns.len());
        for row in start..end {
            params.extend(reader.row(row)?);
        }
        let sql = insert_sql(&target, &columns, end - start);
        session.execute(&sql, &params).await?;

        summary.rows_written += (end - start) as u64;
        summary.batches += 1;
        tracing::debug!(batch = summary.batches, rows = summary.rows_written, "batch written");
        start = end;
    }

    Ok(summary)
}

/// `CREATE TABLE` with one column per dataset column, typed from its dtype.
pub fn create_table_sql(target: &str, dataset: &Dataset) -> String {
    let definitions = dataset
        .columns()
        .iter()
        .map(|column| {
            format!(
                "{} {}",
                quote_identifier(column.name()),
                SqlType::for_dtype(column.dtype())
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {target} ({definitions})")
}

/// Multi-row `INSERT` for `rows` records.
pub fn insert_sql(target: &str, columns: &[String], rows: usize) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let width = columns.len();
    let tuples = (0..rows)
        .map(|row| {
            let placeholders = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({placeholders})")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {target} ({column_list}) VALUES {tuples}")
}

fn check_columns_exist(schema: &TableSchema, columns: &[String]) -> Result<()> {
    match columns.iter().find(|name| !schema.has_column(name)) {
        Some(name) => Err(PersistenceError::schema(
            &schema.table,
            format!("column '{name}' does not exist in the table"),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_mode_parse() {
        assert_eq!("Replace".parse::<WriteMode>().unwrap(), WriteMode::Replace);
        assert_eq!("append".parse::<WriteMode>().unwrap(), WriteMode::Append);
        assert!("upsert".parse::<WriteMode>().is_err());
    }

    #[test]
    fn test_insert_sql() {
        let columns = vec!["InvoiceNo".to_string(), "UnitPrice".to_string()];
        let sql = insert_sql("\"retail\"", &columns, 2);
        insta::assert_snapshot!(sql, @r#"INSERT INTO "retail" ("InvoiceNo", "UnitPrice") VALUES ($1, $2), ($3, $4)"#);
    }

    #[test]
    fn test_create_table_sql() {
        let dataset: Dataset = polars::df! {
            "InvoiceNo" => ["536365"],
            "Quantity" => [6u8],
            "UnitPrice" => [2.55],
        }
        .unwrap()
        .into();
        let sql = create_table_sql("\"retail\"", &dataset);
        insta::assert_snapshot!(sql, @r#"CREATE TABLE "retail" ("InvoiceNo" TEXT, "Quantity" SMALLINT, "UnitPrice" DOUBLE PRECISION)"#);
    }
}
