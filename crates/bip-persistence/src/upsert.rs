//! Upsert Engine: per-row `INSERT .. ON CONFLICT` writes with checkpoint commits.
//!
//! Statement construction is pure ([`UpsertPlan::statement_for`]); the
//! [`CheckpointedExecutor`] owns the transaction boundaries. A checkpoint is
//! a durability boundary only. After a failure the open window is rolled
//! back and earlier checkpoints stay committed; re-running the whole upsert
//! is the remedy and is safe because every write resolves conflicts.

use std::borrow::Cow;

use bip_model::{ColumnDerivation, ConflictSpec, Dataset};
use polars::prelude::AnyValue;
use tracing::{Instrument as _, debug, error, info, warn};

use crate::error::{PersistenceError, Result};
use crate::schema::{TableSchema, fetch_table_schema, qualified_table, quote_identifier};
use crate::session::Session;
use crate::value::{RowReader, SqlValue};

/// Rows between intermediate commits.
pub const DEFAULT_COMMIT_INTERVAL: usize = 1000;

/// One statement ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteStatement<'a> {
    pub sql: &'a str,
    pub params: Vec<SqlValue>,
}

/// The insert-or-update statement for one table and conflict key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertPlan {
    table: String,
    columns: Vec<String>,
    update_columns: Vec<String>,
    sql: String,
}

impl UpsertPlan {
    /// Builds the plan from the live table schema.
    ///
    /// Inserted columns are the dataset columns the table has, in table
    /// order, minus identity and generated columns. On conflict every
    /// inserted column outside the key is overwritten with the incoming
    /// value; with nothing left to update the row is kept as is.
    pub fn new(
        schema: &TableSchema,
        conflict: &ConflictSpec,
        dataset_columns: &[String],
    ) -> Result<Self> {
        for key in conflict.columns() {
            match schema.column(key) {
                None => {
                    return Err(PersistenceError::schema(
                        &schema.table,
                        format!("conflict column '{key}' is not a table column"),
                    ));
                }
                Some(column) if column.is_generated => {
                    return Err(PersistenceError::schema(
                        &schema.table,
                        format!("conflict column '{key}' is generated and cannot be written"),
                    ));
                }
                Some(_) => {}
            }
            if !dataset_columns.iter().any(|c| c == key) {
                return Err(bip_model::ModelError::ColumnNotFound { name: key.clone() }.into());
            }
        }

        let columns: Vec<String> = schema
            .columns
            .iter()
            .filter(|c| !c.is_generated && dataset_columns.contains(&c.name))
            .map(|c| c.name.clone())
            .collect();
        let update_columns: Vec<String> = columns
            .iter()
            .filter(|c| !conflict.contains(c))
            .cloned()
            .collect();

        let column_list = columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|n| format!("${n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let key_list = conflict
            .columns()
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let action = if update_columns.is_empty() {
            "DO NOTHING".to_string()
        } else {
            let assignments = update_columns
                .iter()
                .map(|c| {
                    let quoted = quote_identifier(c);
                    format!("{quoted} = EXCLUDED.{quoted}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("DO UPDATE SET {assignments}")
        };

        let sql = format!(
            "INSERT INTO {} ({column_list}) VALUES ({placeholders}) ON CONFLICT ({key_list}) {action}",
            qualified_table(&schema.table)?
        );

        Ok(Self {
            table: schema.table.clone(),
            columns,
            update_columns,
            sql,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Inserted columns, in parameter order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn update_columns(&self) -> &[String] {
        &self.update_columns
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The write statement for one record, values in [`columns`](Self::columns) order.
    pub fn statement_for(&self, row: Vec<SqlValue>) -> WriteStatement<'_> {
        WriteStatement {
            sql: &self.sql,
            params: row,
        }
    }
}

/// Progress of a checkpointed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct UpsertSummary {
    pub rows_applied: u64,
    /// Intermediate commits.
    pub checkpoints: u64,
    /// All commits, the final one included.
    pub commits: u64,
}

/// A checkpointed run that stopped early.
#[derive(Debug)]
pub struct ExecutionFailure {
    /// Rows durable at the last successful commit.
    pub rows_committed: u64,
    pub error: PersistenceError,
}

/// Runs statements sequentially in one transaction, committing every
/// `commit_interval` statements and once more at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointedExecutor {
    /// Zero disables intermediate commits.
    pub commit_interval: usize,
}

impl Default for CheckpointedExecutor {
    fn default() -> Self {
        Self {
            commit_interval: DEFAULT_COMMIT_INTERVAL,
        }
    }
}

impl CheckpointedExecutor {
    pub fn new(commit_interval: usize) -> Self {
        Self { commit_interval }
    }

    pub async fn run<'s, I>(
        &self,
        session: &dyn Session,
        statements: I,
    ) -> std::result::Result<UpsertSummary, ExecutionFailure>
    where
        I: IntoIterator<Item = Result<WriteStatement<'s>>>,
    {
        let mut summary = UpsertSummary::default();
        let mut committed = 0u64;

        let outcome = async {
            session.begin().await?;
            for statement in statements {
                let statement = statement?;
                session.execute(statement.sql, &statement.params).await?;
                summary.rows_applied += 1;

                if self.commit_interval > 0
                    && summary.rows_applied % self.commit_interval as u64 == 0
                {
                    session.commit().await?;
                    committed = summary.rows_applied;
                    summary.checkpoints += 1;
                    summary.commits += 1;
                    info!(rows = committed, "checkpoint committed");
                    session.begin().await?;
                }
            }
            session.commit().await?;
            committed = summary.rows_applied;
            summary.commits += 1;
            Ok::<_, PersistenceError>(())
        }
        .await;

        match outcome {
            Ok(()) => Ok(summary),
            Err(error) => {
                if let Err(rollback_err) = session.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed write also failed");
                }
                Err(ExecutionFailure {
                    rows_committed: committed,
                    error,
                })
            }
        }
    }
}

/// Upsert tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOptions {
    pub commit_interval: usize,
    /// Applied when the table has the target column and the dataset lacks it.
    pub derivations: Vec<ColumnDerivation>,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            derivations: ColumnDerivation::defaults(),
        }
    }
}

impl UpsertOptions {
    pub fn with_commit_interval(mut self, interval: usize) -> Self {
        self.commit_interval = interval;
        self
    }

    pub fn with_derivations(mut self, derivations: Vec<ColumnDerivation>) -> Self {
        self.derivations = derivations;
        self
    }
}

/// Writes every record of `dataset` into `conflict.table()`, inserting new
/// keys and updating existing ones.
///
/// The table must already exist with a unique constraint on exactly the
/// conflict columns. Failures are logged and returned as
/// [`PersistenceError::Upsert`] carrying the committed row count.
pub async fn upsert(
    session: &dyn Session,
    dataset: &Dataset,
    conflict: &ConflictSpec,
    options: &UpsertOptions,
) -> Result<UpsertSummary> {
    let table = conflict.table();
    let result = run_upsert(session, dataset, conflict, options)
        .instrument(tracing::info_span!("upsert", table, rows = dataset.height()))
        .await;
    match result {
        Ok(summary) => {
            info!(
                table,
                rows_applied = summary.rows_applied,
                commits = summary.commits,
                "upsert complete"
            );
            Ok(summary)
        }
        Err(failure) => {
            error!(
                table,
                rows_committed = failure.rows_committed,
                error = %failure.error,
                "upsert failed"
            );
            Err(PersistenceError::Upsert {
                table: table.to_string(),
                rows_committed: failure.rows_committed,
                source: Box::new(failure.error),
            })
        }
    }
}

async fn run_upsert(
    session: &dyn Session,
    dataset: &Dataset,
    conflict: &ConflictSpec,
    options: &UpsertOptions,
) -> std::result::Result<UpsertSummary, ExecutionFailure> {
    let not_started = |error: PersistenceError| ExecutionFailure {
        rows_committed: 0,
        error,
    };

    conflict
        .validate_against(dataset)
        .map_err(|e| not_started(e.into()))?;
    let schema = fetch_table_schema(session, conflict.table())
        .await
        .map_err(not_started)?;

    let dataset = apply_derivations(dataset, &schema, &options.derivations).map_err(not_started)?;
    check_conflict_keys(&dataset, conflict).map_err(not_started)?;

    let plan =
        UpsertPlan::new(&schema, conflict, &dataset.column_names()).map_err(not_started)?;
    let ignored: Vec<String> = dataset
        .column_names()
        .into_iter()
        .filter(|c| !plan.columns().contains(c))
        .collect();
    if !ignored.is_empty() {
        warn!(table = plan.table(), columns = ?ignored, "dataset columns not written");
    }
    debug!(sql = plan.sql(), "upsert statement");

    let reader = RowReader::new(dataset.frame(), plan.columns()).map_err(not_started)?;
    let statements = (0..dataset.height()).map(|i| reader.row(i).map(|row| plan.statement_for(row)));

    CheckpointedExecutor::new(options.commit_interval)
        .run(session, statements)
        .await
}

fn apply_derivations<'d>(
    dataset: &'d Dataset,
    schema: &TableSchema,
    derivations: &[ColumnDerivation],
) -> Result<Cow<'d, Dataset>> {
    let mut dataset = Cow::Borrowed(dataset);
    for derivation in derivations {
        let target = derivation.target();
        if schema.has_column(target) && !dataset.has_column(target) {
            derivation.apply(dataset.to_mut())?;
            debug!(column = target, "derived column added");
        }
    }
    Ok(dataset)
}

/// Rejects null key values before anything is written.
fn check_conflict_keys(dataset: &Dataset, conflict: &ConflictSpec) -> Result<()> {
    for key in conflict.columns() {
        let column = dataset.column(key)?;
        if column.null_count() == 0 {
            continue;
        }
        for row in 0..column.len() {
            let value = column
                .get(row)
                .map_err(|e| PersistenceError::type_conversion(key.as_str(), e.to_string()))?;
            if matches!(value, AnyValue::Null) {
                return Err(PersistenceError::NullConflictKey {
                    column: key.clone(),
                    row,
                });
            }
        }
    }
    Ok(())
}
