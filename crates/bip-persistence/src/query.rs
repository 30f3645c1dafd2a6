//! Query Executor: read-only statements materialized as a [`Dataset`].

use bip_model::Dataset;
use polars::prelude::DataFrame;
use tracing::{error, info, warn};

use crate::error::{PersistenceError, Result};
use crate::schema::qualified_table;
use crate::session::{QueryResult, Session};
use crate::value::{SqlValue, column_from_values};

/// Runs `sql` in a read-only transaction and returns the rows as a dataset.
///
/// Failures, malformed SQL and lost connections alike, are logged and
/// returned as [`PersistenceError::Query`].
pub async fn execute_query(session: &dyn Session, sql: &str) -> Result<Dataset> {
    match read_only(session, sql).await.and_then(|r| materialize(&r)) {
        Ok(dataset) => {
            info!(rows = dataset.height(), columns = dataset.width(), "query executed");
            Ok(dataset)
        }
        Err(err) => {
            error!(error = %err, "query failed");
            Err(PersistenceError::Query {
                source: Box::new(err),
            })
        }
    }
}

/// Row count of `table`, used to verify a write.
pub async fn count_rows(session: &dyn Session, table: &str) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", qualified_table(table)?);
    let result = read_only(session, &sql).await?;
    match result.scalar() {
        Some(SqlValue::Int(n)) => u64::try_from(*n)
            .map_err(|_| PersistenceError::type_conversion("count", format!("negative count {n}"))),
        other => Err(PersistenceError::type_conversion(
            "count",
            format!("unexpected count value {other:?}"),
        )),
    }
}

async fn read_only(session: &dyn Session, sql: &str) -> Result<QueryResult> {
    session.batch_execute("BEGIN READ ONLY").await?;
    match session.query(sql, &[]).await {
        Ok(result) => {
            session.commit().await?;
            Ok(result)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                warn!(error = %rollback_err, "rollback after failed query also failed");
            }
            Err(err)
        }
    }
}

static NULL: SqlValue = SqlValue::Null;

/// Builds one typed column per result column.
pub fn materialize(result: &QueryResult) -> Result<Dataset> {
    let columns = result
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let values = result.rows.iter().map(|row| row.get(idx).unwrap_or(&NULL));
            column_from_values(&column.name, &column.sql_type, values)
        })
        .collect::<Result<Vec<_>>>()?;

    let frame = DataFrame::new(columns).map_err(|e| PersistenceError::Statement {
        message: format!("result cannot be materialized: {e}"),
        sql: None,
        source: None,
    })?;
    Ok(Dataset::new(frame))
}
