//! Pipeline stages run by the `bip` binary.
//!
//! 1. **Load**: read the CSV into a dataset (a bad file means no data)
//! 2. **Normalize**: impute missing values, then correct and narrow types
//! 3. **Persist**: upsert on a conflict key, or bulk write with a mode
//! 4. **Verify**: read back the table's row count
//!
//! Each stage takes the output of the previous one.

use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::{Expr, IntoLazy, UniqueKeepStrategy, col};
use serde::Serialize;
use tracing::{info, info_span, warn};

use bip_ingest::{Dataset, load_dataset};
use bip_model::ConflictSpec;
use bip_normalization::{
    ImputationReport, TypeCorrectionReport, correct_datatypes, impute_missing_values,
};
use bip_persistence::{
    PersistenceError, Session, UpsertOptions, UpsertSummary, WriteOptions, WriteSummary,
    count_rows, save_dataset, upsert,
};

// ============================================================================
// Stage 1-2: Load and normalize
// ============================================================================

/// A cleaned dataset with the reports of both normalization stages.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub dataset: Dataset,
    pub imputation: ImputationReport,
    pub types: TypeCorrectionReport,
}

/// Reports only, for `--json` output.
#[derive(Debug, Serialize)]
pub struct NormalizationReports<'a> {
    pub imputation: &'a ImputationReport,
    pub types: &'a TypeCorrectionReport,
}

impl Normalized {
    pub fn reports(&self) -> NormalizationReports<'_> {
        NormalizationReports {
            imputation: &self.imputation,
            types: &self.types,
        }
    }
}

/// Imputes missing values, then corrects column types.
pub fn normalize(dataset: Dataset) -> Result<Normalized> {
    let imputed = impute_missing_values(dataset).context("handle missing values")?;
    let corrected = correct_datatypes(imputed.dataset).context("correct data types")?;
    Ok(Normalized {
        dataset: corrected.dataset,
        imputation: imputed.report,
        types: corrected.report,
    })
}

/// Loads and normalizes a file. `Ok(None)` when the file could not be loaded.
pub fn load_and_normalize(path: &Path) -> Result<Option<Normalized>> {
    let _span = info_span!("clean", path = %path.display()).entered();
    let Some(dataset) = load_dataset(path) else {
        warn!("no data loaded, skipping normalization");
        return Ok(None);
    };
    let normalized = normalize(dataset)?;
    info!(
        rows = normalized.dataset.height(),
        remaining_nulls = normalized.imputation.remaining_nulls,
        memory_saved = normalized.types.memory_saved(),
        "dataset cleaned"
    );
    Ok(Some(normalized))
}

// ============================================================================
// Stage 3-4: Persist and verify
// ============================================================================

/// Where and how a cleaned dataset is written.
#[derive(Debug, Clone)]
pub enum WriteTarget {
    /// Idempotent insert-or-update on a uniqueness key.
    Upsert {
        conflict: ConflictSpec,
        options: UpsertOptions,
    },
    /// Whole-table write honoring a [`WriteMode`](bip_persistence::WriteMode).
    Bulk { table: String, options: WriteOptions },
}

impl WriteTarget {
    pub fn upsert(table: &str, key: &[String], commit_interval: usize) -> Result<Self> {
        let conflict = ConflictSpec::new(table, key.iter().map(String::as_str))
            .with_context(|| format!("invalid conflict key for table {table}"))?;
        Ok(Self::Upsert {
            conflict,
            options: UpsertOptions::default().with_commit_interval(commit_interval),
        })
    }

    pub fn table(&self) -> &str {
        match self {
            Self::Upsert { conflict, .. } => conflict.table(),
            Self::Bulk { table, .. } => table,
        }
    }

    /// Rows the table must hold after writing `dataset`. Records sharing a
    /// conflict key collapse into one row on upsert.
    pub fn expected_rows(&self, dataset: &Dataset) -> Result<usize> {
        match self {
            Self::Upsert { conflict, .. } => {
                let keys: Vec<Expr> = conflict.columns().iter().map(|c| col(c.as_str())).collect();
                let distinct = dataset
                    .frame()
                    .clone()
                    .lazy()
                    .select(keys)
                    .unique(None, UniqueKeepStrategy::Any)
                    .collect()
                    .context("count distinct conflict keys")?;
                Ok(distinct.height())
            }
            Self::Bulk { .. } => Ok(dataset.height()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistOutcome {
    Upserted {
        table: String,
        #[serde(flatten)]
        summary: UpsertSummary,
    },
    Written(WriteSummary),
}

impl PersistOutcome {
    pub fn table(&self) -> &str {
        match self {
            Self::Upserted { table, .. } => table,
            Self::Written(summary) => &summary.table,
        }
    }

    pub fn rows(&self) -> u64 {
        match self {
            Self::Upserted { summary, .. } => summary.rows_applied,
            Self::Written(summary) => summary.rows_written,
        }
    }
}

pub async fn persist(
    session: &dyn Session,
    dataset: &Dataset,
    target: &WriteTarget,
) -> Result<PersistOutcome, PersistenceError> {
    match target {
        WriteTarget::Upsert { conflict, options } => {
            let summary = upsert(session, dataset, conflict, options).await?;
            Ok(PersistOutcome::Upserted {
                table: conflict.table().to_string(),
                summary,
            })
        }
        WriteTarget::Bulk { table, options } => save_dataset(session, dataset, table, options)
            .await
            .map(PersistOutcome::Written),
    }
}

/// Row count read back from the target table after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub table_rows: u64,
    /// From [`WriteTarget::expected_rows`].
    pub expected_rows: u64,
}

impl Verification {
    /// The table may hold rows from earlier runs; fewer than expected means rows are missing.
    pub fn is_complete(&self) -> bool {
        self.table_rows >= self.expected_rows
    }
}

pub async fn verify(
    session: &dyn Session,
    table: &str,
    expected_rows: usize,
) -> Result<Verification, PersistenceError> {
    let table_rows = count_rows(session, table).await?;
    let verification = Verification {
        table_rows,
        expected_rows: expected_rows as u64,
    };
    if verification.is_complete() {
        info!(table, table_rows, "row count verified");
    } else {
        warn!(
            table,
            table_rows,
            expected_rows,
            "table holds fewer rows than were written"
        );
    }
    Ok(verification)
}
