//! Subcommand implementations.

use anyhow::{Context, Result, bail};
use tracing::{error, info};

use bip_persistence::{ConnectionHandle, ConnectionManager, WriteMode, WriteOptions, execute_query};

use crate::cli::{CleanArgs, DbArgs, LoadArgs, QueryArgs};
use bip_cli::pipeline::{Normalized, WriteTarget, load_and_normalize, persist, verify};
use crate::summary::{print_dataset, print_imputation, print_load, print_types};

pub fn run_clean(args: &CleanArgs) -> Result<()> {
    let Some(normalized) = load_and_normalize(&args.path)? else {
        bail!("no data loaded from {}", args.path.display());
    };
    if args.json {
        let json = serde_json::to_string_pretty(&normalized.reports())
            .context("serialize normalization reports")?;
        println!("{json}");
    } else {
        print_imputation(&normalized.imputation);
        print_types(&normalized.types);
    }
    Ok(())
}

pub async fn run_load(args: &LoadArgs) -> Result<()> {
    let target = write_target(args)?;
    let Some(normalized) = load_and_normalize(&args.path)? else {
        bail!("no data loaded from {}", args.path.display());
    };
    print_imputation(&normalized.imputation);
    print_types(&normalized.types);

    let mut handle = open(&args.database).await?;
    let result = load_into(&handle, &normalized, &target, !args.no_verify).await;
    close(&mut handle).await;
    result
}

async fn load_into(
    handle: &ConnectionHandle,
    normalized: &Normalized,
    target: &WriteTarget,
    verify_rows: bool,
) -> Result<()> {
    let session = handle.session()?;
    let outcome = persist(session, &normalized.dataset, target)
        .await
        .with_context(|| format!("write to table {}", target.table()))?;
    let verification = if verify_rows {
        let expected = target.expected_rows(&normalized.dataset)?;
        Some(
            verify(session, outcome.table(), expected)
                .await
                .context("verify row count")?,
        )
    } else {
        None
    };
    print_load(&outcome, verification.as_ref());
    info!(table = outcome.table(), rows = outcome.rows(), "pipeline finished");
    Ok(())
}

pub async fn run_query(args: &QueryArgs) -> Result<()> {
    let mut handle = open(&args.database).await?;
    let result = match handle.session() {
        Ok(session) => execute_query(session, &args.sql)
            .await
            .context("run query"),
        Err(err) => Err(err.into()),
    };
    close(&mut handle).await;
    print_dataset(&result?, args.limit);
    Ok(())
}

fn write_target(args: &LoadArgs) -> Result<WriteTarget> {
    if !args.conflict.is_empty() {
        return WriteTarget::upsert(&args.table, &args.conflict, args.commit_interval);
    }
    let mode = args.mode.map_or(WriteMode::default(), WriteMode::from);
    Ok(WriteTarget::Bulk {
        table: args.table.clone(),
        options: WriteOptions::new(mode).with_batch_size(args.batch_size),
    })
}

async fn open(database: &DbArgs) -> Result<ConnectionHandle> {
    let config = database.to_config();
    let redacted = config.redacted_url();
    ConnectionManager::postgres(config)
        .connect()
        .await
        .with_context(|| format!("connect to {redacted}"))
}

async fn close(handle: &mut ConnectionHandle) {
    if let Err(err) = handle.close().await {
        error!(error = %err, "failed to close database connection");
    }
}
