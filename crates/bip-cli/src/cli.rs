//! CLI argument definitions for the `bip` pipeline runner.

use std::path::PathBuf;

use bip_persistence::{
    DEFAULT_BATCH_SIZE, DEFAULT_COMMIT_INTERVAL, DatabaseConfig, WriteMode,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "bip",
    version,
    about = "BI pipeline - clean a retail CSV and persist it to PostgreSQL",
    long_about = "Load a delimited file, impute missing values, narrow column types \
                  and write the result to PostgreSQL.\n\n\
                  Settings are read from the command line, the environment and a .env file."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(
        long = "log-level",
        env = "LOG_LEVEL",
        value_enum,
        ignore_case = true,
        global = true
    )]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (text for humans, json for machine parsing).
    #[arg(
        long = "log-format",
        env = "LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value = "text",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load and normalize a file, then print the reports.
    Clean(CleanArgs),

    /// Run the full pipeline: load, normalize, write to a table.
    Load(LoadArgs),

    /// Run a read-only query and print the result.
    Query(QueryArgs),
}

#[derive(Args)]
pub struct CleanArgs {
    /// Input CSV file with a header row.
    #[arg(
        value_name = "PATH",
        env = "DATA_PATH",
        default_value = "data/online_retail.csv"
    )]
    pub path: PathBuf,

    /// Print the reports as JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args)]
pub struct LoadArgs {
    /// Input CSV file with a header row.
    #[arg(
        value_name = "PATH",
        env = "DATA_PATH",
        default_value = "data/online_retail.csv"
    )]
    pub path: PathBuf,

    /// Target table, optionally schema-qualified.
    #[arg(long = "table", value_name = "TABLE")]
    pub table: String,

    /// Upsert on these key columns (comma separated).
    #[arg(
        long = "conflict",
        value_name = "COLUMNS",
        value_delimiter = ',',
        conflicts_with = "mode"
    )]
    pub conflict: Vec<String>,

    /// Bulk write mode when no conflict key is given.
    #[arg(long = "mode", value_enum)]
    pub mode: Option<WriteModeArg>,

    /// Records per upsert checkpoint (0 commits once at the end).
    #[arg(long = "commit-interval", default_value_t = DEFAULT_COMMIT_INTERVAL)]
    pub commit_interval: usize,

    /// Rows per multi-row insert in bulk mode.
    #[arg(long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Skip the row count read-back after writing.
    #[arg(long = "no-verify")]
    pub no_verify: bool,

    #[command(flatten)]
    pub database: DbArgs,
}

#[derive(Args)]
pub struct QueryArgs {
    /// SQL to run inside a read-only transaction.
    #[arg(value_name = "SQL")]
    pub sql: String,

    /// Maximum rows to print.
    #[arg(long = "limit", default_value_t = 20)]
    pub limit: usize,

    #[command(flatten)]
    pub database: DbArgs,
}

#[derive(Args)]
pub struct DbArgs {
    #[arg(long = "db-host", env = "DATABASE_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(long = "db-port", env = "DATABASE_PORT", default_value_t = 5432)]
    pub port: u16,

    #[arg(long = "db-name", env = "DATABASE_NAME", default_value = "bi_pipeline")]
    pub name: String,

    #[arg(long = "db-user", env = "DATABASE_USER", default_value = "admin")]
    pub user: String,

    #[arg(
        long = "db-password",
        env = "DATABASE_PASSWORD",
        default_value = "secret",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,
}

impl DbArgs {
    pub fn to_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(
            &self.host,
            self.port,
            &self.name,
            &self.user,
            &self.password,
        )
    }
}

/// CLI write mode choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum WriteModeArg {
    Fail,
    Replace,
    Append,
}

impl From<WriteModeArg> for WriteMode {
    fn from(value: WriteModeArg) -> Self {
        match value {
            WriteModeArg::Fail => WriteMode::Fail,
            WriteModeArg::Replace => WriteMode::Replace,
            WriteModeArg::Append => WriteMode::Append,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Single-line text (same as compact).
    Text,
    Pretty,
    Compact,
    Json,
}
