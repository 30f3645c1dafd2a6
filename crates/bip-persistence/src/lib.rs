//! PostgreSQL persistence for cleaned datasets.
//!
//! # Features
//!
//! - **Connection Manager** that validates every session with `SELECT 1` and
//!   retries transient failures with capped exponential backoff
//! - **Upsert Engine** writing one `INSERT .. ON CONFLICT` per record, with a
//!   commit checkpoint every 1000 records
//! - **Bulk Writer** for full refreshes (`fail`, `replace`, `append`)
//! - **Query Executor** returning results as a [`Dataset`](bip_model::Dataset)
//!
//! # Example
//!
//! ```ignore
//! use bip_model::ConflictSpec;
//! use bip_persistence::{ConnectionManager, DatabaseConfig, UpsertOptions, upsert};
//!
//! let mut handle = ConnectionManager::postgres(DatabaseConfig::default()).connect().await?;
//! let conflict = ConflictSpec::new("retail_sales", ["InvoiceNo", "StockCode"])?;
//! let summary = upsert(handle.session()?, &dataset, &conflict, &UpsertOptions::default()).await?;
//! handle.close().await?;
//! ```
//!
//! # Architecture
//!
//! - `session.rs` - `Session`/`Connector` seams every operation runs against
//! - `postgres.rs` - `tokio-postgres` implementation of the seams
//! - `connection.rs` - connect with retry, idempotent close
//! - `retry.rs` - backoff policy and retry combinator
//! - `upsert.rs`, `bulk.rs`, `query.rs` - write and read paths
//! - `schema.rs` - live table metadata and identifier quoting

mod bulk;
mod config;
mod connection;
mod error;
mod postgres;
mod query;
mod retry;
mod schema;
mod session;
mod upsert;
mod value;

pub use bulk::{
    DEFAULT_BATCH_SIZE, WriteMode, WriteOptions, WriteSummary, create_table_sql, insert_sql,
    replace_write, save_dataset,
};
pub use config::DatabaseConfig;
pub use connection::{ConnectionHandle, ConnectionManager, connect};
pub use error::{ErrorCategory, PersistenceError, Result};
pub use postgres::{PgConnector, PgSession};
pub use query::{count_rows, execute_query, materialize};
pub use retry::{RetryPolicy, retry};
pub use schema::{
    TableColumn, TableSchema, fetch_table_schema, qualified_table, quote_identifier, table_exists,
    validate_table_name,
};
pub use session::{Connector, QueryResult, ResultColumn, Session};
pub use upsert::{
    CheckpointedExecutor, DEFAULT_COMMIT_INTERVAL, ExecutionFailure, UpsertOptions, UpsertPlan,
    UpsertSummary, WriteStatement, upsert,
};
pub use value::{SqlType, SqlValue};
