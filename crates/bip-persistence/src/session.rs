//! Backend seams: an open database session and the connector that opens one.

use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::value::{SqlType, SqlValue};

/// Name and type of a result column.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    pub name: String,
    pub sql_type: SqlType,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

/// Rows returned by [`Session::query`], column metadata included so empty
/// results still carry a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryResult {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// First cell of the first row.
    pub fn scalar(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// One open connection. Statements run sequentially; implementations do not
/// need to support concurrent callers.
#[async_trait]
pub trait Session: Send + Sync {
    /// Runs a parameterized statement and returns the affected row count.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult>;

    /// Runs one or more statements without parameters.
    async fn batch_execute(&self, sql: &str) -> Result<()>;

    /// Round-trip liveness check.
    async fn ping(&self) -> Result<()> {
        self.batch_execute("SELECT 1").await
    }

    async fn begin(&self) -> Result<()> {
        self.batch_execute("BEGIN").await
    }

    async fn commit(&self) -> Result<()> {
        self.batch_execute("COMMIT").await
    }

    async fn rollback(&self) -> Result<()> {
        self.batch_execute("ROLLBACK").await
    }

    /// Releases the session. Further calls fail.
    async fn close(&self) -> Result<()>;
}

/// Opens sessions for a configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, config: &DatabaseConfig) -> Result<Box<dyn Session>>;
}
