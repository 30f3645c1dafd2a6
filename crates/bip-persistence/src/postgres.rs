//! PostgreSQL backend on `tokio-postgres`.

use std::collections::HashMap;

use async_trait::async_trait;
use bip_common::{parse_f64, parse_i64};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, Row, Statement};
use tracing::{debug, error};

use crate::config::DatabaseConfig;
use crate::error::{PersistenceError, Result};
use crate::session::{Connector, QueryResult, ResultColumn, Session};
use crate::value::{SqlType, SqlValue};

type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Opens [`PgSession`]s without TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    async fn open(&self, config: &DatabaseConfig) -> Result<Box<dyn Session>> {
        let url = config.connection_url()?;
        let mut pg_config: tokio_postgres::Config = url
            .as_str()
            .parse()
            .map_err(|e| PersistenceError::config_with_source("invalid connection string", e))?;
        pg_config.application_name("bip");

        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(classify_connect_error)?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "postgres connection driver stopped");
            }
        });

        debug!(host = %config.host, port = config.port, database = %config.name, "postgres session opened");
        Ok(Box::new(PgSession::new(client)))
    }
}

/// Maps a connect failure to a retryable or fatal error.
fn classify_connect_error(err: tokio_postgres::Error) -> PersistenceError {
    let message = describe(&err);
    match err.code().cloned() {
        Some(code)
            if code == SqlState::INVALID_PASSWORD
                || code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION =>
        {
            PersistenceError::authentication_with_source(message, err)
        }
        Some(code) if is_transient(&code) => PersistenceError::connection_with_source(message, err),
        Some(_) => PersistenceError::config_with_source(message, err),
        // no SQLSTATE: refused, reset, DNS or timeout at the socket level
        None => PersistenceError::connection_with_source(message, err),
    }
}

/// Maps a failure of an already-open session.
fn classify_statement_error(err: tokio_postgres::Error, sql: &str) -> PersistenceError {
    let message = describe(&err);
    let transient = err.is_closed() || err.code().is_some_and(is_transient);
    if transient {
        PersistenceError::connection_with_source(message, err)
    } else {
        PersistenceError::statement_with_source(message, Some(sql), err)
    }
}

fn is_transient(code: &SqlState) -> bool {
    code.code().starts_with("08")
        || *code == SqlState::TOO_MANY_CONNECTIONS
        || *code == SqlState::CANNOT_CONNECT_NOW
        || *code == SqlState::ADMIN_SHUTDOWN
        || *code == SqlState::CRASH_SHUTDOWN
}

fn describe(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{} ({})", db.message(), db.code().code()),
        None => err.to_string(),
    }
}

struct PgInner {
    client: Client,
    statements: HashMap<String, Statement>,
}

impl PgInner {
    async fn prepare(&mut self, sql: &str) -> Result<Statement> {
        if let Some(statement) = self.statements.get(sql) {
            return Ok(statement.clone());
        }
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| classify_statement_error(e, sql))?;
        self.statements.insert(sql.to_string(), statement.clone());
        Ok(statement)
    }
}

/// A single `tokio-postgres` client with a prepared-statement cache.
pub struct PgSession {
    inner: Mutex<Option<PgInner>>,
}

impl PgSession {
    pub fn new(client: Client) -> Self {
        Self {
            inner: Mutex::new(Some(PgInner {
                client,
                statements: HashMap::new(),
            })),
        }
    }
}

#[async_trait]
impl Session for PgSession {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut guard = self.inner.lock().await;
        let inner = guard.as_mut().ok_or(PersistenceError::HandleClosed)?;
        let statement = inner.prepare(sql).await?;
        let boxed = bind_params(&statement, params)?;
        let refs = param_refs(&boxed);
        inner
            .client
            .execute(&statement, &refs)
            .await
            .map_err(|e| classify_statement_error(e, sql))
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let mut guard = self.inner.lock().await;
        let inner = guard.as_mut().ok_or(PersistenceError::HandleClosed)?;
        let statement = inner.prepare(sql).await?;
        let boxed = bind_params(&statement, params)?;
        let refs = param_refs(&boxed);
        let rows = inner
            .client
            .query(&statement, &refs)
            .await
            .map_err(|e| classify_statement_error(e, sql))?;

        let columns = statement
            .columns()
            .iter()
            .map(|c| ResultColumn::new(c.name(), sql_type_of(c.type_())))
            .collect();
        let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
        Ok(QueryResult { columns, rows })
    }

    async fn batch_execute(&self, sql: &str) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let inner = guard.as_mut().ok_or(PersistenceError::HandleClosed)?;
        inner
            .client
            .batch_execute(sql)
            .await
            .map_err(|e| classify_statement_error(e, sql))?;
        // parameter types of cached statements may no longer match the tables
        if is_ddl(sql) {
            inner.statements.clear();
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // dropping the client ends the driver task
        self.inner.lock().await.take();
        Ok(())
    }
}

fn is_ddl(sql: &str) -> bool {
    let keyword = sql.split_whitespace().next().unwrap_or_default();
    ["CREATE", "DROP", "ALTER", "TRUNCATE"]
        .iter()
        .any(|k| keyword.eq_ignore_ascii_case(k))
}

fn param_refs(boxed: &[BoxedParam]) -> Vec<&(dyn ToSql + Sync)> {
    boxed
        .iter()
        .map(|b| b.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

fn bind_params(statement: &Statement, params: &[SqlValue]) -> Result<Vec<BoxedParam>> {
    let types = statement.params();
    if types.len() != params.len() {
        return Err(PersistenceError::Statement {
            message: format!(
                "statement expects {} parameters, got {}",
                types.len(),
                params.len()
            ),
            sql: None,
            source: None,
        });
    }
    types
        .iter()
        .zip(params)
        .enumerate()
        .map(|(i, (ty, value))| {
            bind_param(value, ty).map_err(|message| {
                PersistenceError::type_conversion(format!("${}", i + 1), message)
            })
        })
        .collect()
}

/// Boxes `value` as the Rust type the server expects for `ty`.
fn bind_param(value: &SqlValue, ty: &Type) -> std::result::Result<BoxedParam, String> {
    let boxed: BoxedParam = match *ty {
        Type::BOOL => Box::new(as_bool(value)?),
        Type::INT2 => Box::new(
            as_i64(value)?
                .map(i16::try_from)
                .transpose()
                .map_err(|_| format!("{value} out of SMALLINT range"))?,
        ),
        Type::INT4 => Box::new(
            as_i64(value)?
                .map(i32::try_from)
                .transpose()
                .map_err(|_| format!("{value} out of INTEGER range"))?,
        ),
        Type::INT8 => Box::new(as_i64(value)?),
        Type::FLOAT4 => Box::new(as_f64(value)?.map(|v| v as f32)),
        Type::FLOAT8 => Box::new(as_f64(value)?),
        Type::NUMERIC => Box::new(as_decimal(value)?),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            Box::new((!value.is_null()).then(|| value.to_string()))
        }
        Type::TIMESTAMP => Box::new(as_timestamp(value)?),
        Type::TIMESTAMPTZ => Box::new(as_timestamp(value)?.map(|ts| ts.and_utc())),
        Type::DATE => Box::new(as_date(value)?),
        ref other => return Err(format!("unsupported parameter type {}", other.name())),
    };
    Ok(boxed)
}

fn as_bool(value: &SqlValue) -> std::result::Result<Option<bool>, String> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Bool(b) => Ok(Some(*b)),
        other => Err(format!("cannot bind {other:?} as BOOLEAN")),
    }
}

fn as_i64(value: &SqlValue) -> std::result::Result<Option<i64>, String> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Int(i) => Ok(Some(*i)),
        SqlValue::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Ok(Some(*f as i64)),
        SqlValue::Text(s) => parse_i64(s)
            .map(Some)
            .ok_or_else(|| format!("cannot bind '{s}' as an integer")),
        other => Err(format!("cannot bind {other:?} as an integer")),
    }
}

fn as_f64(value: &SqlValue) -> std::result::Result<Option<f64>, String> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Int(i) => Ok(Some(*i as f64)),
        SqlValue::Float(f) => Ok(Some(*f)),
        SqlValue::Text(s) => parse_f64(s)
            .map(Some)
            .ok_or_else(|| format!("cannot bind '{s}' as a float")),
        other => Err(format!("cannot bind {other:?} as a float")),
    }
}

fn as_decimal(value: &SqlValue) -> std::result::Result<Option<Decimal>, String> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Int(i) => Ok(Some(Decimal::from(*i))),
        // 2.55 binds as 2.55, not its binary expansion
        SqlValue::Float(f) => Decimal::from_f64(*f)
            .map(Some)
            .ok_or_else(|| format!("{f} cannot be represented as NUMERIC")),
        SqlValue::Text(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(|_| format!("cannot bind '{s}' as NUMERIC")),
        other => Err(format!("cannot bind {other:?} as NUMERIC")),
    }
}

fn as_timestamp(value: &SqlValue) -> std::result::Result<Option<NaiveDateTime>, String> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Timestamp(ts) => Ok(Some(*ts)),
        SqlValue::Date(d) => Ok(Some(d.and_time(NaiveTime::MIN))),
        other => Err(format!("cannot bind {other:?} as TIMESTAMP")),
    }
}

fn as_date(value: &SqlValue) -> std::result::Result<Option<NaiveDate>, String> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Date(d) => Ok(Some(*d)),
        SqlValue::Timestamp(ts) => Ok(Some(ts.date())),
        other => Err(format!("cannot bind {other:?} as DATE")),
    }
}

fn sql_type_of(ty: &Type) -> SqlType {
    match *ty {
        Type::BOOL => SqlType::Boolean,
        Type::INT2 => SqlType::SmallInt,
        Type::INT4 => SqlType::Integer,
        Type::INT8 => SqlType::BigInt,
        Type::FLOAT4 => SqlType::Real,
        Type::FLOAT8 => SqlType::DoublePrecision,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => SqlType::Text,
        Type::TIMESTAMP | Type::TIMESTAMPTZ => SqlType::Timestamp,
        Type::DATE => SqlType::Date,
        Type::NUMERIC => SqlType::Numeric,
        ref other => SqlType::Other(other.name().to_string()),
    }
}

fn decode_row(row: &Row) -> Result<Vec<SqlValue>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            decode_cell(row, idx, column.type_())
                .map_err(|message| PersistenceError::type_conversion(column.name(), message))
        })
        .collect()
}

fn decode_cell(row: &Row, idx: usize, ty: &Type) -> std::result::Result<SqlValue, String> {
    fn get<'a, T: tokio_postgres::types::FromSql<'a>>(
        row: &'a Row,
        idx: usize,
    ) -> std::result::Result<Option<T>, String> {
        row.try_get::<_, Option<T>>(idx).map_err(|e| e.to_string())
    }

    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(SqlValue::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(|v| SqlValue::Int(i64::from(v))),
        Type::INT4 => get::<i32>(row, idx)?.map(|v| SqlValue::Int(i64::from(v))),
        Type::INT8 => get::<i64>(row, idx)?.map(SqlValue::Int),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(|v| SqlValue::Float(f64::from(v))),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(SqlValue::Float),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?.map(SqlValue::Timestamp),
        Type::TIMESTAMPTZ => {
            get::<DateTime<Utc>>(row, idx)?.map(|ts| SqlValue::Timestamp(ts.naive_utc()))
        }
        Type::DATE => get::<NaiveDate>(row, idx)?.map(SqlValue::Date),
        Type::NUMERIC => get::<Decimal>(row, idx)?
            .map(|d| decimal_to_float(&d))
            .transpose()?,
        _ => get::<String>(row, idx)
            .map_err(|_| format!("unsupported result type {}", ty.name()))?
            .map(SqlValue::Text),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn decimal_to_float(value: &Decimal) -> std::result::Result<SqlValue, String> {
    value
        .to_f64()
        .map(SqlValue::Float)
        .ok_or_else(|| format!("NUMERIC value {value} does not fit in a float"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_codes() {
        assert!(is_transient(&SqlState::CONNECTION_FAILURE));
        assert!(is_transient(&SqlState::CANNOT_CONNECT_NOW));
        assert!(is_transient(&SqlState::TOO_MANY_CONNECTIONS));
        assert!(!is_transient(&SqlState::INVALID_PASSWORD));
        assert!(!is_transient(&SqlState::INVALID_CATALOG_NAME));
    }

    #[test]
    fn test_bind_param_coerces_to_server_type() {
        assert!(bind_param(&SqlValue::Int(7), &Type::INT2).is_ok());
        assert!(bind_param(&SqlValue::Int(70_000), &Type::INT2).is_err());
        assert!(bind_param(&SqlValue::Float(6.0), &Type::INT8).is_ok());
        assert!(bind_param(&SqlValue::Float(6.5), &Type::INT8).is_err());
        assert!(bind_param(&SqlValue::Float(2.55), &Type::TEXT).is_ok());
        assert!(bind_param(&SqlValue::Null, &Type::TIMESTAMP).is_ok());
        assert!(bind_param(&SqlValue::Text("x".into()), &Type::BOOL).is_err());
        assert!(bind_param(&SqlValue::Int(1), &Type::JSONB).is_err());
    }

    #[test]
    fn test_numeric_params_bind_as_decimal() {
        assert_eq!(
            as_decimal(&SqlValue::Float(2.55)).unwrap(),
            Some(Decimal::new(255, 2))
        );
        assert_eq!(as_decimal(&SqlValue::Int(6)).unwrap(), Some(Decimal::from(6)));
        assert_eq!(
            as_decimal(&SqlValue::Text(" 3.39 ".into())).unwrap(),
            Some(Decimal::new(339, 2))
        );
        assert_eq!(as_decimal(&SqlValue::Null).unwrap(), None);
        assert!(as_decimal(&SqlValue::Float(f64::NAN)).is_err());
        assert!(as_decimal(&SqlValue::Bool(true)).is_err());
        assert!(bind_param(&SqlValue::Float(2.55), &Type::NUMERIC).is_ok());
    }

    #[test]
    fn test_numeric_results_decode_to_float() {
        let SqlValue::Float(revenue) = decimal_to_float(&Decimal::new(818_780_636, 2)).unwrap()
        else {
            panic!("expected float");
        };
        assert!((revenue - 8_187_806.36).abs() < 1e-6);
        let average = "4.3333333333333333".parse::<Decimal>().unwrap();
        let SqlValue::Float(v) = decimal_to_float(&average).unwrap() else {
            panic!("expected float");
        };
        assert!((v - 13.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_is_ddl() {
        assert!(is_ddl("DROP TABLE \"retail\""));
        assert!(is_ddl("create table t (a int)"));
        assert!(!is_ddl("BEGIN"));
        assert!(!is_ddl(""));
    }

    #[test]
    fn test_sql_type_of() {
        assert_eq!(sql_type_of(&Type::INT8), SqlType::BigInt);
        assert_eq!(sql_type_of(&Type::VARCHAR), SqlType::Text);
        assert_eq!(sql_type_of(&Type::NUMERIC), SqlType::Numeric);
        assert_eq!(sql_type_of(&Type::JSONB), SqlType::Other("jsonb".into()));
    }
}
