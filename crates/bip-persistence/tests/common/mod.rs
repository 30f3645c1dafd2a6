//! In-memory database used by the integration tests.
//!
//! Understands exactly the statements this crate generates: upsert and
//! multi-row inserts, `CREATE`/`DROP TABLE`, transaction control, the
//! `information_schema` lookup and `SELECT COUNT(*)`. Other queries are
//! answered from a queue of canned results.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bip_persistence::{
    Connector, DatabaseConfig, PersistenceError, QueryResult, Result, Session, SqlValue,
    TableColumn,
};

#[derive(Debug, Clone, Default)]
pub struct MockTable {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<HashMap<String, SqlValue>>,
}

impl MockTable {
    pub fn value(&self, row: usize, column: &str) -> Option<&SqlValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

/// How a scripted `open` call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFailure {
    Transient,
    Authentication,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub tables: HashMap<String, MockTable>,
    snapshot: Option<HashMap<String, MockTable>>,
    pub statements: Vec<String>,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub pings: usize,
    pub executes: usize,
    pub opens: usize,
    pub closes: usize,
    /// Fail the n-th `execute` call (1-based).
    pub fail_execute_at: Option<usize>,
    pub open_failures: VecDeque<OpenFailure>,
    pub canned: VecDeque<QueryResult>,
}

#[derive(Debug, Clone, Default)]
pub struct MockDb {
    state: Arc<Mutex<MockState>>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, columns: Vec<TableColumn>) -> Self {
        self.state().tables.insert(
            name.to_string(),
            MockTable {
                columns,
                rows: Vec::new(),
            },
        );
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn table(&self, name: &str) -> MockTable {
        self.state().tables.get(name).cloned().unwrap_or_default()
    }

    pub fn session(&self) -> MockSession {
        MockSession {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }
    }

    pub fn connector(&self) -> Arc<MockConnector> {
        Arc::new(MockConnector { db: self.clone() })
    }
}

pub struct MockConnector {
    db: MockDb,
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, _config: &DatabaseConfig) -> Result<Box<dyn Session>> {
        let failure = {
            let mut state = self.db.state();
            state.opens += 1;
            state.open_failures.pop_front()
        };
        match failure {
            Some(OpenFailure::Transient) => Err(PersistenceError::connection(
                "could not connect to server: Connection refused",
            )),
            Some(OpenFailure::Authentication) => Err(PersistenceError::Authentication {
                message: "password authentication failed for user \"admin\"".into(),
                source: None,
            }),
            None => Ok(Box::new(self.db.session())),
        }
    }
}

pub struct MockSession {
    state: Arc<Mutex<MockState>>,
    closed: AtomicBool,
}

impl MockSession {
    fn lock(&self) -> Result<MutexGuard<'_, MockState>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PersistenceError::HandleClosed);
        }
        Ok(self.state.lock().unwrap())
    }
}

#[async_trait]
impl Session for MockSession {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut state = self.lock()?;
        state.executes += 1;
        state.statements.push(sql.to_string());
        if state.fail_execute_at == Some(state.executes) {
            return Err(PersistenceError::statement("deadlock detected", sql));
        }
        if !sql.starts_with("INSERT INTO ") {
            return Err(PersistenceError::statement("unsupported statement", sql));
        }
        apply_insert(&mut state, sql, params)
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let mut state = self.lock()?;
        state.statements.push(sql.to_string());

        if sql.contains("information_schema.columns") {
            let Some(SqlValue::Text(table)) = params.first() else {
                return Err(PersistenceError::statement("missing table parameter", sql));
            };
            let rows = state
                .tables
                .get(table)
                .map(|t| {
                    t.columns
                        .iter()
                        .map(|c| {
                            vec![
                                SqlValue::Text(c.name.clone()),
                                SqlValue::Text(c.data_type.clone()),
                                SqlValue::Bool(c.is_generated),
                            ]
                        })
                        .collect()
                })
                .unwrap_or_default();
            return Ok(QueryResult {
                columns: Vec::new(),
                rows,
            });
        }

        if let Some(rest) = sql.strip_prefix("SELECT COUNT(*) FROM ") {
            let table = unquote(rest.trim());
            let Some(t) = state.tables.get(&table) else {
                return Err(PersistenceError::statement(
                    format!("relation \"{table}\" does not exist"),
                    sql,
                ));
            };
            return Ok(QueryResult {
                columns: vec![bip_persistence::ResultColumn::new(
                    "count",
                    bip_persistence::SqlType::BigInt,
                )],
                rows: vec![vec![SqlValue::Int(t.rows.len() as i64)]],
            });
        }

        state
            .canned
            .pop_front()
            .ok_or_else(|| PersistenceError::statement("syntax error at or near \"SELEC\"", sql))
    }

    async fn batch_execute(&self, sql: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.statements.push(sql.to_string());
        match sql {
            "SELECT 1" => state.pings += 1,
            "BEGIN" | "BEGIN READ ONLY" => {
                state.begins += 1;
                state.snapshot = Some(state.tables.clone());
            }
            "COMMIT" => {
                state.commits += 1;
                state.snapshot = None;
            }
            "ROLLBACK" => {
                state.rollbacks += 1;
                if let Some(snapshot) = state.snapshot.take() {
                    state.tables = snapshot;
                }
            }
            _ if sql.starts_with("DROP TABLE ") => {
                let table = unquote(&sql["DROP TABLE ".len()..]);
                state.tables.remove(&table);
            }
            _ if sql.starts_with("CREATE TABLE ") => {
                let rest = &sql["CREATE TABLE ".len()..];
                let (name, defs) = rest.split_once(" (").unwrap();
                let defs = defs.strip_suffix(')').unwrap();
                let columns = defs
                    .split(", ")
                    .map(|def| {
                        let (name, ty) = def.rsplit_once("\" ").unwrap();
                        TableColumn::new(unquote(&format!("{name}\"")), ty.to_lowercase())
                    })
                    .collect();
                state.tables.insert(
                    unquote(name),
                    MockTable {
                        columns,
                        rows: Vec::new(),
                    },
                );
            }
            _ => return Err(PersistenceError::statement("unsupported batch", sql)),
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.lock().unwrap().closes += 1;
        }
        Ok(())
    }
}

fn unquote(identifier: &str) -> String {
    identifier.trim().trim_matches('"').replace("\"\"", "\"")
}

fn parse_list(list: &str) -> Vec<String> {
    list.split(", ").map(unquote).collect()
}

fn apply_insert(state: &mut MockState, sql: &str, params: &[SqlValue]) -> Result<u64> {
    let rest = &sql["INSERT INTO ".len()..];
    let (table, rest) = rest.split_once(" (").unwrap();
    let (columns, rest) = rest.split_once(')').unwrap();
    let columns = parse_list(columns);

    let conflict = rest.split_once("ON CONFLICT (").map(|(_, tail)| {
        let (keys, action) = tail.split_once(')').unwrap();
        (parse_list(keys), action.trim().starts_with("DO UPDATE"))
    });

    let table_name = unquote(table);
    let Some(target) = state.tables.get_mut(&table_name) else {
        return Err(PersistenceError::statement(
            format!("relation \"{table_name}\" does not exist"),
            sql,
        ));
    };
    for column in &columns {
        if !target.columns.iter().any(|c| &c.name == column) {
            return Err(PersistenceError::statement(
                format!("column \"{column}\" does not exist"),
                sql,
            ));
        }
    }

    let mut affected = 0;
    for values in params.chunks(columns.len()) {
        let record: HashMap<String, SqlValue> =
            columns.iter().cloned().zip(values.iter().cloned()).collect();

        let existing = conflict.as_ref().and_then(|(keys, _)| {
            target
                .rows
                .iter()
                .position(|row| keys.iter().all(|k| row.get(k) == record.get(k)))
        });

        match (existing, &conflict) {
            (Some(index), Some((keys, true))) => {
                for (column, value) in &record {
                    if !keys.contains(column) {
                        target.rows[index].insert(column.clone(), value.clone());
                    }
                }
                affected += 1;
            }
            (Some(_), _) => {}
            (None, _) => {
                target.rows.push(record);
                affected += 1;
            }
        }
    }
    Ok(affected)
}
