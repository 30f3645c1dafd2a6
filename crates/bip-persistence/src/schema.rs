//! Live table metadata and identifier handling.

use crate::error::{PersistenceError, Result};
use crate::session::Session;
use crate::value::SqlValue;

const MAX_IDENTIFIER_LEN: usize = 255;

const COLUMNS_SQL: &str = "SELECT column_name::text, data_type::text, \
     (is_identity = 'YES' OR is_generated = 'ALWAYS' OR COALESCE(column_default, '') LIKE 'nextval(%') \
     FROM information_schema.columns \
     WHERE table_name::text = $1 AND table_schema = current_schema() \
     ORDER BY ordinal_position";

const COLUMNS_IN_SCHEMA_SQL: &str = "SELECT column_name::text, data_type::text, \
     (is_identity = 'YES' OR is_generated = 'ALWAYS' OR COALESCE(column_default, '') LIKE 'nextval(%') \
     FROM information_schema.columns \
     WHERE table_name::text = $1 AND table_schema::text = $2 \
     ORDER BY ordinal_position";

/// A destination table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    /// `information_schema` type name, e.g. `bigint`, `numeric`.
    pub data_type: String,
    /// Identity, serial or generated column; never written.
    pub is_generated: bool,
}

impl TableColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_generated: false,
        }
    }

    pub fn generated(mut self) -> Self {
        self.is_generated = true;
        self
    }
}

/// Columns of a destination table, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<TableColumn>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>, columns: Vec<TableColumn>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// Loads the column set of `table` (optionally `schema.table`).
///
/// A table with no visible columns does not exist as far as writes are
/// concerned and yields a `Schema` error.
pub async fn fetch_table_schema(session: &dyn Session, table: &str) -> Result<TableSchema> {
    let (schema, name) = validate_table_name(table)?;
    let result = match schema {
        Some(schema) => {
            let params = [SqlValue::Text(name.into()), SqlValue::Text(schema.into())];
            session.query(COLUMNS_IN_SCHEMA_SQL, &params).await?
        }
        None => {
            session
                .query(COLUMNS_SQL, &[SqlValue::Text(name.into())])
                .await?
        }
    };

    if result.rows.is_empty() {
        return Err(PersistenceError::schema(table, "table does not exist"));
    }

    let columns = result
        .rows
        .iter()
        .map(|row| match row.as_slice() {
            [SqlValue::Text(name), SqlValue::Text(data_type), generated] => Ok(TableColumn {
                name: name.clone(),
                data_type: data_type.clone(),
                is_generated: matches!(generated, SqlValue::Bool(true)),
            }),
            other => Err(PersistenceError::schema(
                table,
                format!("unexpected column metadata row {other:?}"),
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(table, columns = columns.len(), "loaded table schema");
    Ok(TableSchema::new(table, columns))
}

/// Whether `table` exists and has at least one column.
pub async fn table_exists(session: &dyn Session, table: &str) -> Result<bool> {
    match fetch_table_schema(session, table).await {
        Ok(_) => Ok(true),
        Err(PersistenceError::Schema { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quoted, possibly schema-qualified table reference.
pub fn qualified_table(table: &str) -> Result<String> {
    let (schema, name) = validate_table_name(table)?;
    Ok(match schema {
        Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(name)),
        None => quote_identifier(name),
    })
}

/// Splits `schema.table` and checks each part is a plain identifier.
pub fn validate_table_name(table: &str) -> Result<(Option<&str>, &str)> {
    let (schema, name) = match table.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    };
    if let Some(schema) = schema {
        validate_identifier(schema)?;
    }
    validate_identifier(name)?;
    Ok((schema, name))
}

fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PersistenceError::config("table identifier cannot be empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(PersistenceError::config(format!(
            "table identifier too long: {} chars (max {MAX_IDENTIFIER_LEN})",
            name.len()
        )));
    }

    let mut chars = name.chars();
    if !chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    {
        return Err(PersistenceError::config(format!(
            "invalid table identifier '{name}': must start with a letter or underscore"
        )));
    }
    if let Some(c) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(PersistenceError::config(format!(
            "invalid table identifier '{name}': contains invalid character '{c}'"
        )));
    }
    Ok(())
}
