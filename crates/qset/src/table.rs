//! Table-level write helpers: `INSERT` and `CREATE TABLE`.
//!
//! Table and column names go through [`Ident`]; values are always bound, and
//! structured values are stored as JSON text.

use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::{QueryError, QueryResult};
use crate::ident::Ident;
use crate::row::Row;
use crate::statement::Statement;
use crate::value::Value;

/// Tokens allowed in a `create_table` column definition.
const SAFE_DEFINITION_TOKENS: &[&str] = &[
    "ACTION", "ASC", "AUTOINCREMENT", "BIGINT", "BIGSERIAL", "BINARY", "BLOB", "BOOLEAN",
    "BYTEA", "CASCADE", "CHAR", "CHECK", "COLLATE", "CURRENT_DATE", "CURRENT_TIME",
    "CURRENT_TIMESTAMP", "DATETIME", "DEFAULT", "DELETE", "DESC", "DOUBLE", "FALSE", "FLOAT",
    "FOREIGN", "INTEGER", "JSON", "JSONB", "KEY", "NO", "NOCASE", "NOT", "NULL", "NUMERIC", "ON",
    "PRECISION", "PRIMARY", "REAL", "REFERENCES", "RESTRICT", "RTRIM", "SERIAL", "SET",
    "SMALLINT", "TEXT", "TIMESTAMP", "TRUE", "UNIQUE", "UPDATE", "VARCHAR",
];

fn unsafe_definition(definition: &str, token: &str) -> QueryError {
    QueryError::invalid_identifier(format!(
        "unsafe token {token:?} in column definition {definition:?}"
    ))
}

/// Where the scanner is relative to a `REFERENCES` clause.
#[derive(Clone, Copy, PartialEq)]
enum RefState {
    None,
    /// Next word is the referenced table.
    Table,
    /// After the referenced table; a `(` opens its column list.
    AfterTable,
    /// Inside the referenced column list.
    Columns,
}

/// Reject column definitions containing anything but type keywords,
/// numbers, quoted literals, parentheses and commas.
///
/// Identifiers are accepted only as the target of a `REFERENCES` clause.
pub fn validate_column_definition(definition: &str) -> QueryResult<()> {
    let mut state = RefState::None;
    let mut chars = definition.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => {
                state = if state == RefState::AfterTable { RefState::Columns } else { RefState::None };
            }
            ')' => {
                if state == RefState::Columns {
                    state = RefState::None;
                }
            }
            ',' => {}
            '\'' => {
                if !chars.by_ref().any(|(_, c)| c == '\'') {
                    return Err(unsafe_definition(definition, &definition[start..]));
                }
            }
            c if c.is_ascii_digit() => {
                while chars.next_if(|(_, c)| c.is_ascii_digit()).is_some() {}
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some((i, c)) =
                    chars.next_if(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
                {
                    end = i + c.len_utf8();
                }
                let word = &definition[start..end];
                state = match state {
                    RefState::Table => RefState::AfterTable,
                    RefState::Columns => RefState::Columns,
                    _ if word.eq_ignore_ascii_case("REFERENCES") => RefState::Table,
                    _ if SAFE_DEFINITION_TOKENS.contains(&word.to_ascii_uppercase().as_str()) => {
                        RefState::None
                    }
                    _ => return Err(unsafe_definition(definition, word)),
                };
            }
            other => return Err(unsafe_definition(definition, &other.to_string())),
        }
    }
    Ok(())
}

fn insert_statement<D: Dialect>(dialect: &D, table: &Ident, columns: &[Ident]) -> String {
    let cols = columns.iter().map(Ident::to_sql).collect::<Vec<_>>().join(", ");
    let marks = vec![dialect.placeholder(); columns.len()].join(", ");
    format!("INSERT INTO {table} ({cols}) VALUES ({marks})")
}

/// `INSERT INTO "table" ("a", "b") VALUES (?, ?)`, then commit.
///
/// Returns the affected row count.
pub async fn insert<C, D, I, K, V>(conn: &C, dialect: &D, table: &str, values: I) -> QueryResult<u64>
where
    C: Connection,
    D: Dialect,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    let table = Ident::parse(table)?;
    let mut columns = Vec::new();
    let mut params = Vec::new();
    for (k, v) in values {
        columns.push(Ident::parse(k.as_ref())?);
        params.push(v.into().to_storage()?);
    }
    if columns.is_empty() {
        return Err(QueryError::malformed("insert requires at least one column"));
    }

    let stmt = Statement::from_parts(dialect.placeholder(), insert_statement(dialect, &table, &columns), params);
    tracing::debug!(target: "qset.query", op = "insert", dialect = dialect.name(), sql = %stmt.sql());
    let affected = conn.execute(stmt.sql(), stmt.params()).await?;
    conn.commit().await?;
    Ok(affected)
}

/// Insert many rows with one prepared statement, then commit.
///
/// Columns come from the first row; every row must carry the same columns in
/// the same order. An empty slice is a no-op.
pub async fn insert_many<C, D>(conn: &C, dialect: &D, table: &str, rows: &[Row]) -> QueryResult<u64>
where
    C: Connection,
    D: Dialect,
{
    let Some(first) = rows.first() else {
        return Ok(0);
    };
    let table = Ident::parse(table)?;
    let columns = first
        .columns()
        .iter()
        .map(|c| Ident::parse(c))
        .collect::<QueryResult<Vec<_>>>()?;
    if columns.is_empty() {
        return Err(QueryError::malformed("insert requires at least one column"));
    }

    let mut batches = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if row.columns() != first.columns() {
            return Err(QueryError::malformed(format!(
                "row {i} has columns {:?}, expected {:?}",
                row.columns(),
                first.columns()
            )));
        }
        let values = row
            .values()
            .iter()
            .cloned()
            .map(Value::to_storage)
            .collect::<QueryResult<Vec<_>>>()?;
        batches.push(values);
    }

    let sql = insert_statement(dialect, &table, &columns);
    tracing::debug!(target: "qset.query", op = "insert_many", dialect = dialect.name(), rows = rows.len(), sql = %sql);
    let affected = conn.execute_many(&sql, &batches).await?;
    conn.commit().await?;
    Ok(affected)
}

/// `CREATE TABLE IF NOT EXISTS` with validated names and column definitions.
pub async fn create_table<C, D>(
    conn: &C,
    dialect: &D,
    table: &str,
    columns: &[(&str, &str)],
) -> QueryResult<()>
where
    C: Connection,
    D: Dialect,
{
    let table = Ident::parse(table)?;
    if columns.is_empty() {
        return Err(QueryError::malformed("create_table requires at least one column"));
    }
    let mut defs = Vec::with_capacity(columns.len());
    for (name, definition) in columns {
        let column = Ident::parse(name)?;
        validate_column_definition(definition)?;
        defs.push(format!("{column} {}", definition.trim()));
    }
    let sql = format!("CREATE TABLE IF NOT EXISTS {table} ({})", defs.join(", "));
    tracing::debug!(target: "qset.query", op = "create_table", dialect = dialect.name(), sql = %sql);
    conn.execute(&sql, &[]).await?;
    conn.commit().await
}
