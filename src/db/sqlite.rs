//! SQLite connector.
//!
//! Only the `database` parameter is used: a file path (created if missing)
//! or `:memory:`. Parameters use `?` placeholders.
//!
//! Close finalizes cached statements and closes the file handle. The handle
//! is consumed, so a second close is not expressible.

use super::decode::{column_info, convert_row, decode, decode_fallback};
use super::{BackendKind, Connector, DatabaseClient, RowSet, Value};
use crate::config::ConnectionConfig;
use crate::error::{DbError, Result};
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Executor, Statement};
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

/// Path value selecting a private in-memory database.
pub const MEMORY_DATABASE: &str = ":memory:";

/// Connector for SQLite database files.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteConnector;

#[async_trait]
impl Connector for SqliteConnector {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        let path = config.require_database()?;
        let options = connect_options(path)?;
        debug!("Opening SQLite database {path}");

        let conn = options
            .connect()
            .await
            .map_err(|e| DbError::connection(format!("Cannot open SQLite database '{path}': {e}")))?;

        Ok(Box::new(SqliteClient { conn }))
    }
}

/// Builds connect options for a file path or `:memory:`.
fn connect_options(path: &str) -> Result<SqliteConnectOptions> {
    if path == MEMORY_DATABASE {
        return SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DbError::config(format!("Invalid SQLite path: {e}")));
    }
    Ok(SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true))
}

/// A live SQLite session.
#[derive(Debug)]
pub struct SqliteClient {
    conn: SqliteConnection,
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn fetch_rows(&mut self, sql: &str, params: &[Value]) -> Result<RowSet> {
        let start = Instant::now();

        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| DbError::query(format_query_error(e)))?;

        let execution_time = start.elapsed();

        let columns = match rows.first() {
            Some(first) => column_info(sqlx::Row::columns(first)),
            None => match (&mut self.conn).prepare(sql).await {
                Ok(statement) => column_info(statement.columns()),
                Err(_) => Vec::new(),
            },
        };

        let rows = rows
            .iter()
            .map(|row| convert_row(row, decode_value))
            .collect::<Result<Vec<_>>>()?;

        Ok(RowSet::with_data(columns, rows).with_execution_time(execution_time))
    }

    async fn execute_and_commit(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| DbError::query(format_query_error(e)))?;

        let done = bind_params(sqlx::query(sql), params)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::query(format_query_error(e)))?;

        tx.commit()
            .await
            .map_err(|e| DbError::query(format_query_error(e)))?;

        Ok(done.rows_affected())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DbError::connection(e.to_string()))
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            // SQLite integers are signed 64-bit; larger values are stored as text.
            Value::UInt(u) => match i64::try_from(*u) {
                Ok(i) => query.bind(i),
                Err(_) => query.bind(u.to_string()),
            },
            Value::Float(f) => query.bind(*f),
            Value::String(s) => query.bind(s.clone()),
            Value::Bytes(b) => query.bind(b.clone()),
        };
    }
    query
}

/// Converts a single non-NULL value using its runtime storage class.
fn decode_value(row: &SqliteRow, index: usize, type_name: &str) -> Result<Value> {
    let value = match type_name {
        "INTEGER" => Value::Int(decode(row, index)?),
        "REAL" => Value::Float(decode(row, index)?),
        "BOOLEAN" => Value::Bool(decode(row, index)?),
        "BLOB" => Value::Bytes(decode(row, index)?),
        "TEXT" => Value::String(decode(row, index)?),
        _ => decode_fallback(row, index, type_name),
    };
    Ok(value)
}

fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
