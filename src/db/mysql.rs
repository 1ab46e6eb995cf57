//! MySQL and MariaDB connector.
//!
//! Both backends speak the MySQL wire protocol and share sqlx's MySQL driver;
//! the connector only differs in the backend it reports. Parameters use `?`
//! placeholders.
//!
//! Close sends COM_QUIT and drops the socket. The handle is consumed, so a
//! second close is not expressible.

use super::decode::{column_info, convert_row, decode, decode_fallback};
use super::{describe_connect_failure, BackendKind, Connector, DatabaseClient, RowSet, Value};
use crate::config::ConnectionConfig;
use crate::error::{DbError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue};
use sqlx::{ConnectOptions, Connection, Executor, Row as _, Statement};
use std::time::Instant;
use tracing::debug;

/// Connector for MySQL-protocol servers.
#[derive(Debug, Clone, Copy)]
pub struct MySqlConnector {
    backend: BackendKind,
}

impl MySqlConnector {
    /// Connector reporting itself as MySQL.
    pub fn mysql() -> Self {
        Self {
            backend: BackendKind::Mysql,
        }
    }

    /// Connector reporting itself as MariaDB.
    pub fn mariadb() -> Self {
        Self {
            backend: BackendKind::Mariadb,
        }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        let options = connect_options(config)?;
        debug!(
            "Opening {} session to {}",
            self.backend.display_name(),
            config.display_string()
        );

        let conn = options
            .connect()
            .await
            .map_err(|e| describe_connect_failure(&e, self.backend, config))?;

        Ok(Box::new(MySqlClient {
            conn,
            backend: self.backend,
        }))
    }
}

/// Builds connect options from the parameters MySQL needs.
fn connect_options(config: &ConnectionConfig) -> Result<MySqlConnectOptions> {
    Ok(MySqlConnectOptions::new()
        .host(config.require_host()?)
        .port(config.require_port()?)
        .username(config.require_user()?)
        .password(config.require_password()?)
        .database(config.require_database()?))
}

/// A live MySQL or MariaDB session.
#[derive(Debug)]
pub struct MySqlClient {
    conn: MySqlConnection,
    backend: BackendKind,
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    fn backend(&self) -> BackendKind {
        self.backend
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
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::UInt(u) => query.bind(*u),
            Value::Float(f) => query.bind(*f),
            Value::String(s) => query.bind(s.clone()),
            Value::Bytes(b) => query.bind(b.clone()),
        };
    }
    query
}

/// Converts a single non-NULL column value from a MySqlRow to our Value type.
fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value> {
    if type_name.ends_with("UNSIGNED") {
        return Ok(Value::UInt(decode(row, index)?));
    }

    let value = match type_name {
        "BIT" => match row.try_get::<u64, _>(index) {
            Ok(bits) => Value::UInt(bits),
            Err(_) => decode_fallback(row, index, type_name),
        },
        "BOOLEAN" => Value::Bool(decode(row, index)?),
        // sqlx has no Rust type declared compatible with YEAR; it is a two byte integer.
        "YEAR" => Value::Int(
            row.try_get_unchecked::<u16, _>(index)
                .map_err(|e| DbError::query(format!("Failed to decode column {index}: {e}")))?
                .into(),
        ),
        "TINYINT" => Value::Int(decode::<_, i8>(row, index)?.into()),
        "SMALLINT" => Value::Int(decode::<_, i16>(row, index)?.into()),
        "INT" | "MEDIUMINT" => Value::Int(decode::<_, i32>(row, index)?.into()),
        "BIGINT" => Value::Int(decode(row, index)?),
        "FLOAT" => Value::Float(decode::<_, f32>(row, index)?.into()),
        "DOUBLE" => Value::Float(decode(row, index)?),
        "DECIMAL" => Value::String(decode::<_, Decimal>(row, index)?.to_string()),
        "DATE" => Value::String(decode::<_, NaiveDate>(row, index)?.to_string()),
        "DATETIME" => Value::String(decode::<_, NaiveDateTime>(row, index)?.to_string()),
        "TIMESTAMP" => Value::String(decode::<_, DateTime<Utc>>(row, index)?.to_rfc3339()),
        "JSON" => Value::String(decode::<_, JsonValue>(row, index)?.to_string()),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            Value::Bytes(decode(row, index)?)
        }
        // TIME may be negative or exceed 24h; only clock times decode as NaiveTime.
        "TIME" => match row.try_get::<NaiveTime, _>(index) {
            Ok(time) => Value::String(time.to_string()),
            Err(_) => decode_fallback(row, index, type_name),
        },
        _ => decode_fallback(row, index, type_name),
    };
    Ok(value)
}

/// Formats a query error, prefixing the MySQL error code when available.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => match db_error.code() {
            Some(code) => format!("({code}) {}", db_error.message()),
            None => db_error.message().to_string(),
        },
        None => error.to_string(),
    }
}
