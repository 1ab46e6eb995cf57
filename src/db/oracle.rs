//! Oracle connector.
//!
//! Host, port and service name are combined into a TNS connect descriptor,
//! then a session is opened with user and password. The Oracle client
//! library is synchronous, so every call runs on tokio's blocking pool.
//! Parameters use `:1`, `:2`, ... placeholders.
//!
//! Close ends the session through the client library. The handle is
//! consumed, so a second close is not expressible.

use super::{describe_connect_failure, BackendKind, ColumnInfo, Connector, DatabaseClient, RowSet, Value};
use crate::config::ConnectionConfig;
use crate::error::{DbError, Result};
use ::oracle::sql_type::{OracleType, ToSql};
use ::oracle::SqlValue;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Builds the connect descriptor for a host, port and service name.
pub fn connect_descriptor(host: &str, port: u16, service_name: &str) -> String {
    format!(
        "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST={host})(PORT={port}))(CONNECT_DATA=(SERVICE_NAME={service_name})))"
    )
}

/// Connector for Oracle databases.
#[derive(Debug, Default, Clone, Copy)]
pub struct OracleConnector;

#[async_trait]
impl Connector for OracleConnector {
    fn backend(&self) -> BackendKind {
        BackendKind::Oracle
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        let descriptor = connect_descriptor(
            config.require_host()?,
            config.require_port()?,
            config.require_service_name()?,
        );
        let user = config.require_user()?.to_string();
        let password = config.require_password()?.to_string();
        debug!("Opening Oracle session to {descriptor}");

        let conn = tokio::task::spawn_blocking(move || {
            ::oracle::Connection::connect(user, password, descriptor)
        })
        .await
        .map_err(|e| DbError::internal(format!("Oracle connect task failed: {e}")))?
        .map_err(|e| describe_connect_failure(&e, BackendKind::Oracle, config))?;

        Ok(Box::new(OracleClient {
            conn: Arc::new(conn),
        }))
    }
}

/// A live Oracle session.
pub struct OracleClient {
    conn: Arc<::oracle::Connection>,
}

impl OracleClient {
    /// Runs a closure against the session on the blocking pool.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&::oracle::Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn))
            .await
            .map_err(|e| DbError::internal(format!("Oracle task failed: {e}")))?
    }
}

#[async_trait]
impl DatabaseClient for OracleClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Oracle
    }

    async fn fetch_rows(&mut self, sql: &str, params: &[Value]) -> Result<RowSet> {
        let sql = sql.to_string();
        let params = params.to_vec();

        self.run_blocking(move |conn| {
            let start = Instant::now();
            let bound = to_sql_params(&params);
            let refs: Vec<&dyn ToSql> = bound.iter().map(|p| p.as_ref()).collect();

            let result_set = conn.query(&sql, &refs).map_err(query_error)?;
            let columns: Vec<ColumnInfo> = result_set
                .column_info()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.oracle_type().to_string()))
                .collect();
            let types: Vec<OracleType> = result_set
                .column_info()
                .iter()
                .map(|col| col.oracle_type().clone())
                .collect();

            let mut rows = Vec::new();
            for row in result_set {
                let row = row.map_err(query_error)?;
                let values = row
                    .sql_values()
                    .iter()
                    .zip(&types)
                    .map(|(value, oracle_type)| convert_value(value, oracle_type))
                    .collect::<Result<Vec<_>>>()?;
                rows.push(values);
            }

            Ok(RowSet::with_data(columns, rows).with_execution_time(start.elapsed()))
        })
        .await
    }

    async fn execute_and_commit(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let sql = sql.to_string();
        let params = params.to_vec();

        self.run_blocking(move |conn| {
            let bound = to_sql_params(&params);
            let refs: Vec<&dyn ToSql> = bound.iter().map(|p| p.as_ref()).collect();

            let affected = conn
                .execute(&sql, &refs)
                .and_then(|statement| statement.row_count());
            let affected = match affected {
                Ok(n) => n,
                Err(e) => {
                    let _ = conn.rollback();
                    return Err(query_error(e));
                }
            };
            conn.commit().map_err(query_error)?;
            Ok(affected)
        })
        .await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.run_blocking(|conn| conn.close().map_err(|e| DbError::connection(e.to_string())))
            .await
    }
}

fn query_error(error: ::oracle::Error) -> DbError {
    DbError::query(error.to_string())
}

/// Converts bind values to Oracle parameters.
///
/// Booleans are bound as 1/0 since SQL BOOLEAN only exists from 23c on.
fn to_sql_params(params: &[Value]) -> Vec<Box<dyn ToSql>> {
    params
        .iter()
        .map(|param| -> Box<dyn ToSql> {
            match param {
                Value::Null => Box::new(None::<String>),
                Value::Bool(b) => Box::new(i64::from(*b)),
                Value::Int(i) => Box::new(*i),
                Value::UInt(u) => Box::new(*u),
                Value::Float(f) => Box::new(*f),
                Value::String(s) => Box::new(s.clone()),
                Value::Bytes(b) => Box::new(b.clone()),
            }
        })
        .collect()
}

/// Converts one fetched value according to its column type.
fn convert_value(value: &SqlValue, oracle_type: &OracleType) -> Result<Value> {
    if value.is_null().map_err(query_error)? {
        return Ok(Value::Null);
    }

    let converted = match oracle_type {
        // NUMBER carries no Rust-side type: integral values become Int, the rest Float.
        OracleType::Number(_, _) | OracleType::Float(_) | OracleType::Int64 => {
            if let Ok(i) = value.get::<i64>() {
                Value::Int(i)
            } else if let Ok(f) = value.get::<f64>() {
                Value::Float(f)
            } else {
                Value::String(value.get::<String>().map_err(query_error)?)
            }
        }
        OracleType::UInt64 => Value::UInt(value.get::<u64>().map_err(query_error)?),
        OracleType::BinaryFloat | OracleType::BinaryDouble => {
            Value::Float(value.get::<f64>().map_err(query_error)?)
        }
        OracleType::Raw(_) | OracleType::BLOB | OracleType::LongRaw => {
            Value::Bytes(value.get::<Vec<u8>>().map_err(query_error)?)
        }
        OracleType::Boolean => Value::Bool(value.get::<bool>().map_err(query_error)?),
        _ => Value::String(value.get::<String>().map_err(query_error)?),
    };
    Ok(converted)
}
