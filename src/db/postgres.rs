//! PostgreSQL connector.
//!
//! Opens a single `PgConnection` (no pool) with sqlx. Parameters use `$1`,
//! `$2`, ... placeholders. PostgreSQL does not cast bound values between
//! types, so parameters are bound as the types the server infers for the
//! statement: a NULL for an `INT4` column goes out as a typed NULL, and the
//! literal `42` compared against a `TEXT` column goes out as text.
//!
//! Close sends the Terminate message and drops the socket. The handle is
//! consumed, so a second close is not expressible.

use super::decode::{column_info, convert_row, decode, decode_fallback};
use super::{describe_connect_failure, BackendKind, Connector, DatabaseClient, RowSet, Value};
use crate::config::ConnectionConfig;
use crate::error::{DbError, Result};
use async_trait::async_trait;
use sqlx::postgres::types::{Oid, PgInterval, PgTimeTz};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::types::chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue, Uuid};
use sqlx::{ConnectOptions, Connection, Either, Executor, Statement, TypeInfo};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

/// Connector for PostgreSQL servers.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresConnector;

#[async_trait]
impl Connector for PostgresConnector {
    fn backend(&self) -> BackendKind {
        BackendKind::Postgresql
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        let options = connect_options(config)?;
        debug!("Opening PostgreSQL session to {}", config.display_string());

        let conn = options
            .connect()
            .await
            .map_err(|e| describe_connect_failure(&e, BackendKind::Postgresql, config))?;

        Ok(Box::new(PostgresClient { conn }))
    }
}

/// Builds connect options from the parameters PostgreSQL needs.
fn connect_options(config: &ConnectionConfig) -> Result<PgConnectOptions> {
    Ok(PgConnectOptions::new()
        .host(config.require_host()?)
        .port(config.require_port()?)
        .username(config.require_user()?)
        .password(config.require_password()?)
        .database(config.require_database()?))
}

/// A live PostgreSQL session.
#[derive(Debug)]
pub struct PostgresClient {
    conn: PgConnection,
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Postgresql
    }

    async fn fetch_rows(&mut self, sql: &str, params: &[Value]) -> Result<RowSet> {
        let start = Instant::now();

        let types = parameter_types(&mut self.conn, sql, params).await?;
        let rows = bind_params(sqlx::query(sql), params, &types)?
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| DbError::query(format_query_error(e)))?;

        let execution_time = start.elapsed();

        let columns = match rows.first() {
            Some(first) => column_info(sqlx::Row::columns(first)),
            // No rows to read metadata from; describe the statement instead.
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

        let types = parameter_types(&mut tx, sql, params).await?;
        let done = bind_params(sqlx::query(sql), params, &types)?
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

/// Asks the server for the types of a statement's parameters.
///
/// Statements without parameters skip the round trip.
async fn parameter_types(conn: &mut PgConnection, sql: &str, params: &[Value]) -> Result<Vec<String>> {
    if params.is_empty() {
        return Ok(Vec::new());
    }
    let statement = (&mut *conn)
        .prepare(sql)
        .await
        .map_err(|e| DbError::query(format_query_error(e)))?;
    let types = match statement.parameters() {
        Some(Either::Left(types)) => types.iter().map(|t| t.name().to_uppercase()).collect(),
        _ => Vec::new(),
    };
    Ok(types)
}

/// Binds parameters positionally, each as its declared parameter type.
fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[Value],
    types: &[String],
) -> Result<Query<'q, Postgres, PgArguments>> {
    for (index, param) in params.iter().enumerate() {
        let type_name = types.get(index).map(String::as_str).unwrap_or_default();
        query = bind_typed(query, param, type_name)?;
    }
    Ok(query)
}

fn bind_typed<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
    type_name: &str,
) -> Result<Query<'q, Postgres, PgArguments>> {
    let query = match type_name {
        "BOOL" => query.bind(bool_param(value, type_name)?),
        "INT2" => query.bind(int_param::<i16>(value, type_name)?),
        "INT4" => query.bind(int_param::<i32>(value, type_name)?),
        "INT8" => query.bind(int_param::<i64>(value, type_name)?),
        "FLOAT4" => query.bind(float_param(value, type_name)?.map(|f| f as f32)),
        "FLOAT8" => query.bind(float_param(value, type_name)?),
        "NUMERIC" => query.bind(decimal_param(value, type_name)?),
        "TEXT" | "VARCHAR" | "CHAR" | "NAME" => query.bind(text_param(value, type_name)?),
        "BYTEA" => query.bind(bytes_param(value, type_name)?),
        "UUID" => query.bind(parsed_param::<Uuid>(value, type_name)?),
        "JSON" | "JSONB" => query.bind(json_param(value, type_name)?),
        "DATE" => query.bind(parsed_param::<NaiveDate>(value, type_name)?),
        "TIME" => query.bind(parsed_param::<NaiveTime>(value, type_name)?),
        "TIMESTAMP" => query.bind(timestamp_param(value, type_name)?),
        "TIMESTAMPTZ" => query.bind(timestamptz_param(value, type_name)?),
        _ => bind_untyped(query, value),
    };
    Ok(query)
}

/// Binds a value as its own Rust type, for parameter types without a mapping.
fn bind_untyped<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        // PostgreSQL has no unsigned types; out-of-range values go as NUMERIC.
        Value::UInt(u) => match i64::try_from(*u) {
            Ok(i) => query.bind(i),
            Err(_) => query.bind(Decimal::from(*u)),
        },
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
    }
}

fn cannot_bind(value: &Value, type_name: &str) -> DbError {
    DbError::query(format!("Cannot bind {value} as {type_name}"))
}

/// Applies a conversion to a non-NULL value. NULL stays `None`.
fn convert_param<T>(
    value: &Value,
    type_name: &str,
    convert: impl FnOnce(&Value) -> Option<T>,
) -> Result<Option<T>> {
    if value.is_null() {
        return Ok(None);
    }
    convert(value)
        .map(Some)
        .ok_or_else(|| cannot_bind(value, type_name))
}

fn bool_param(value: &Value, type_name: &str) -> Result<Option<bool>> {
    convert_param(value, type_name, |value| match value {
        Value::Bool(b) => Some(*b),
        Value::Int(0) => Some(false),
        Value::Int(1) => Some(true),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
            "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn int_param<T>(value: &Value, type_name: &str) -> Result<Option<T>>
where
    T: TryFrom<i64> + TryFrom<u64> + FromStr,
{
    convert_param(value, type_name, |value| match value {
        Value::Int(i) => T::try_from(*i).ok(),
        Value::UInt(u) => T::try_from(*u).ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn float_param(value: &Value, type_name: &str) -> Result<Option<f64>> {
    convert_param(value, type_name, |value| match value {
        Value::Int(i) => Some(*i as f64),
        Value::UInt(u) => Some(*u as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn decimal_param(value: &Value, type_name: &str) -> Result<Option<Decimal>> {
    convert_param(value, type_name, |value| match value {
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::UInt(u) => Some(Decimal::from(*u)),
        Value::Float(f) => Decimal::try_from(*f).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    })
}

fn text_param(value: &Value, type_name: &str) -> Result<Option<String>> {
    convert_param(value, type_name, |value| match value {
        Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
        other => Some(other.to_display_string()),
    })
}

fn bytes_param(value: &Value, type_name: &str) -> Result<Option<Vec<u8>>> {
    convert_param(value, type_name, |value| match value {
        Value::Bytes(b) => Some(b.clone()),
        Value::String(s) => Some(s.as_bytes().to_vec()),
        _ => None,
    })
}

fn json_param(value: &Value, type_name: &str) -> Result<Option<JsonValue>> {
    convert_param(value, type_name, |value| match value {
        Value::Bool(b) => Some(JsonValue::from(*b)),
        Value::Int(i) => Some(JsonValue::from(*i)),
        Value::UInt(u) => Some(JsonValue::from(*u)),
        Value::Float(f) => Some(JsonValue::from(*f)),
        Value::String(s) => serde_json::from_str(s).ok(),
        _ => None,
    })
}

/// Parses a text value with the target type's `FromStr`.
fn parsed_param<T: FromStr>(value: &Value, type_name: &str) -> Result<Option<T>> {
    convert_param(value, type_name, |value| match value {
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn timestamp_param(value: &Value, type_name: &str) -> Result<Option<NaiveDateTime>> {
    convert_param(value, type_name, |value| match value {
        Value::String(s) => {
            let s = s.trim();
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .ok()
        }
        _ => None,
    })
}

fn timestamptz_param(value: &Value, type_name: &str) -> Result<Option<DateTime<FixedOffset>>> {
    convert_param(value, type_name, |value| match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
                .ok()
        }
        _ => None,
    })
}

/// Converts a single non-NULL column value from a PgRow to our Value type.
fn decode_value(row: &PgRow, index: usize, type_name: &str) -> Result<Value> {
    let value = match type_name {
        "BOOL" => Value::Bool(decode(row, index)?),
        "INT2" => Value::Int(decode::<_, i16>(row, index)?.into()),
        "INT4" => Value::Int(decode::<_, i32>(row, index)?.into()),
        "INT8" => Value::Int(decode(row, index)?),
        "OID" => Value::Int(decode::<_, Oid>(row, index)?.0.into()),
        "FLOAT4" => Value::Float(decode::<_, f32>(row, index)?.into()),
        "FLOAT8" => Value::Float(decode(row, index)?),
        "NUMERIC" => Value::String(decode::<_, Decimal>(row, index)?.to_string()),
        "TEXT" | "VARCHAR" | "CHAR" | "NAME" => Value::String(decode(row, index)?),
        // The single-byte internal type.
        "\"CHAR\"" => Value::String(char::from(decode::<_, i8>(row, index)? as u8).to_string()),
        "BYTEA" => Value::Bytes(decode(row, index)?),
        "DATE" => Value::String(decode::<_, NaiveDate>(row, index)?.to_string()),
        "TIME" => Value::String(decode::<_, NaiveTime>(row, index)?.to_string()),
        "TIMETZ" => {
            let value: PgTimeTz<NaiveTime, FixedOffset> = decode(row, index)?;
            Value::String(format!("{}{}", value.time, value.offset))
        }
        "TIMESTAMP" => Value::String(decode::<_, NaiveDateTime>(row, index)?.to_string()),
        "TIMESTAMPTZ" => Value::String(decode::<_, DateTime<Utc>>(row, index)?.to_rfc3339()),
        "INTERVAL" => Value::String(format_interval(&decode(row, index)?)),
        "UUID" => Value::String(decode::<_, Uuid>(row, index)?.to_string()),
        "JSON" | "JSONB" => Value::String(decode::<_, JsonValue>(row, index)?.to_string()),
        "BOOL[]" => Value::String(format_array(decode::<_, Vec<Option<bool>>>(row, index)?)),
        "INT2[]" => Value::String(format_array(decode::<_, Vec<Option<i16>>>(row, index)?)),
        "INT4[]" => Value::String(format_array(decode::<_, Vec<Option<i32>>>(row, index)?)),
        "INT8[]" => Value::String(format_array(decode::<_, Vec<Option<i64>>>(row, index)?)),
        "FLOAT4[]" => Value::String(format_array(decode::<_, Vec<Option<f32>>>(row, index)?)),
        "FLOAT8[]" => Value::String(format_array(decode::<_, Vec<Option<f64>>>(row, index)?)),
        "NUMERIC[]" => Value::String(format_array(decode::<_, Vec<Option<Decimal>>>(row, index)?)),
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "NAME[]" => {
            Value::String(format_array(decode::<_, Vec<Option<String>>>(row, index)?))
        }
        _ => decode_fallback(row, index, type_name),
    };
    Ok(value)
}

/// Renders an interval the way PostgreSQL prints it, e.g. `1 year 2 mons 3 days 04:05:06`.
fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();
    let units = [
        (interval.months / 12, "year"),
        (interval.months % 12, "mon"),
        (interval.days, "day"),
    ];
    for (amount, unit) in units {
        if amount != 0 {
            let plural = if amount.abs() == 1 { "" } else { "s" };
            parts.push(format!("{amount} {unit}{plural}"));
        }
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let seconds = micros / 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        );
        let fraction = micros % 1_000_000;
        if fraction != 0 {
            clock.push_str(format!(".{fraction:06}").trim_end_matches('0'));
        }
        parts.push(clock);
    }

    parts.join(" ")
}

/// Renders an array in PostgreSQL's `{a,b,NULL}` notation.
fn format_array<T: Display>(items: Vec<Option<T>>) -> String {
    let items: Vec<String> = items
        .into_iter()
        .map(|item| match item {
            Some(value) => quote_array_element(value.to_string()),
            None => "NULL".to_string(),
        })
        .collect();
    format!("{{{}}}", items.join(","))
}

fn quote_array_element(text: String) -> String {
    let needs_quotes = text.is_empty()
        || text.eq_ignore_ascii_case("null")
        || text
            .chars()
            .any(|c| matches!(c, ',' | '{' | '}' | '"' | '\\') || c.is_whitespace());
    if needs_quotes {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        text
    }
}

/// Formats a query error, keeping PostgreSQL's detail and hint when present.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
