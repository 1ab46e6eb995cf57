//! Row decoding shared by the sqlx-backed connectors.

use super::{ColumnInfo, Row, Value};
use crate::error::{DbError, Result};
use sqlx::{Column, ColumnIndex, Decode, Type, TypeInfo, ValueRef};

/// Builds column metadata from sqlx columns.
pub(crate) fn column_info<C: Column>(columns: &[C]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// Converts every column of a row using a backend-specific value decoder.
///
/// The decoder receives the row, the column index and the type name of the
/// value; NULLs never reach it.
pub(crate) fn convert_row<R>(
    row: &R,
    decode_value: fn(&R, usize, &str) -> Result<Value>,
) -> Result<Row>
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
{
    let mut values = Vec::with_capacity(row.len());
    for index in 0..row.len() {
        let raw = row
            .try_get_raw(index)
            .map_err(|e| DbError::query(e.to_string()))?;
        if raw.is_null() {
            values.push(Value::Null);
            continue;
        }
        let type_name = raw.type_info().name().to_uppercase();
        values.push(decode_value(row, index, &type_name)?);
    }
    Ok(values)
}

/// Decodes one column as `T`, mapping failures to a query error.
pub(crate) fn decode<'r, R, T>(row: &'r R, index: usize) -> Result<T>
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<T, _>(index)
        .map_err(|e| DbError::query(format!("Failed to decode column {index}: {e}")))
}

/// Best-effort decoding for types without a dedicated mapping.
///
/// Tries text, then raw bytes; a value that is neither is shown as its type name.
pub(crate) fn decode_fallback<'r, R>(row: &'r R, index: usize, type_name: &str) -> Value
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
    if let Ok(text) = row.try_get::<String, _>(index) {
        return Value::String(text);
    }
    if let Ok(bytes) = row.try_get::<Vec<u8>, _>(index) {
        return Value::Bytes(bytes);
    }
    Value::String(format!("<{type_name}>"))
}
