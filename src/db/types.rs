//! Query result types for dbpane.
//!
//! Defines the backend-neutral structures every connector produces.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Outcome of executing one statement.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QueryResult {
    /// A read statement: every row, fully materialized.
    Rows(RowSet),

    /// A write statement that was committed.
    Acknowledged {
        /// Rows affected as reported by the backend.
        rows_affected: u64,

        /// Time taken to execute and commit the statement.
        #[serde(rename = "execution_time_ms", with = "duration_ms")]
        execution_time: Duration,
    },
}

impl QueryResult {
    /// Returns the row set if this is a read result.
    pub fn rows(&self) -> Option<&RowSet> {
        match self {
            Self::Rows(set) => Some(set),
            Self::Acknowledged { .. } => None,
        }
    }

    /// Returns true if this is a write acknowledgment.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged { .. })
    }
}

/// Rows returned by a read statement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RowSet {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data, in backend order.
    pub rows: Vec<Row>,

    /// Number of rows in the result.
    pub row_count: usize,

    /// Time taken to execute the query.
    #[serde(rename = "execution_time_ms", with = "duration_ms")]
    pub execution_time: Duration,
}

impl RowSet {
    /// Creates a row set with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time: Duration::ZERO,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders each row as a `(v1, v2, ...)` line.
    pub fn render_lines(&self) -> Vec<String> {
        self.rows.iter().map(|row| render_row(row)).collect()
    }
}

/// Renders a single row as a parenthesised, comma-separated line.
pub fn render_row(row: &[Value]) -> String {
    let cells: Vec<String> = row.iter().map(Value::to_display_string).collect();
    format!("({})", cells.join(", "))
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Backend type name (e.g. `INT8`, `VARCHAR`, `NUMBER`).
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// A single value read from, or bound to, a statement.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Unsigned integer that does not fit in i64 semantics (MySQL UNSIGNED columns).
    UInt(u64),

    /// Floating point number.
    Float(f64),

    /// Text, and anything rendered to text (decimals, dates, uuids, json).
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value to its display representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }

    /// Parses a command-line literal into a bind value.
    ///
    /// `null`, `true` and `false` (any case) map to their typed values,
    /// integers and decimal numbers to `Int`/`Float`; everything else is text.
    pub fn parse_literal(text: &str) -> Self {
        match text.to_lowercase().as_str() {
            "null" => return Value::Null,
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(i) = text.parse::<i64>() {
            return Value::Int(i);
        }
        // `f64::from_str` accepts "inf" and "NaN"; those stay text.
        if text.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(f) = text.parse::<f64>() {
                return Value::Float(f);
            }
        }
        Value::String(text.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// Serializes a Duration as whole milliseconds.
mod duration_ms {
    use serde::{Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }
}
