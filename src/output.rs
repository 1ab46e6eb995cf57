//! Output rendering for query results.

use crate::db::QueryResult;
use crate::error::{DbError, Result};
use clap::ValueEnum;

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One `(v1, v2)` line per row.
    #[default]
    Text,
    /// A single JSON document per statement.
    Json,
}

/// Renders a result in the given format.
pub fn render(result: &QueryResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(result)),
        OutputFormat::Json => render_json(result),
    }
}

/// Renders a result as text lines.
pub fn render_text(result: &QueryResult) -> String {
    match result {
        QueryResult::Rows(rows) => rows.render_lines().join("\n"),
        QueryResult::Acknowledged { rows_affected, .. } => {
            format!("OK, {rows_affected} row(s) affected")
        }
    }
}

/// Renders a result as a JSON document.
pub fn render_json(result: &QueryResult) -> Result<String> {
    serde_json::to_string(result)
        .map_err(|e| DbError::internal(format!("Failed to serialize result: {e}")))
}

/// Line printed after a successful connect.
pub fn connected_message(backend: &str, target: &str) -> String {
    format!("Connected to {backend} ({target})")
}
