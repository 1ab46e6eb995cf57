//! Statement execution with read/write classification.
//!
//! Reads return every row fully materialized. Writes run in their own
//! transaction and are committed before the acknowledgment is returned.

use std::time::Instant;

use tracing::debug;

use crate::db::{DatabaseClient, QueryResult, Value};
use crate::error::Result;

/// Whether a statement reads rows or changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

/// Classifies a statement by its leading keyword.
///
/// Only statements starting with `SELECT` are reads. Everything else,
/// including `WITH ... SELECT` and `SHOW`, takes the write path and is
/// committed.
pub fn classify(sql: &str) -> StatementKind {
    if sql.trim().to_lowercase().starts_with("select") {
        StatementKind::Read
    } else {
        StatementKind::Write
    }
}

/// Runs statements against one open session.
pub struct QueryExecutor<'a> {
    client: &'a mut dyn DatabaseClient,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new query executor over a session.
    pub fn new(client: &'a mut dyn DatabaseClient) -> Self {
        Self { client }
    }

    /// Classifies and executes a statement with bound parameters.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let kind = classify(sql);
        debug!(
            backend = %self.client.backend(),
            ?kind,
            params = params.len(),
            "Executing statement"
        );

        match kind {
            StatementKind::Read => {
                let rows = self.client.fetch_rows(sql, params).await?;
                Ok(QueryResult::Rows(rows))
            }
            StatementKind::Write => {
                let start = Instant::now();
                let rows_affected = self.client.execute_and_commit(sql, params).await?;
                Ok(QueryResult::Acknowledged {
                    rows_affected,
                    execution_time: start.elapsed(),
                })
            }
        }
    }
}
