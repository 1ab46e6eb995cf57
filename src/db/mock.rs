//! Mock connector and client for testing.
//!
//! Both share a [`ClientCalls`] handle so tests can assert which backend
//! primitives were invoked, and how often.

use super::{BackendKind, ColumnInfo, Connector, DatabaseClient, RowSet, Value};
use crate::config::ConnectionConfig;
use crate::error::{DbError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared counters of backend calls made through a mock.
#[derive(Debug, Clone, Default)]
pub struct ClientCalls {
    connects: Arc<AtomicUsize>,
    fetches: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl ClientCalls {
    /// Number of connect attempts, successful or not.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of read statements run.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of write statements run and committed.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of sessions closed.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Total number of backend calls of any kind.
    pub fn total(&self) -> usize {
        self.connects() + self.fetches() + self.commits() + self.closes()
    }
}

/// A connector that hands out [`MockDatabaseClient`]s.
pub struct MockConnector {
    backend: BackendKind,
    calls: ClientCalls,
    connect_error: Option<String>,
    close_error: Option<String>,
}

impl MockConnector {
    /// Creates a mock connector and the counters it reports to.
    pub fn new(backend: BackendKind) -> (Self, ClientCalls) {
        let calls = ClientCalls::default();
        let connector = Self {
            backend,
            calls: calls.clone(),
            connect_error: None,
            close_error: None,
        };
        (connector, calls)
    }

    /// Makes every connect attempt fail with the given message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    /// Makes every session this connector opens fail to close.
    pub fn failing_close(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.connect_error {
            return Err(DbError::connection(message.clone()));
        }
        Ok(Box::new(MockDatabaseClient {
            backend: self.backend,
            calls: self.calls.clone(),
            query_error: None,
            close_error: self.close_error.clone(),
        }))
    }
}

/// A mock session that returns predefined results.
///
/// Reads return one row: the bound parameters if any were given, otherwise
/// the SQL text. Writes report one affected row.
pub struct MockDatabaseClient {
    backend: BackendKind,
    calls: ClientCalls,
    query_error: Option<String>,
    close_error: Option<String>,
}

impl MockDatabaseClient {
    /// Creates a mock session and the counters it reports to.
    pub fn new(backend: BackendKind) -> (Self, ClientCalls) {
        let calls = ClientCalls::default();
        let client = Self {
            backend,
            calls: calls.clone(),
            query_error: None,
            close_error: None,
        };
        (client, calls)
    }

    /// Makes every statement fail with the given message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.query_error = Some(message.into());
        self
    }

    /// Makes closing the session fail with the given message.
    pub fn failing_close(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }

    fn check_failure(&self) -> Result<()> {
        match &self.query_error {
            Some(message) => Err(DbError::query(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    async fn fetch_rows(&mut self, sql: &str, params: &[Value]) -> Result<RowSet> {
        self.calls.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let (columns, row) = if params.is_empty() {
            (
                vec![ColumnInfo::new("result", "text")],
                vec![Value::String(format!("Mock result for: {sql}"))],
            )
        } else {
            let columns = (1..=params.len())
                .map(|i| ColumnInfo::new(format!("param{i}"), "any"))
                .collect();
            (columns, params.to_vec())
        };

        Ok(RowSet::with_data(columns, vec![row]).with_execution_time(Duration::from_millis(1)))
    }

    async fn execute_and_commit(&mut self, _sql: &str, _params: &[Value]) -> Result<u64> {
        self.calls.commits.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(1)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        match self.close_error {
            Some(message) => Err(DbError::connection(message)),
            None => Ok(()),
        }
    }
}
