//! Database abstraction layer for dbpane.
//!
//! Provides a trait-based interface over the supported backends. A
//! [`Connector`] opens sessions for one [`BackendKind`]; the session it
//! returns is a [`DatabaseClient`], a single live connection that can run
//! statements and be closed.

mod decode;
mod mock;
mod mysql;
mod oracle;
mod postgres;
mod registry;
mod sqlite;
mod types;

pub use mock::{ClientCalls, MockConnector, MockDatabaseClient};
pub use mysql::MySqlConnector;
pub use self::oracle::{connect_descriptor, OracleConnector};
pub use postgres::PostgresConnector;
pub use registry::ConnectorRegistry;
pub use sqlite::SqliteConnector;
pub use types::{render_row, ColumnInfo, QueryResult, Row, RowSet, Value};

use crate::config::ConnectionConfig;
use crate::error::{DbError, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Mysql,
    Mariadb,
    Sqlite,
    Oracle,
    Postgresql,
}

impl BackendKind {
    /// Every backend, in the order they are offered to users.
    pub const ALL: [BackendKind; 5] = [
        BackendKind::Mysql,
        BackendKind::Mariadb,
        BackendKind::Sqlite,
        BackendKind::Oracle,
        BackendKind::Postgresql,
    ];

    /// Returns the canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Mariadb => "mariadb",
            Self::Sqlite => "sqlite",
            Self::Oracle => "oracle",
            Self::Postgresql => "postgresql",
        }
    }

    /// Display name for messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Mysql => "MySQL",
            Self::Mariadb => "MariaDB",
            Self::Sqlite => "SQLite",
            Self::Oracle => "Oracle",
            Self::Postgresql => "PostgreSQL",
        }
    }

    /// Returns the default port, or None for file-based backends.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Mysql | Self::Mariadb => Some(3306),
            Self::Postgresql => Some(5432),
            Self::Oracle => Some(1521),
            Self::Sqlite => None,
        }
    }

    /// Returns true if the backend is addressed by host and port.
    pub fn is_networked(&self) -> bool {
        self.default_port().is_some()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(Self::Mysql),
            "mariadb" => Ok(Self::Mariadb),
            "sqlite" => Ok(Self::Sqlite),
            "oracle" => Ok(Self::Oracle),
            "postgresql" | "postgres" => Ok(Self::Postgresql),
            _ => Err(DbError::unsupported(s)),
        }
    }
}

/// A live session with exactly one backend.
///
/// Methods take `&mut self`: a session is never used by two callers at once.
#[async_trait]
pub trait DatabaseClient: Send {
    /// The backend this session talks to.
    fn backend(&self) -> BackendKind;

    /// Runs a row-returning statement and materializes every row.
    async fn fetch_rows(&mut self, sql: &str, params: &[Value]) -> Result<RowSet>;

    /// Runs a statement inside a transaction and commits it.
    ///
    /// Returns the number of affected rows.
    async fn execute_and_commit(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Closes the session. Consumes the handle, so it cannot be closed twice.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens sessions for one backend kind.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The backend this connector serves.
    fn backend(&self) -> BackendKind;

    /// Opens a new session. A single attempt is made; failures are returned as-is.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>>;
}

/// Maps a driver error raised while opening a session to a user-facing message.
///
/// Recognizable causes get a short explanation; everything else keeps the
/// driver's own text.
pub(crate) fn describe_connect_failure(
    error: &dyn fmt::Display,
    backend: BackendKind,
    config: &ConnectionConfig,
) -> DbError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config
        .port
        .or_else(|| backend.default_port())
        .unwrap_or_default();
    let user = config.user.as_deref().unwrap_or("unknown");

    let message = error.to_string();
    let lower = message.to_lowercase();

    if lower.contains("connection refused") {
        DbError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the {} server is running. ({message})",
            backend.display_name()
        ))
    } else if lower.contains("password authentication failed")
        || lower.contains("access denied")
        || lower.contains("ora-01017")
    {
        DbError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials. ({message})"
        ))
    } else {
        DbError::connection(message)
    }
}
