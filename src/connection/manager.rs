//! Connection manager for database lifecycle and switching.

use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::db::{BackendKind, ConnectorRegistry, DatabaseClient, QueryResult, Value};
use crate::error::{DbError, Result};
use crate::form::ConnectionForm;
use crate::query::QueryExecutor;

/// An active database connection with its metadata.
pub struct ActiveConnection {
    /// Backend the session belongs to.
    pub backend: BackendKind,
    /// Display-safe description of the target.
    pub display: String,
    /// Database client.
    pub client: Box<dyn DatabaseClient>,
}

/// Owns at most one live session and routes statements to it.
pub struct ConnectionManager {
    registry: ConnectorRegistry,
    active: Option<ActiveConnection>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Creates a connection manager with a connector for every backend.
    pub fn new() -> Self {
        Self::with_registry(ConnectorRegistry::with_default_connectors())
    }

    /// Creates a connection manager that dispatches through the given registry.
    pub fn with_registry(registry: ConnectorRegistry) -> Self {
        Self {
            registry,
            active: None,
        }
    }

    /// Connects to a database and installs the session.
    ///
    /// Parameters are validated before any connector runs. On success the
    /// previous session, if any, is closed and replaced, and the new session
    /// is returned. On failure the previous session stays installed.
    pub async fn connect(
        &mut self,
        backend: BackendKind,
        config: &ConnectionConfig,
    ) -> Result<&mut dyn DatabaseClient> {
        config.validate_for(backend)?;
        let connector = self.registry.get(backend)?;
        let target = config.display_string();

        debug!("Dispatching connect for {backend} to {target}");
        let client = connector.connect(config).await?;

        if let Some(old) = self.active.take() {
            debug!("Closing previous {} connection", old.backend);
            if let Err(e) = old.client.close().await {
                warn!("Failed to close previous connection to {}: {e}", old.display);
            }
        }

        info!("Connected to {} ({target})", backend.display_name());
        let active = self.active.insert(ActiveConnection {
            backend,
            display: target,
            client,
        });

        Ok(active.client.as_mut())
    }

    /// Parses a connection form and connects with the result.
    pub async fn connect_form(&mut self, form: &ConnectionForm) -> Result<&mut dyn DatabaseClient> {
        let (backend, config) = form.parse()?;
        self.connect(backend, &config).await
    }

    /// Executes a statement on the active session.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let active = self.active.as_mut().ok_or(DbError::NotConnected)?;
        QueryExecutor::new(active.client.as_mut())
            .execute(sql, params)
            .await
    }

    /// Check if there's an active connection.
    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    /// Backend of the active connection.
    pub fn backend(&self) -> Option<BackendKind> {
        self.active.as_ref().map(|c| c.backend)
    }

    /// Display-safe description of the active connection.
    pub fn display_string(&self) -> Option<&str> {
        self.active.as_ref().map(|c| c.display.as_str())
    }

    /// Close the active connection. Does nothing when none is open.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.active.take() {
            info!("Closing {} connection ({})", conn.backend, conn.display);
            conn.client.close().await?;
        }
        Ok(())
    }
}
