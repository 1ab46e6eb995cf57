//! Connector registry.
//!
//! Maps each backend kind to the connector that opens sessions for it.

use super::{
    BackendKind, Connector, MySqlConnector, OracleConnector, PostgresConnector, SqliteConnector,
};
use crate::error::{DbError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of available connectors, keyed by backend.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<BackendKind, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with a connector for every supported backend.
    pub fn with_default_connectors() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MySqlConnector::mysql()));
        registry.register(Arc::new(MySqlConnector::mariadb()));
        registry.register(Arc::new(SqliteConnector));
        registry.register(Arc::new(OracleConnector));
        registry.register(Arc::new(PostgresConnector));
        registry
    }

    /// Registers a connector, replacing any previous one for the same backend.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        let backend = connector.backend();
        self.connectors.insert(backend, connector);
        debug!("Registered connector for {backend}");
    }

    /// Returns the connector for a backend.
    pub fn get(&self, backend: BackendKind) -> Result<Arc<dyn Connector>> {
        self.connectors
            .get(&backend)
            .cloned()
            .ok_or_else(|| DbError::unsupported(backend.as_str()))
    }

    /// Check if a connector is registered for a given backend.
    pub fn has_connector(&self, backend: BackendKind) -> bool {
        self.connectors.contains_key(&backend)
    }

    /// Returns the registered backends in their canonical order.
    pub fn supported_backends(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| self.has_connector(*kind))
            .collect()
    }
}
