//! Connection form.
//!
//! Holds connection parameters exactly as a user typed them and turns them
//! into a typed [`ConnectionConfig`] for a backend.

use crate::config::{parse_port, ConnectionConfig};
use crate::db::BackendKind;
use crate::error::Result;
use std::str::FromStr;

/// Raw text entries for a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionForm {
    pub backend: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub service_name: String,
}

impl ConnectionForm {
    /// Creates an empty form for a backend name.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Default::default()
        }
    }

    /// Parses the form into a backend and validated connection parameters.
    ///
    /// Every parameter the backend needs must be filled in, port and
    /// password included. SQLite only reads the database path.
    pub fn parse(&self) -> Result<(BackendKind, ConnectionConfig)> {
        let (backend, config) = self.parse_entries()?;
        config.validate_for(backend)?;
        Ok((backend, config))
    }

    /// Parses the filled-in entries without checking for missing ones.
    ///
    /// Blank entries are treated as absent. Port text that is present must
    /// still be a valid port.
    pub fn parse_entries(&self) -> Result<(BackendKind, ConnectionConfig)> {
        let backend = BackendKind::from_str(self.backend.trim())?;

        let config = match backend {
            BackendKind::Sqlite => ConnectionConfig {
                database: entry(&self.database),
                ..Default::default()
            },
            BackendKind::Mysql | BackendKind::Mariadb | BackendKind::Postgresql => {
                ConnectionConfig {
                    host: entry(&self.host),
                    port: parse_port(&self.port)?,
                    database: entry(&self.database),
                    user: entry(&self.user),
                    password: password_entry(&self.password),
                    service_name: None,
                }
            }
            BackendKind::Oracle => ConnectionConfig {
                host: entry(&self.host),
                port: parse_port(&self.port)?,
                database: None,
                user: entry(&self.user),
                password: password_entry(&self.password),
                service_name: entry(&self.service_name),
            },
        };

        Ok((backend, config))
    }
}

fn entry(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

// Passwords are taken verbatim; surrounding whitespace may be significant.
fn password_entry(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}
