//! Error types for dbpane.
//!
//! Defines the error enum shared by the connection manager, the connectors
//! and the query executor.

use thiserror::Error;

/// Main error type for dbpane operations.
#[derive(Error, Debug)]
pub enum DbError {
    /// The backend name is unknown, or no connector is registered for it.
    #[error("Unsupported database type: {0}")]
    UnsupportedBackend(String),

    /// Malformed or missing connection parameters (non-numeric port, no host, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend rejected or could not establish the session.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed the statement (syntax, constraints, lost connection).
    #[error("Query error: {0}")]
    Query(String),

    /// A statement was submitted while no connection is open.
    #[error("Not connected to any database")]
    NotConnected,

    /// Internal failures (a blocking task panicked, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates an unsupported-backend error for the given backend name.
    pub fn unsupported(backend: impl Into<String>) -> Self {
        Self::UnsupportedBackend(backend.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnsupportedBackend(_) => "Unsupported Backend",
            Self::Config(_) => "Configuration Error",
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::NotConnected => "Connection Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using DbError.
pub type Result<T> = std::result::Result<T, DbError>;
