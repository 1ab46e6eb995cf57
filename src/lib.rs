//! dbpane - one connection manager for MySQL, MariaDB, SQLite, Oracle and PostgreSQL.
//!
//! This library exposes the core modules for use in the binary and in
//! integration tests.

pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod form;
pub mod logging;
pub mod output;
pub mod query;

pub use connection::ConnectionManager;
pub use error::{DbError, Result};
pub use form::ConnectionForm;
