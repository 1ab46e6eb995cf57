//! Connection management for dbpane.
//!
//! Centralizes connection lifecycle and switching.

pub mod manager;

pub use manager::{ActiveConnection, ConnectionManager};
