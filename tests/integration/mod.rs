//! Integration tests for dbpane.

pub mod connection_test;
pub mod query_test;
