//! Query execution and classification for dbpane.

pub mod executor;

pub use executor::{classify, QueryExecutor, StatementKind};
