//! Data models for the dblink handler.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType, TransactionState};
pub use query::{PreparedQuery, QueryParam, ResultSet, Row, Statement};
