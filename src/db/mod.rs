//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Database dispatch macros for reducing code duplication
//! - Connection pool management
//! - Leased connections with transaction state
//! - Query execution and result normalization
//! - Row streaming
//! - Type mappings

#[macro_use]
pub mod macros;
pub mod adapter;
pub mod connection;
pub mod executor;
pub(crate) mod params;
pub mod pool;
pub mod response;
pub mod stream;
pub mod types;

pub use adapter::DbHandler;
pub use connection::Connection;
pub use pool::{DbConnection, DbPool, PoolStatus};
pub use response::{NativeResponse, normalize};
