//! dblink: a pooled, async SQL handler on top of sqlx.
//!
//! This library exposes a uniform [`Handler`] contract for executing SQL against a
//! bounded connection pool (MySQL/MariaDB, or an SQLite file), with explicit
//! transactions on leased connections, buffered results normalized into one
//! [`ResultSet`](models::ResultSet) shape, and lazy row streams.

pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod models;

pub use config::Config;
pub use db::{Connection, DbHandler};
pub use error::{DbError, DbResult};
pub use handler::{Handler, RowStream, Target};
