//! Connection pool management.
//!
//! This module builds the bounded pool a handler owns, using database-specific
//! sqlx pools (MySqlPool, SqlitePool) to keep full type support.
//!
//! The pool is created lazily: no physical connection exists until the first
//! acquisition, and acquiring beyond `connection_limit` queues until a lease is
//! released or the acquire timeout fires.

use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, DatabaseType};
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::{
    MySql, MySqlPool, Sqlite, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions,
};
use tracing::{debug, info};

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    SQLite(SqlitePool),
}

/// A physical connection checked out of a [`DbPool`].
///
/// Dropping it hands the connection back to the pool.
#[derive(Debug)]
pub enum DbConnection {
    MySql(PoolConnection<MySql>),
    SQLite(PoolConnection<Sqlite>),
}

/// Point-in-time view of the pool's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Live physical connections, leased or idle
    pub size: u32,
    /// Connections waiting in the free set
    pub idle: usize,
    pub connection_limit: u32,
}

impl DbPool {
    /// Build the pool for a validated configuration without opening any connection.
    ///
    /// Must be called from within a Tokio runtime; sqlx spawns its idle reaper here.
    pub fn connect_lazy(config: &ConnectionConfig) -> DbResult<Self> {
        config
            .validate()
            .map_err(|e| DbError::invalid_config(e.to_string()))?;

        let opts = &config.pool_options;
        let acquire_timeout = opts.acquire_timeout_or_default();
        let idle_timeout = Some(opts.idle_timeout_or_default());

        let pool = match config.db_type {
            DatabaseType::MySQL => {
                let options = MySqlConnectOptions::new()
                    .host(&config.host)
                    .port(config.port)
                    .username(&config.username)
                    .password(&config.password)
                    .database(&config.database)
                    .charset("utf8mb4");

                let pool = MySqlPoolOptions::new()
                    .min_connections(0)
                    .max_connections(config.connection_limit)
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .test_before_acquire(opts.test_before_acquire_or_default())
                    .connect_lazy_with(options);
                DbPool::MySql(pool)
            }
            DatabaseType::SQLite => {
                let options = SqliteConnectOptions::new()
                    .filename(&config.database)
                    .create_if_missing(true);

                let pool = SqlitePoolOptions::new()
                    .min_connections(0)
                    .max_connections(config.connection_limit)
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .test_before_acquire(opts.test_before_acquire_or_default())
                    .connect_lazy_with(options);
                DbPool::SQLite(pool)
            }
        };

        info!(
            target_db = %config.display_target(),
            connection_limit = config.connection_limit,
            acquire_timeout_secs = acquire_timeout.as_secs(),
            "Created connection pool"
        );

        Ok(pool)
    }

    /// Check out a connection, suspending while the pool is at its limit.
    pub async fn acquire(&self) -> DbResult<DbConnection> {
        let conn = impl_db_dispatch!(DbPool, self, {
            MySql(p) => DbConnection::MySql(p.acquire().await.map_err(acquire_error)?),
            SQLite(p) => DbConnection::SQLite(p.acquire().await.map_err(acquire_error)?),
        });
        debug!(size = self.size(), idle = self.num_idle(), "Connection acquired");
        Ok(conn)
    }

    /// Close the connection pool. Pending and later acquisitions fail.
    pub async fn close(&self) {
        impl_db_dispatch!(DbPool, self, {
            MySql(p) => p.close().await,
            SQLite(p) => p.close().await,
        });
    }

    /// Check whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        impl_db_dispatch!(DbPool, self, {
            MySql(p) => p.is_closed(),
            SQLite(p) => p.is_closed(),
        })
    }

    /// Live physical connections, leased or idle.
    pub fn size(&self) -> u32 {
        impl_db_dispatch!(DbPool, self, {
            MySql(p) => p.size(),
            SQLite(p) => p.size(),
        })
    }

    /// Connections currently in the free set.
    pub fn num_idle(&self) -> usize {
        impl_db_dispatch!(DbPool, self, {
            MySql(p) => p.num_idle(),
            SQLite(p) => p.num_idle(),
        })
    }

    /// Upper bound on live connections.
    pub fn connection_limit(&self) -> u32 {
        impl_db_dispatch!(DbPool, self, {
            MySql(p) => p.options().get_max_connections(),
            SQLite(p) => p.options().get_max_connections(),
        })
    }

    /// Snapshot of size, idle count and limit.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.size(),
            idle: self.num_idle(),
            connection_limit: self.connection_limit(),
        }
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySQL,
            DbPool::SQLite(_) => DatabaseType::SQLite,
        }
    }
}

/// Every failure to check out a connection is a connection error, including a
/// server or file refusing it (bad credentials, unreadable path).
fn acquire_error(err: sqlx::Error) -> DbError {
    match DbError::from(err) {
        err @ DbError::Connection { .. } => err,
        DbError::Query { message, .. } => DbError::connection(
            format!("Failed to open connection: {}", message),
            "Check the host, credentials and database path",
        ),
        other => DbError::connection(
            format!("Failed to open connection: {}", other),
            "Check the host, credentials and database path",
        ),
    }
}

impl DbConnection {
    /// Get the database type of this connection.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbConnection::MySql(_) => DatabaseType::MySQL,
            DbConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Round-trip to the server to check the connection is usable.
    pub async fn ping(&mut self) -> DbResult<()> {
        use sqlx::Connection as _;

        impl_db_dispatch!(DbConnection, self, {
            MySql(c) => c.ping().await?,
            SQLite(c) => c.ping().await?,
        });
        Ok(())
    }

    /// Send a statement over the text protocol, without arguments or result rows.
    pub(crate) async fn execute_raw(&mut self, sql: &'static str) -> Result<(), sqlx::Error> {
        use sqlx::Executor as _;

        impl_db_dispatch!(DbConnection, self, {
            MySql(c) => (&mut **c).execute(sql).await.map(|_| ()),
            SQLite(c) => (&mut **c).execute(sql).await.map(|_| ()),
        })
    }

    /// Take the connection out of the pool and close it, so the pool can open a
    /// replacement. Used when a connection's session state cannot be trusted.
    pub async fn discard(self) {
        use sqlx::Connection as _;

        let result = impl_db_dispatch!(DbConnection, self, {
            MySql(c) => c.detach().close().await,
            SQLite(c) => c.detach().close().await,
        });
        if let Err(e) = result {
            debug!(error = %e, "Error closing discarded connection");
        }
    }

    /// Detach without a graceful close. For use from `Drop`, where nothing can await.
    pub fn detach(self) {
        impl_db_dispatch!(DbConnection, self, {
            MySql(c) => drop(c.detach()),
            SQLite(c) => drop(c.detach()),
        });
    }
}
