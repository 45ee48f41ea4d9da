//! sqlx-backed [`Handler`] implementation.

use crate::db::connection::Connection;
use crate::db::executor;
use crate::db::pool::{DbPool, PoolStatus};
use crate::db::response::normalize;
use crate::db::stream;
use crate::error::DbResult;
use crate::handler::{Handler, RowStream, Target};
use crate::models::{ConnectionConfig, QueryParam, ResultSet};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info};

/// Database handler owning one bounded connection pool.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct DbHandler {
    config: Arc<ConnectionConfig>,
    pool: DbPool,
}

impl DbHandler {
    /// Create a handler for the given configuration.
    ///
    /// No connection is opened here; the first acquisition opens one. Must be
    /// called from within a Tokio runtime.
    pub fn new(config: ConnectionConfig) -> DbResult<Self> {
        let pool = DbPool::connect_lazy(&config)?;
        Ok(Self {
            config: Arc::new(config),
            pool,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Current pool size, idle count and limit.
    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Close the pool. Waits for leased connections to come back.
    pub async fn shutdown(&self) {
        self.pool.close().await;
        info!(target_db = %self.config.display_target(), "Connection pool closed");
    }
}

impl Handler for DbHandler {
    type Connection = Connection;

    async fn init(&self) -> DbResult<()> {
        if !self.config.pool_options.verify_on_init {
            return Ok(());
        }
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        debug!(target_db = %self.config.display_target(), "Connection verified");
        Ok(())
    }

    async fn get_connection(&self) -> DbResult<Connection> {
        Ok(Connection::new(self.pool.acquire().await?))
    }

    async fn init_transaction<'a>(&'a self, conn: &'a mut Connection) -> DbResult<()> {
        conn.begin().await
    }

    async fn commit<'a>(&'a self, conn: &'a mut Connection) -> DbResult<()> {
        conn.commit().await
    }

    async fn rollback<'a>(&'a self, conn: &'a mut Connection) -> DbResult<()> {
        conn.rollback().await
    }

    async fn close(&self, conn: Connection) -> DbResult<()> {
        conn.release().await
    }

    async fn run<'a>(
        &'a self,
        query: &'a str,
        args: &'a [QueryParam],
        target: Target<'a, Connection>,
    ) -> DbResult<ResultSet> {
        let response = match target {
            Target::PoolDefault => {
                let mut conn = self.pool.acquire().await?;
                executor::execute(&mut conn, query, args).await?
            }
            Target::Leased(conn) => executor::execute(conn.raw()?, query, args).await?,
        };
        Ok(normalize(response))
    }

    fn stream<'c>(
        &'c self,
        query: impl Into<Cow<'c, str>>,
        args: Vec<QueryParam>,
        target: Target<'c, Connection>,
    ) -> RowStream<'c> {
        stream::fetch_rows(self.pool.clone(), target, query.into(), args)
    }
}
