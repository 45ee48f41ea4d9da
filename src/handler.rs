//! The capability contract the calling query layer programs against.
//!
//! A [`Handler`] owns a pool, hands out leased connections, brackets work in
//! transactions, and executes SQL either buffered ([`Handler::run`]) or
//! streamed ([`Handler::stream`]). The calling layer depends on this trait
//! only; [`DbHandler`](crate::db::DbHandler) is the sqlx-backed implementation.

use crate::error::DbResult;
use crate::models::{QueryParam, ResultSet, Row, Statement};
use futures_util::stream::BoxStream;
use std::borrow::Cow;
use std::future::Future;

/// Lazily pulled rows. Each item is decoded only when polled.
pub type RowStream<'c> = BoxStream<'c, DbResult<Row>>;

/// Where a statement runs.
#[derive(Debug, Default)]
pub enum Target<'c, C> {
    /// Borrow a connection from the pool for this one call.
    #[default]
    PoolDefault,
    /// Run on a connection the caller has leased.
    Leased(&'c mut C),
}

impl<'c, C> From<&'c mut C> for Target<'c, C> {
    fn from(conn: &'c mut C) -> Self {
        Target::Leased(conn)
    }
}

impl<'c, C> From<Option<&'c mut C>> for Target<'c, C> {
    fn from(conn: Option<&'c mut C>) -> Self {
        conn.map_or(Target::PoolDefault, Target::Leased)
    }
}

/// Database access adapter.
pub trait Handler: Send + Sync {
    /// An exclusive lease on one pooled connection.
    type Connection: Send;

    /// Prepare the handler for use.
    fn init(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Lease a connection, waiting while the pool is at its limit.
    fn get_connection(&self) -> impl Future<Output = DbResult<Self::Connection>> + Send;

    /// Open a transaction on a leased connection.
    fn init_transaction<'a>(
        &'a self,
        conn: &'a mut Self::Connection,
    ) -> impl Future<Output = DbResult<()>> + Send + 'a;

    fn commit<'a>(
        &'a self,
        conn: &'a mut Self::Connection,
    ) -> impl Future<Output = DbResult<()>> + Send + 'a;

    fn rollback<'a>(
        &'a self,
        conn: &'a mut Self::Connection,
    ) -> impl Future<Output = DbResult<()>> + Send + 'a;

    /// Give a leased connection back to the pool. Always reclaims it.
    fn close(&self, conn: Self::Connection) -> impl Future<Output = DbResult<()>> + Send;

    /// Execute one statement and buffer its whole response.
    fn run<'a>(
        &'a self,
        query: &'a str,
        args: &'a [QueryParam],
        target: Target<'a, Self::Connection>,
    ) -> impl Future<Output = DbResult<ResultSet>> + Send + 'a;

    /// Render `statement` and [`run`](Self::run) it.
    fn run_statement<'a, S>(
        &'a self,
        statement: &'a S,
        target: Target<'a, Self::Connection>,
    ) -> impl Future<Output = DbResult<ResultSet>> + Send + 'a
    where
        S: Statement + Sync + ?Sized,
    {
        async move {
            let prepared = statement.prepare_query();
            self.run(&prepared.text, &prepared.args, target).await
        }
    }

    /// Execute one statement and deliver its rows as they are pulled.
    ///
    /// Nothing is sent to the database until the stream is first polled.
    fn stream<'c>(
        &'c self,
        query: impl Into<Cow<'c, str>>,
        args: Vec<QueryParam>,
        target: Target<'c, Self::Connection>,
    ) -> RowStream<'c>;

    /// Render `statement` and [`stream`](Self::stream) it.
    fn stream_statement<'c, S>(
        &'c self,
        statement: &S,
        target: Target<'c, Self::Connection>,
    ) -> RowStream<'c>
    where
        S: Statement + ?Sized,
    {
        let prepared = statement.prepare_query();
        self.stream(prepared.text, prepared.args, target)
    }
}
