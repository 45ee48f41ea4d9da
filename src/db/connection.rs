//! Leased connections and their transaction state.
//!
//! A [`Connection`] is an exclusive lease on one pooled connection. Each lease
//! tracks whether an explicit transaction is open, and the lease never hands a
//! connection back to the pool with that transaction still open.

use crate::db::pool::DbConnection;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, TransactionState};
use tracing::{debug, warn};
use uuid::Uuid;

/// An exclusive lease on one pooled connection.
///
/// Give it back with [`release`](Self::release). Dropping a lease in autocommit
/// mode returns the connection too; dropping it with an open transaction detaches
/// the connection from the pool instead, and the server discards the transaction
/// when the socket closes.
#[derive(Debug)]
pub struct Connection {
    id: String,
    /// `None` only while the lease is being released
    inner: Option<DbConnection>,
    state: TransactionState,
}

impl Connection {
    pub(crate) fn new(inner: DbConnection) -> Self {
        let id = Uuid::new_v4().to_string();
        debug!(connection_id = %id, db_type = %inner.db_type(), "Connection leased");
        Self {
            id,
            inner: Some(inner),
            state: TransactionState::Autocommit,
        }
    }

    /// Lease identifier used in logs and errors.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn db_type(&self) -> Option<DatabaseType> {
        self.inner.as_ref().map(DbConnection::db_type)
    }

    /// Borrow the underlying pooled connection.
    pub(crate) fn raw(&mut self) -> DbResult<&mut DbConnection> {
        self.inner.as_mut().ok_or_else(|| {
            DbError::connection(
                format!("Connection {} was already released", self.id),
                "Acquire a new connection",
            )
        })
    }

    /// Open an explicit transaction.
    pub async fn begin(&mut self) -> DbResult<()> {
        if self.state.is_active() {
            return Err(DbError::transaction(
                "Transaction already in progress; nested transactions are not supported",
                &self.id,
            ));
        }
        self.send_transaction_verb("BEGIN").await?;
        self.state = TransactionState::InTransaction;
        Ok(())
    }

    /// Commit the open transaction.
    ///
    /// If the driver reports a failure the lease stays in the transaction.
    pub async fn commit(&mut self) -> DbResult<()> {
        self.end_transaction("COMMIT").await
    }

    /// Roll back the open transaction.
    pub async fn rollback(&mut self) -> DbResult<()> {
        self.end_transaction("ROLLBACK").await
    }

    /// Round-trip to the server.
    pub async fn ping(&mut self) -> DbResult<()> {
        self.raw()?.ping().await
    }

    /// Return the connection to the pool.
    ///
    /// The connection is always reclaimed. Releasing a lease with an open
    /// transaction is a caller error: the transaction is rolled back (or the
    /// connection discarded if that fails) and a `Transaction` error is returned.
    pub async fn release(mut self) -> DbResult<()> {
        let Some(mut inner) = self.inner.take() else {
            return Ok(());
        };

        if !self.state.is_active() {
            debug!(connection_id = %self.id, "Connection released");
            return Ok(());
        }

        warn!(
            connection_id = %self.id,
            "Connection released with an open transaction; rolling back"
        );
        self.state = TransactionState::Autocommit;
        if let Err(e) = inner.execute_raw("ROLLBACK").await {
            warn!(
                connection_id = %self.id,
                error = %e,
                "Rollback on release failed; discarding connection"
            );
            inner.discard().await;
        }

        Err(DbError::transaction(
            "Connection released with an open transaction; the transaction was rolled back",
            &self.id,
        ))
    }

    async fn end_transaction(&mut self, verb: &'static str) -> DbResult<()> {
        if !self.state.is_active() {
            return Err(DbError::transaction(
                format!("{} issued without an open transaction", verb),
                &self.id,
            ));
        }
        self.send_transaction_verb(verb).await?;
        self.state = TransactionState::Autocommit;
        Ok(())
    }

    async fn send_transaction_verb(&mut self, verb: &'static str) -> DbResult<()> {
        debug!(connection_id = %self.id, verb, "Transaction statement");
        let id = self.id.clone();
        self.raw()?
            .execute_raw(verb)
            .await
            .map_err(|e| DbError::transaction_failed(verb, e, id))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        if self.state.is_active() {
            warn!(
                connection_id = %self.id,
                "Connection dropped with an open transaction; detaching from pool"
            );
            inner.detach();
        }
    }
}
