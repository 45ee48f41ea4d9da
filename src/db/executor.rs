//! Query execution engine.
//!
//! Runs one parameterized statement on one connection and resolves the driver's
//! answer into a [`NativeResponse`] before anything else looks at it.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific statement execution
//! - `sqlite`: SQLite-specific statement execution
//!
//! Each statement is first prepared (the driver caches the prepared handle) so
//! the executor knows whether it describes result columns. Row-returning
//! statements are fetched, everything else is executed for its acknowledgment.
//! Either way the statement runs exactly once.

use crate::db::pool::DbConnection;
use crate::db::response::NativeResponse;
use crate::db::types::RowToJson;
use crate::error::DbResult;
use crate::models::QueryParam;
use tracing::debug;

/// Execute a statement on a checked-out connection.
pub async fn execute(
    conn: &mut DbConnection,
    sql: &str,
    params: &[QueryParam],
) -> DbResult<NativeResponse> {
    debug!(sql = %sql, params = params.len(), "Executing query");

    let response = impl_db_dispatch!(DbConnection, conn, {
        MySql(c) => mysql::execute(c, sql, params).await?,
        SQLite(c) => sqlite::execute(c, sql, params).await?,
    });

    debug!(response = response_kind(&response), "Query completed");
    Ok(response)
}

fn response_kind(response: &NativeResponse) -> &'static str {
    match response {
        NativeResponse::Rows(_) => "rows",
        NativeResponse::InsertAck { .. } => "insert_ack",
        NativeResponse::UpdateAck { .. } => "update_ack",
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod mysql {
    use super::*;
    use crate::db::params::mysql_query;
    use futures_util::TryStreamExt;
    use sqlx::mysql::{MySqlConnection, MySqlDatabaseError};
    use sqlx::{Either, Executor, Statement as _};

    /// Server error 1295: the statement is not supported by the prepared protocol.
    const ER_UNSUPPORTED_PS: u16 = 1295;

    pub async fn execute(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<NativeResponse> {
        let returns_rows = match (&mut *conn).prepare(sql).await {
            Ok(statement) => !statement.columns().is_empty(),
            Err(e) if params.is_empty() && is_unsupported_prepare(&e) => {
                return execute_text(conn, sql).await;
            }
            Err(e) => return Err(e.into()),
        };

        if returns_rows {
            let rows = mysql_query(sql, params).fetch_all(&mut *conn).await?;
            Ok(NativeResponse::Rows(
                rows.iter()
                    .map(RowToJson::to_json_map)
                    .collect::<Result<_, _>>()?,
            ))
        } else {
            let result = mysql_query(sql, params).execute(&mut *conn).await?;
            Ok(NativeResponse::ack(
                result.last_insert_id(),
                result.rows_affected(),
            ))
        }
    }

    /// Run a statement over the text protocol (some SQL like CREATE PROCEDURE
    /// cannot be prepared). Any row in the response makes it a row response.
    async fn execute_text(conn: &mut MySqlConnection, sql: &str) -> DbResult<NativeResponse> {
        let mut results = (&mut *conn).fetch_many(sql);
        let mut rows = Vec::new();
        let mut last_ack = None;
        while let Some(step) = results.try_next().await? {
            match step {
                Either::Left(done) => last_ack = Some(done),
                Either::Right(row) => rows.push(row.to_json_map()?),
            }
        }

        if !rows.is_empty() {
            return Ok(NativeResponse::Rows(rows));
        }
        Ok(last_ack
            .map(|done| NativeResponse::ack(done.last_insert_id(), done.rows_affected()))
            .unwrap_or(NativeResponse::UpdateAck { affected_rows: 0 }))
    }

    fn is_unsupported_prepare(err: &sqlx::Error) -> bool {
        err.as_database_error()
            .and_then(|e| e.try_downcast_ref::<MySqlDatabaseError>())
            .is_some_and(|e| e.number() == ER_UNSUPPORTED_PS)
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::sqlite_query;
    use sqlx::sqlite::SqliteConnection;
    use sqlx::{Executor, Statement as _};

    pub async fn execute(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<NativeResponse> {
        let returns_rows = !(&mut *conn).prepare(sql).await?.columns().is_empty();

        if returns_rows {
            let rows = sqlite_query(sql, params).fetch_all(&mut *conn).await?;
            Ok(NativeResponse::Rows(
                rows.iter()
                    .map(RowToJson::to_json_map)
                    .collect::<Result<_, _>>()?,
            ))
        } else {
            let result = sqlite_query(sql, params).execute(&mut *conn).await?;
            // last_insert_rowid() is per connection and survives later statements
            let insert_id = if reports_insert_id(sql) {
                u64::try_from(result.last_insert_rowid()).unwrap_or(0)
            } else {
                0
            };
            Ok(NativeResponse::ack(insert_id, result.rows_affected()))
        }
    }

    pub(super) fn reports_insert_id(sql: &str) -> bool {
        let head = sql.trim_start();
        ["INSERT", "REPLACE"].iter().any(|keyword| {
            head.get(..keyword.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(keyword))
        })
    }
}
