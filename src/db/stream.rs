//! Lazy row streams over the native cursor.

use crate::db::connection::Connection;
use crate::db::params::{mysql_query, sqlite_query};
use crate::db::pool::{DbConnection, DbPool};
use crate::db::types::RowToJson;
use crate::error::DbError;
use crate::handler::{RowStream, Target};
use crate::models::{QueryParam, Row};
use async_stream::try_stream;
use futures_util::{Stream, TryStreamExt};
use std::borrow::Cow;
use tracing::debug;

/// Stream the rows of one statement.
///
/// The generator acquires its connection (for [`Target::PoolDefault`]) and sends
/// the statement on first poll, then decodes one row per poll. Dropping the
/// stream early hands a pool-borrowed connection back.
pub fn fetch_rows<'c>(
    pool: DbPool,
    target: Target<'c, Connection>,
    sql: Cow<'c, str>,
    params: Vec<QueryParam>,
) -> RowStream<'c> {
    Box::pin(row_stream(pool, target, sql, params))
}

fn row_stream<'c>(
    pool: DbPool,
    target: Target<'c, Connection>,
    sql: Cow<'c, str>,
    params: Vec<QueryParam>,
) -> impl Stream<Item = Result<Row, DbError>> + Send + 'c {
    try_stream! {
        let mut pooled = None;
        let conn: &mut DbConnection = match target {
            Target::PoolDefault => pooled.insert(pool.acquire().await?),
            Target::Leased(lease) => lease.raw()?,
        };

        debug!(sql = %sql, params = params.len(), "Streaming query");

        let mut rows_read: u64 = 0;
        match conn {
            DbConnection::MySql(c) => {
                let mut rows = mysql_query(&sql, &params).fetch(&mut **c);
                while let Some(row) = rows.try_next().await.map_err(|e| read_error(e, rows_read))? {
                    let row = row.to_json_map().map_err(|e| read_error(e, rows_read))?;
                    rows_read += 1;
                    yield row;
                }
            }
            DbConnection::SQLite(c) => {
                let mut rows = sqlite_query(&sql, &params).fetch(&mut **c);
                while let Some(row) = rows.try_next().await.map_err(|e| read_error(e, rows_read))? {
                    let row = row.to_json_map().map_err(|e| read_error(e, rows_read))?;
                    rows_read += 1;
                    yield row;
                }
            }
        }

        debug!(rows = rows_read, "Stream exhausted");
    }
}

/// A failure before the first row is an ordinary query or connection error.
fn read_error(err: sqlx::Error, rows_read: u64) -> DbError {
    let err = DbError::from(err);
    if rows_read == 0 {
        err
    } else {
        DbError::stream(err.to_string(), rows_read)
    }
}
