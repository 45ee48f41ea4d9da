//! Integration tests for buffered execution, transactions and pool bounds.

use dblink_sqlx::db::DbHandler;
use dblink_sqlx::handler::{Handler, Target};
use dblink_sqlx::models::{ConnectionConfig, PreparedQuery, QueryParam, TransactionState};
use dblink_sqlx::{Connection, DbError};
use serde_json::json;
use std::time::Duration;
use tempfile::NamedTempFile;

fn sqlite_handler(limit: u32) -> (NamedTempFile, DbHandler) {
    let temp_file = NamedTempFile::new().unwrap();
    let config = ConnectionConfig::sqlite(temp_file.path().to_str().unwrap(), limit);
    let handler = DbHandler::new(config).unwrap();
    (temp_file, handler)
}

async fn create_table(handler: &DbHandler) {
    handler
        .run(
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v INTEGER NOT NULL)",
            &[],
            Target::PoolDefault,
        )
        .await
        .expect("CREATE TABLE should work");
}

async fn count_rows(handler: &DbHandler) -> i64 {
    let result = handler
        .run("SELECT COUNT(*) AS n FROM t", &[], Target::PoolDefault)
        .await
        .unwrap();
    result.rows()[0]["n"].as_i64().unwrap()
}

#[tokio::test]
async fn test_end_to_end_insert_id_single_connection() {
    let (_temp_file, handler) = sqlite_handler(1);
    create_table(&handler).await;

    let mut conn = handler.get_connection().await.unwrap();
    handler.init_transaction(&mut conn).await.unwrap();

    let result = handler
        .run(
            "INSERT INTO t(v) VALUES (?)",
            &[QueryParam::Int(5)],
            Target::Leased(&mut conn),
        )
        .await
        .unwrap();
    assert_eq!(result.id, Some(1));
    assert_eq!(result.row_count, Some(1));
    assert!(result.rows.is_none());

    handler.commit(&mut conn).await.unwrap();
    assert_eq!(conn.state(), TransactionState::Autocommit);
    handler.close(conn).await.unwrap();

    // Same physical connection comes back
    let conn = handler.get_connection().await.unwrap();
    assert_eq!(handler.status().size, 1);
    handler.close(conn).await.unwrap();

    assert_eq!(count_rows(&handler).await, 1);
}

#[tokio::test]
async fn test_result_shapes() {
    let (_temp_file, handler) = sqlite_handler(2);
    create_table(&handler).await;

    for v in [10, 20, 30] {
        let result = handler
            .run("INSERT INTO t(v) VALUES (?)", &[v.into()], Target::PoolDefault)
            .await
            .unwrap();
        assert!(result.id.is_some());
    }

    let updated = handler
        .run("UPDATE t SET v = v + 1 WHERE v > ?", &[15.into()], Target::PoolDefault)
        .await
        .unwrap();
    assert_eq!(updated.id, None);
    assert_eq!(updated.row_count, Some(2));
    assert!(updated.rows.is_none());

    let selected = handler
        .run("SELECT id, v FROM t ORDER BY id", &[], Target::PoolDefault)
        .await
        .unwrap();
    assert_eq!(selected.row_count, Some(3));
    assert_eq!(selected.id, None);
    assert_eq!(selected.rows()[2]["v"], json!(31));

    let empty_select = handler
        .run("SELECT id FROM t WHERE v < 0", &[], Target::PoolDefault)
        .await
        .unwrap();
    assert_eq!(empty_select.rows, Some(Vec::new()));
    assert_eq!(empty_select.row_count, Some(0));

    let no_match = handler
        .run("DELETE FROM t WHERE v < 0", &[], Target::PoolDefault)
        .await
        .unwrap();
    assert!(no_match.is_empty());
}

#[tokio::test]
async fn test_run_statement_renders_then_runs() {
    let (_temp_file, handler) = sqlite_handler(1);
    create_table(&handler).await;

    let insert = PreparedQuery::new("INSERT INTO t(v) VALUES (?)").with_arg(42);
    let result = handler
        .run_statement(&insert, Target::PoolDefault)
        .await
        .unwrap();
    assert_eq!(result.id, Some(1));

    let select = PreparedQuery::new("SELECT v FROM t WHERE id = ?").with_arg(1);
    let result = handler
        .run_statement(&select, Target::PoolDefault)
        .await
        .unwrap();
    assert_eq!(result.rows()[0]["v"], json!(42));
}

#[tokio::test]
async fn test_begin_then_rollback_discards_writes() {
    let (_temp_file, handler) = sqlite_handler(2);
    create_table(&handler).await;

    let mut conn = handler.get_connection().await.unwrap();
    handler.init_transaction(&mut conn).await.unwrap();
    assert_eq!(conn.state(), TransactionState::InTransaction);

    handler
        .run("INSERT INTO t(v) VALUES (?)", &[1.into()], Target::Leased(&mut conn))
        .await
        .unwrap();
    let inside = handler
        .run("SELECT COUNT(*) AS n FROM t", &[], Target::Leased(&mut conn))
        .await
        .unwrap();
    assert_eq!(inside.rows()[0]["n"], json!(1));

    handler.rollback(&mut conn).await.unwrap();
    assert_eq!(conn.state(), TransactionState::Autocommit);
    handler.close(conn).await.unwrap();

    assert_eq!(count_rows(&handler).await, 0);
}

#[tokio::test]
async fn test_commit_or_rollback_without_begin_is_rejected() {
    let (_temp_file, handler) = sqlite_handler(1);
    let mut conn = handler.get_connection().await.unwrap();

    let err = handler.commit(&mut conn).await.unwrap_err();
    assert!(matches!(err, DbError::Transaction { .. }));
    let err = handler.rollback(&mut conn).await.unwrap_err();
    assert!(matches!(err, DbError::Transaction { .. }));
    assert_eq!(conn.state(), TransactionState::Autocommit);

    handler.close(conn).await.unwrap();
}

#[tokio::test]
async fn test_second_begin_is_rejected() {
    let (_temp_file, handler) = sqlite_handler(1);
    let mut conn = handler.get_connection().await.unwrap();

    handler.init_transaction(&mut conn).await.unwrap();
    let err = handler.init_transaction(&mut conn).await.unwrap_err();
    assert!(matches!(err, DbError::Transaction { .. }));
    assert_eq!(conn.state(), TransactionState::InTransaction);

    handler.rollback(&mut conn).await.unwrap();
    handler.close(conn).await.unwrap();
}

#[tokio::test]
async fn test_close_mid_transaction_rolls_back() {
    let (_temp_file, handler) = sqlite_handler(1);
    create_table(&handler).await;

    let mut conn = handler.get_connection().await.unwrap();
    handler.init_transaction(&mut conn).await.unwrap();
    handler
        .run("INSERT INTO t(v) VALUES (7)", &[], Target::Leased(&mut conn))
        .await
        .unwrap();

    let err = handler.close(conn).await.unwrap_err();
    assert!(matches!(err, DbError::Transaction { .. }));

    // Connection was reclaimed and the write is gone
    assert_eq!(count_rows(&handler).await, 0);
    assert_eq!(handler.status().size, 1);
}

#[tokio::test]
async fn test_query_error_keeps_native_message() {
    let (_temp_file, handler) = sqlite_handler(1);
    create_table(&handler).await;

    let err = handler
        .run("SELECT nope FROM t", &[], Target::PoolDefault)
        .await
        .unwrap_err();
    match err {
        DbError::Query { message, .. } => assert!(message.contains("nope")),
        other => panic!("expected query error, got {other:?}"),
    }

    let err = handler
        .run("INSERT INTO t(v) VALUES (NULL)", &[], Target::PoolDefault)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Query { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_failed_query_in_transaction_keeps_state() {
    let (_temp_file, handler) = sqlite_handler(1);
    create_table(&handler).await;

    let mut conn = handler.get_connection().await.unwrap();
    handler.init_transaction(&mut conn).await.unwrap();
    let result = handler
        .run("INSERT INTO t(v) VALUES (NULL)", &[], Target::Leased(&mut conn))
        .await;
    assert!(result.is_err());
    assert_eq!(conn.state(), TransactionState::InTransaction);

    handler.rollback(&mut conn).await.unwrap();
    handler.close(conn).await.unwrap();
}

#[tokio::test]
async fn test_excess_acquire_waits_for_release() {
    let (_temp_file, handler) = sqlite_handler(2);

    let first = handler.get_connection().await.unwrap();
    let second = handler.get_connection().await.unwrap();
    assert_eq!(handler.status().size, 2);

    // A third caller suspends rather than failing or opening a third connection
    let waiting = tokio::time::timeout(Duration::from_millis(200), handler.get_connection()).await;
    assert!(waiting.is_err(), "third acquire should still be pending");

    let waiter = {
        let handler = handler.clone();
        tokio::spawn(async move { handler.get_connection().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    handler.close(first).await.unwrap();
    let third: Connection = waiter.await.unwrap().unwrap();
    assert!(handler.status().size <= 2);

    handler.close(second).await.unwrap();
    handler.close(third).await.unwrap();
}

#[tokio::test]
async fn test_acquire_times_out_as_connection_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let mut config = ConnectionConfig::sqlite(temp_file.path().to_str().unwrap(), 1);
    config.pool_options.acquire_timeout_secs = Some(1);
    let handler = DbHandler::new(config).unwrap();

    let held = handler.get_connection().await.unwrap();
    let err = handler.get_connection().await.unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }));
    assert!(err.is_retryable());

    handler.close(held).await.unwrap();
}

#[tokio::test]
async fn test_unopenable_database_is_connection_error() {
    let config = ConnectionConfig::sqlite("/dblink_missing_dir/app.db", 1);
    let handler = DbHandler::new(config).unwrap();

    let err = handler.get_connection().await.unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }), "got {err:?}");
    assert!(err.to_string().contains("unable to open"));

    let err = handler
        .run("SELECT 1", &[], Target::PoolDefault)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }), "got {err:?}");
    assert_eq!(err.sql_state(), None);
}

#[tokio::test]
async fn test_distinct_leases_run_concurrently() {
    let (_temp_file, handler) = sqlite_handler(3);
    create_table(&handler).await;

    let tasks: Vec<_> = (0..3)
        .map(|i| {
            let handler = handler.clone();
            tokio::spawn(async move {
                let mut conn = handler.get_connection().await?;
                let result = handler
                    .run("SELECT ? AS v", &[QueryParam::Int(i)], Target::Leased(&mut conn))
                    .await?;
                handler.close(conn).await?;
                Ok::<_, DbError>(result.rows()[0]["v"].clone())
            })
        })
        .collect();

    let mut values = Vec::new();
    for task in tasks {
        values.push(task.await.unwrap().unwrap());
    }
    assert_eq!(values, vec![json!(0), json!(1), json!(2)]);
}

#[tokio::test]
async fn test_result_set_serializes_canonically() {
    let (_temp_file, handler) = sqlite_handler(1);
    create_table(&handler).await;

    let insert = handler
        .run("INSERT INTO t(v) VALUES (3)", &[], Target::PoolDefault)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&insert).unwrap(),
        json!({"id": 1, "rowCount": 1})
    );

    let select = handler
        .run("SELECT v FROM t", &[], Target::PoolDefault)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&select).unwrap(),
        json!({"rowCount": 1, "rows": [{"v": 3}]})
    );
}
