//! dblink - Main entry point.
//!
//! Runs one SQL statement through the pooled handler and prints the result as
//! JSON, or with `--stream` prints each row as a line of JSON.

use dblink_sqlx::config::Config;
use dblink_sqlx::db::DbHandler;
use dblink_sqlx::handler::{Handler, Target};
use futures_util::TryStreamExt;
use std::io::Write;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // stdout carries results, so logs go to stderr
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(config: &Config, handler: &DbHandler) -> Result<(), Box<dyn std::error::Error>> {
    handler.init().await?;
    let params = config.query_params();
    let mut out = std::io::stdout().lock();

    if config.stream {
        let mut rows = handler.stream(config.sql.as_str(), params, Target::PoolDefault);
        let mut count: u64 = 0;
        while let Some(row) = rows.try_next().await? {
            serde_json::to_writer(&mut out, &row)?;
            writeln!(out)?;
            count += 1;
        }
        info!(rows = count, "Stream finished");
    } else {
        let result = handler
            .run(&config.sql, &params, Target::PoolDefault)
            .await?;
        serde_json::to_writer_pretty(&mut out, &result)?;
        writeln!(out)?;
    }

    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    let connection_config = config.connection_config()?;
    info!(
        target_db = %connection_config.display_target(),
        "Starting dblink v{}",
        env!("CARGO_PKG_VERSION")
    );

    let handler = DbHandler::new(connection_config)?;
    let result = run(&config, &handler).await;
    handler.shutdown().await;

    if let Err(e) = result {
        error!(error = %e, "Statement failed");
        if let Some(suggestion) = e
            .downcast_ref::<dblink_sqlx::DbError>()
            .and_then(|db_err| db_err.suggestion())
        {
            eprintln!("Hint: {}", suggestion);
        }
        return Err(e);
    }

    Ok(())
}
