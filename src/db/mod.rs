//! PostgreSQL pool, embedded migrations and readiness check

use sqlx::migrate::MigrateError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Tables the ledger cannot run without
const LEDGER_TABLES: [&str; 4] = ["clients", "loans", "payments", "voided_receipts"];

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("cannot reach the ledger database")]
    Connect(#[source] sqlx::Error),

    #[error("ledger migrations failed")]
    Migrate(#[source] MigrateError),

    #[error("ledger database did not answer")]
    Unreachable(#[source] sqlx::Error),

    #[error("ledger table '{0}' is missing; run the migrations")]
    SchemaMissing(&'static str),
}

pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!(
        url = %config.database_url_masked(),
        max_connections = config.db_max_connections,
        "Opening ledger database pool"
    );

    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(DbError::Connect)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(DbError::Migrate)?;

    tracing::info!("Ledger schema up to date");
    Ok(())
}

/// Database answers and every ledger table exists
pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    for table in LEDGER_TABLES {
        let present: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(table)
            .fetch_one(pool)
            .await
            .map_err(DbError::Unreachable)?;

        if !present {
            return Err(DbError::SchemaMissing(table));
        }
    }

    Ok(())
}
