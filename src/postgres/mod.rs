//! PostgreSQL connection pool setup.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

use crate::config::DatabaseConfig;

/// Embedded schema migrations, applied at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum PostgresPoolError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("database.url is required for the postgres backend")]
    MissingUrl,
}

/// Create a connection pool from configuration and apply pending migrations.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, PostgresPoolError> {
    let url = config.url.as_deref().ok_or(PostgresPoolError::MissingUrl)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds as u64))
        .connect(url)
        .await?;

    MIGRATOR.run(&pool).await?;

    tracing::info!(
        pool_size = config.pool_size,
        "PostgreSQL connection pool created"
    );

    Ok(pool)
}
