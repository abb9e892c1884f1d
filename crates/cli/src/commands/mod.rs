//! CLI subcommands.

pub mod admin;
pub mod migrate;
pub mod referral;

use garden_api::config::{ConfigError, DatabaseConfig};
use garden_api::db::{MEMORY_URL, create_pool};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

/// Errors opening the database for a command.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CLI commands need PostgreSQL; memory:// is only usable by a running server")]
    MemoryStore,
}

/// Connect to the database named by `GARDEN_DATABASE_URL` (or `DATABASE_URL`).
pub async fn connect() -> Result<PgPool, ConnectError> {
    dotenvy::dotenv().ok();

    let config = DatabaseConfig::from_env()?;
    if config.url.expose_secret().starts_with(MEMORY_URL) {
        return Err(ConnectError::MemoryStore);
    }

    tracing::info!("Connecting to database...");
    Ok(create_pool(&config).await?)
}
