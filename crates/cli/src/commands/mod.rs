//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod users;

use secrecy::SecretString;
use sqlx::PgPool;

use freshbites_storefront::db;

/// Errors shared by commands that talk to the database.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Missing environment variable: STOREFRONT_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect using `STOREFRONT_DATABASE_URL`, falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CommandError> {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&url).await?)
}
