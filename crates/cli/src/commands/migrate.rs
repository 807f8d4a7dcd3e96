//! Database migration command.
//!
//! Applies `crates/storefront/migrations/` and then creates the
//! `tower_sessions` schema used by the session store.

use tower_sessions_sqlx_store::PostgresStore;

use super::{CommandError, connect};

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session store migration error: {0}")]
    Sessions(#[from] sqlx::Error),
}

/// Run all migrations.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Creating session store schema...");
    PostgresStore::new(pool.clone()).migrate().await?;

    tracing::info!("Migrations complete");
    Ok(())
}
