//! Persistence for Coffer metadata
//!
//! Repositories are defined as traits so services can run against Postgres
//! in production and against the in-memory implementation in tests and dry
//! runs. Folder rename and delete are single statements; the quota-checked
//! insert runs in one transaction holding the owner's row lock.

pub mod memory;
pub mod postgres;
pub mod traits;
pub mod transaction;

use std::time::Duration;

use anyhow::Context;
use coffer_core::CofferConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub use memory::{MemoryFileRepository, MemoryUserRepository};
pub use postgres::{PgFileRepository, PgUserRepository};
pub use traits::{FileRepository, UserRepository};

/// Connect to Postgres and apply pending migrations.
pub async fn connect(config: &CofferConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(config.require_database_url()?)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
