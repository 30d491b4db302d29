//! Schema migrations
//!
//! SQL files live in the workspace `migrations/` directory and are embedded
//! at compile time.

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

use crate::error::DatabaseError;

/// Embedded migrations for the outbox schema
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Applies any migrations not yet recorded in `_sqlx_migrations`
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    MIGRATOR.run(pool).await?;
    info!(count = MIGRATOR.iter().count(), "Database migrations applied");
    Ok(())
}
