//! # Migrations
//!
//! The schema lives in `migrations/sqlite/` and is embedded at compile time:
//! `001_initial_schema.sql` holds clients, schedule periods, registers, the
//! operation log and reports; `002_ledger.sql` holds the read-only ledger
//! tables. Applied files are recorded in `_sqlx_migrations`, so existing
//! files must never change; add a new numbered file instead.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs pending migrations in filename order, each in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
