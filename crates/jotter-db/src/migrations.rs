//! # Database Migrations
//!
//! Embedded SQL migrations for the relational adapter.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  migrations/sqlite/          _sqlx_migrations     schema_version        │
//! │    0001_initial_schema.sql   checksum + time      1, 2                  │
//! │    0002_revisions.sql        checksum + time      3                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! sqlx tracks what it applied in `_sqlx_migrations`. The scripts also stamp
//! `schema_version`, which is what the embedded adapter reads, so either
//! adapter can open a file the other created. A schema change needs a new
//! script here and a matching step in `embedded::schema`.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};

/// Embedded migrations from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies pending scripts in filename order; already applied ones are
/// skipped.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(migrations = MIGRATOR.migrations.len(), "Relational schema up to date");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;
    let applied = usize::try_from(applied)
        .map_err(|_| DbError::corrupted(format!("migration count {applied}")))?;

    Ok((total, applied))
}
