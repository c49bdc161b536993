//! SQLite pool construction and schema migration.
//!
//! Both the structured preference table and the legacy memory table live in
//! the same database file. Migrations are embedded with `include_str!` and
//! applied on every open; every statement is idempotent.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the database at `path` and apply migrations.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created, the database
/// cannot be opened, or a migration fails.
pub async fn open(path: &Path, max_connections: u32) -> anyhow::Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .pragma("trusted_schema", "OFF");

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    migrate(&pool).await?;
    info!(path = %path.display(), "database ready");
    Ok(pool)
}

/// Open a private in-memory database with migrations applied.
///
/// The pool is capped at one connection: every SQLite `:memory:` connection
/// is a separate database.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn open_in_memory() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(":memory:")
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .context("failed to open in-memory database")?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Apply the embedded schema migrations in order.
///
/// # Errors
///
/// Returns an error if any migration statement fails.
pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::raw_sql(include_str!("../migrations/001_preferences.sql"))
        .execute(pool)
        .await
        .context("failed to apply preferences migration")?;
    sqlx::raw_sql(include_str!("../migrations/002_memory.sql"))
        .execute(pool)
        .await
        .context("failed to apply memory migration")?;
    Ok(())
}
