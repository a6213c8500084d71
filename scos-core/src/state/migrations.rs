//! Database migrations.

use crate::error::{Result, ScosError};
use sqlx::SqlitePool;
use tracing::{info, instrument};

const SCHEMA_VERSION: i64 = 2;

#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| ScosError::MigrationFailed { reason: e.to_string() })?;

    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(|e| ScosError::MigrationFailed { reason: e.to_string() })?;

    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    info!("Migrating database from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    if current_version < 2 {
        migrate_to_v2(pool).await?;
    }

    Ok(())
}

async fn execute(pool: &SqlitePool, statement: &str) -> Result<()> {
    sqlx::query(statement)
        .execute(pool)
        .await
        .map_err(|e| ScosError::MigrationFailed { reason: e.to_string() })?;
    Ok(())
}

async fn set_version(pool: &SqlitePool, version: i64) -> Result<()> {
    execute(pool, "DELETE FROM schema_version").await?;
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await
        .map_err(|e| ScosError::MigrationFailed { reason: e.to_string() })?;
    Ok(())
}

/// Manifest copy and per-component records.
#[instrument(skip(pool))]
async fn migrate_to_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 1");

    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS manifest (
            name TEXT PRIMARY KEY,
            position INTEGER NOT NULL,
            reference TEXT NOT NULL
        )
        "#,
    )
    .await?;

    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS components (
            name TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            failure_reason TEXT,
            record TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .await?;

    execute(pool, "CREATE INDEX IF NOT EXISTS idx_components_status ON components(status)")
        .await?;

    set_version(pool, 1).await
}

/// Build outcomes, replacements and the final release artifacts.
#[instrument(skip(pool))]
async fn migrate_to_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 2");

    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS build_results (
            name TEXT PRIMARY KEY,
            outcome TEXT NOT NULL,
            image TEXT,
            reason TEXT,
            recorded_at INTEGER NOT NULL
        )
        "#,
    )
    .await?;

    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS replacements (
            name TEXT PRIMARY KEY,
            image TEXT NOT NULL
        )
        "#,
    )
    .await?;

    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS final_mapping (
            name TEXT PRIMARY KEY,
            position INTEGER NOT NULL,
            image TEXT NOT NULL,
            replaced INTEGER NOT NULL
        )
        "#,
    )
    .await?;

    execute(
        pool,
        r#"
        CREATE TABLE IF NOT EXISTS release_command (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            command TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .await?;

    set_version(pool, 2).await
}
