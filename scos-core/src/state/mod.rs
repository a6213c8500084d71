//! Tracking state with SQLite persistence.
//!
//! The StateManager keeps one table per tracked concept:
//! - the manifest copy, in input order
//! - component records (status, reason and the full record)
//! - build results and replacement images
//! - the final mapping and the release command
//!
//! Each record write is a single transaction keyed by component name, so a
//! record is never observed half-updated and an aborted run can be resumed.

use crate::error::{Result, ScosError};
use crate::manifest::Manifest;
use crate::pipeline::merger::{FinalMapping, MappingEntry};
use crate::pipeline::release::ReleaseCommand;
use crate::types::{ComponentRecord, ComponentStatus, FailureReason};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, instrument};

pub mod migrations;

#[cfg(test)]
mod tests;

/// Outcome of a build attempt as persisted in `build_results`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub component: String,
    /// `succeeded` or `failed`.
    pub outcome: String,
    pub image: Option<String>,
    pub reason: Option<FailureReason>,
}

/// An unbuildable component with its reason and context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbuildableEntry {
    pub component: String,
    pub reason: FailureReason,
    pub detail: Option<String>,
    pub vcs_url: Option<String>,
}

/// State manager for persistent tracking state.
#[derive(Clone)]
pub struct StateManager {
    pool: SqlitePool,
}

fn db_err(e: sqlx::Error) -> ScosError {
    ScosError::DatabaseError(e.to_string())
}

fn json_err(e: serde_json::Error) -> ScosError {
    ScosError::DatabaseError(format!("Failed to (de)serialize: {}", e))
}

impl StateManager {
    /// Create a new StateManager with an in-memory database (for tests).
    pub async fn new_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(db_err)?;
        // A single, never-recycled connection keeps the in-memory database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        Self::with_pool(pool).await
    }

    /// Create a new StateManager with a database at the specified path.
    #[instrument(skip(db_path))]
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Initializing state manager at {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ScosError::IoError { path: parent.to_path_buf(), source: e })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        migrations::run(&pool).await?;
        Ok(Self { pool })
    }

    /// Get a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========================
    // Manifest
    // ========================

    /// Replace the stored manifest copy.
    #[instrument(skip_all, fields(components = manifest.len()))]
    pub async fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM manifest").execute(&mut *tx).await.map_err(db_err)?;
        for (position, entry) in manifest.entries().iter().enumerate() {
            sqlx::query("INSERT INTO manifest (name, position, reference) VALUES (?, ?, ?)")
                .bind(&entry.name)
                .bind(position as i64)
                .bind(&entry.reference)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    /// Load the stored manifest copy, if one was saved.
    pub async fn load_manifest(&self) -> Result<Option<Manifest>> {
        let rows = sqlx::query("SELECT name, reference FROM manifest ORDER BY position")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let pairs = rows
            .into_iter()
            .map(|row| (row.get::<String, _>("name"), row.get::<String, _>("reference")));
        Manifest::from_pairs(pairs).map(Some)
    }

    // ========================
    // Component records
    // ========================

    /// Insert or replace a record, keeping the derived build tables in step with it.
    #[instrument(skip_all, fields(component = %record.name, status = %record.status))]
    pub async fn upsert_record(&self, record: &ComponentRecord) -> Result<()> {
        let record_json = serde_json::to_string(record).map_err(json_err)?;
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO components (name, status, failure_reason, record, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                status = excluded.status,
                failure_reason = excluded.failure_reason,
                record = excluded.record,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.name)
        .bind(record.status.as_str())
        .bind(record.failure_reason.map(FailureReason::code))
        .bind(record_json)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            metrics::counter!("scos_db_errors_total", "operation" => "upsert_record").increment(1);
            db_err(e)
        })?;

        let build_outcome = match record.status {
            ComponentStatus::Succeeded => Some("succeeded"),
            ComponentStatus::Failed => Some("failed"),
            _ => None,
        };
        if build_outcome.is_none() {
            sqlx::query("DELETE FROM build_results WHERE name = ?")
                .bind(&record.name)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        if record.status != ComponentStatus::Succeeded {
            sqlx::query("DELETE FROM replacements WHERE name = ?")
                .bind(&record.name)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        if let Some(outcome) = build_outcome {
            sqlx::query(
                r#"
                INSERT INTO build_results (name, outcome, image, reason, recorded_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(name) DO UPDATE SET
                    outcome = excluded.outcome,
                    image = excluded.image,
                    reason = excluded.reason,
                    recorded_at = excluded.recorded_at
                "#,
            )
            .bind(&record.name)
            .bind(outcome)
            .bind(&record.replacement_image)
            .bind(record.failure_reason.map(FailureReason::code))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        if let (ComponentStatus::Succeeded, Some(image)) = (record.status, &record.replacement_image)
        {
            sqlx::query(
                r#"
                INSERT INTO replacements (name, image) VALUES (?, ?)
                ON CONFLICT(name) DO UPDATE SET image = excluded.image
                "#,
            )
            .bind(&record.name)
            .bind(image)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        debug!("record saved");
        Ok(())
    }

    /// Get a record by component name.
    pub async fn get_record(&self, name: &str) -> Result<Option<ComponentRecord>> {
        let row = sqlx::query("SELECT record FROM components WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|row| self.row_to_record(row)).transpose()
    }

    /// List all records, in manifest order; records outside the manifest come last.
    pub async fn list_records(&self) -> Result<Vec<ComponentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT c.record FROM components c
            LEFT JOIN manifest m ON m.name = c.name
            ORDER BY m.position IS NULL, m.position, c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(|row| self.row_to_record(row)).collect()
    }

    /// Names of components currently ready to build.
    pub async fn list_buildable(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT name FROM components WHERE status = ? ORDER BY name")
            .bind(ComponentStatus::Buildable.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Components that could not be prepared for a build.
    pub async fn list_unbuildable(&self) -> Result<Vec<UnbuildableEntry>> {
        let records = self.list_records().await?;
        Ok(records
            .into_iter()
            .filter(|r| r.status == ComponentStatus::Unbuildable)
            .filter_map(|r| {
                r.failure_reason.map(|reason| UnbuildableEntry {
                    component: r.name,
                    reason,
                    detail: r.failure_detail,
                    vcs_url: r.vcs_url,
                })
            })
            .collect())
    }

    pub async fn list_build_results(&self) -> Result<Vec<BuildResult>> {
        let rows = sqlx::query("SELECT name, outcome, image, reason FROM build_results ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(|row| {
                let reason: Option<String> = row.get("reason");
                Ok(BuildResult {
                    component: row.get("name"),
                    outcome: row.get("outcome"),
                    image: row.get("image"),
                    reason: reason.as_deref().map(FailureReason::from_str).transpose()?,
                })
            })
            .collect()
    }

    pub async fn list_replacements(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT name, image FROM replacements ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(|row| (row.get("name"), row.get("image"))).collect())
    }

    fn row_to_record(&self, row: sqlx::sqlite::SqliteRow) -> Result<ComponentRecord> {
        let record_json: String = row.get("record");
        serde_json::from_str(&record_json).map_err(json_err)
    }

    // ========================
    // Final artifacts
    // ========================

    #[instrument(skip_all, fields(components = mapping.len()))]
    pub async fn save_final_mapping(&self, mapping: &FinalMapping) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM final_mapping").execute(&mut *tx).await.map_err(db_err)?;
        for (position, entry) in mapping.entries().iter().enumerate() {
            sqlx::query(
                "INSERT INTO final_mapping (name, position, image, replaced) VALUES (?, ?, ?, ?)",
            )
            .bind(&entry.component)
            .bind(position as i64)
            .bind(&entry.image)
            .bind(entry.replaced)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    pub async fn load_final_mapping(&self) -> Result<Option<FinalMapping>> {
        let rows = sqlx::query("SELECT name, image, replaced FROM final_mapping ORDER BY position")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(FinalMapping::from_entries(
            rows.into_iter()
                .map(|row| MappingEntry {
                    component: row.get("name"),
                    image: row.get("image"),
                    replaced: row.get("replaced"),
                })
                .collect(),
        )))
    }

    pub async fn save_release_command(&self, command: &ReleaseCommand) -> Result<()> {
        let command_json = serde_json::to_string(command).map_err(json_err)?;
        sqlx::query(
            r#"
            INSERT INTO release_command (id, command, created_at) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET command = excluded.command, created_at = excluded.created_at
            "#,
        )
        .bind(command_json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn load_release_command(&self) -> Result<Option<ReleaseCommand>> {
        let command: Option<String> =
            sqlx::query_scalar("SELECT command FROM release_command WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        command.map(|json| serde_json::from_str(&json).map_err(json_err)).transpose()
    }

    /// Drop a stale release command, e.g. after a run with no successful builds.
    pub async fn clear_release_command(&self) -> Result<()> {
        sqlx::query("DELETE FROM release_command").execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }
}
