//! SQLite implementation of IManifestStore
//!
//! ## Type Mapping
//!
//! | Domain Type          | SQL Type | Strategy                                   |
//! |----------------------|----------|--------------------------------------------|
//! | AccountId, GameId    | TEXT     | `.as_str()` / `::new()`                    |
//! | Manifest             | TEXT     | serde_json serialization                   |
//! | ManifestVersion      | INTEGER  | `.get()` / `ManifestVersion::new()`        |
//! | DateTime<Utc>        | TEXT     | ISO 8601 via `to_rfc3339()` / `parse_from_rfc3339()` |
//!
//! | PlanId               | TEXT     | `to_string()` / `parse()`                  |
//!
//! ## Concurrency
//!
//! Commits are a single conditional statement (`INSERT ... ON CONFLICT DO
//! NOTHING` for a first commit, `UPDATE ... WHERE version = ?` otherwise),
//! so SQLite's write lock makes the compare-and-swap atomic. Committing a
//! pending plan runs that statement and the pending-row bookkeeping in one
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use savesync_core::domain::{
    AccountId, GameId, Manifest, ManifestVersion, PendingCommit, PendingPlan, PlanId,
    RemoteManifestRecord,
};
use savesync_core::error::StoreError;
use savesync_core::ports::IManifestStore;

/// SQLite-based implementation of the manifest store port
pub struct SqliteManifestStore {
    pool: SqlitePool,
}

impl SqliteManifestStore {
    /// Creates a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Current version of the record, ABSENT if there is none
async fn current_version(
    conn: &mut SqliteConnection,
    account: &AccountId,
    game: &GameId,
) -> Result<ManifestVersion, StoreError> {
    let version: Option<i64> = sqlx::query_scalar(
        "SELECT version FROM remote_manifests WHERE account_id = ? AND game_id = ?",
    )
    .bind(account.as_str())
    .bind(game.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(backend)?;

    version
        .map(version_from_i64)
        .transpose()
        .map(|v| v.unwrap_or(ManifestVersion::ABSENT))
}

/// Replaces the record if it is still at `expected`, on `conn`
async fn compare_and_swap(
    conn: &mut SqliteConnection,
    account: &AccountId,
    game: &GameId,
    expected: ManifestVersion,
    manifest: &Manifest,
) -> Result<ManifestVersion, StoreError> {
    let next = expected.next();
    let manifest_json = manifest_to_json(manifest)?;
    let now = Utc::now().to_rfc3339();

    let result = if expected.is_absent() {
        sqlx::query(
            "INSERT INTO remote_manifests (account_id, game_id, manifest_json, version, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (account_id, game_id) DO NOTHING",
        )
        .bind(account.as_str())
        .bind(game.as_str())
        .bind(&manifest_json)
        .bind(version_to_i64(next)?)
        .bind(&now)
        .execute(&mut *conn)
        .await
    } else {
        sqlx::query(
            "UPDATE remote_manifests
             SET manifest_json = ?, version = ?, updated_at = ?
             WHERE account_id = ? AND game_id = ? AND version = ?",
        )
        .bind(&manifest_json)
        .bind(version_to_i64(next)?)
        .bind(&now)
        .bind(account.as_str())
        .bind(game.as_str())
        .bind(version_to_i64(expected)?)
        .execute(&mut *conn)
        .await
    }
    .map_err(backend)?;

    if result.rows_affected() == 0 {
        let actual = current_version(conn, account, game).await?;
        warn!(
            account = %account,
            game = %game,
            %expected,
            %actual,
            "Commit lost compare-and-swap"
        );
        return Err(StoreError::VersionConflict { expected, actual });
    }

    info!(account = %account, game = %game, version = %next, files = manifest.len(), "Manifest committed");
    Ok(next)
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn version_to_i64(version: ManifestVersion) -> Result<i64, StoreError> {
    i64::try_from(version.get())
        .map_err(|_| StoreError::Serialization(format!("version {version} out of range")))
}

fn version_from_i64(value: i64) -> Result<ManifestVersion, StoreError> {
    u64::try_from(value)
        .map(ManifestVersion::new)
        .map_err(|_| StoreError::Serialization(format!("negative version {value}")))
}

fn manifest_to_json(manifest: &Manifest) -> Result<String, StoreError> {
    serde_json::to_string(manifest).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn manifest_from_json(json: &str) -> Result<Manifest, StoreError> {
    serde_json::from_str(json)
        .map_err(|e| StoreError::Serialization(format!("stored manifest: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("Invalid datetime '{s}': {e}")))
}

fn record_from_row(row: &SqliteRow) -> Result<RemoteManifestRecord, StoreError> {
    let account_id: String = row.try_get("account_id").map_err(backend)?;
    let game_id: String = row.try_get("game_id").map_err(backend)?;
    let manifest_json: String = row.try_get("manifest_json").map_err(backend)?;
    let version: i64 = row.try_get("version").map_err(backend)?;
    let updated_at: String = row.try_get("updated_at").map_err(backend)?;

    Ok(RemoteManifestRecord {
        account_id: AccountId::new(account_id)
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        game_id: GameId::new(game_id).map_err(|e| StoreError::Serialization(e.to_string()))?,
        manifest: manifest_from_json(&manifest_json)?,
        version: version_from_i64(version)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

fn plan_id_from_str(s: &str) -> Result<PlanId, StoreError> {
    s.parse::<PlanId>()
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn pending_from_row(row: &SqliteRow) -> Result<PendingPlan, StoreError> {
    let plan_id: String = row.try_get("plan_id").map_err(backend)?;
    let account_id: String = row.try_get("account_id").map_err(backend)?;
    let game_id: String = row.try_get("game_id").map_err(backend)?;
    let base_version: i64 = row.try_get("base_version").map_err(backend)?;
    let proposed_json: String = row.try_get("proposed_json").map_err(backend)?;
    let created_at: String = row.try_get("created_at").map_err(backend)?;

    Ok(PendingPlan {
        plan_id: plan_id_from_str(&plan_id)?,
        account_id: AccountId::new(account_id)
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        game_id: GameId::new(game_id).map_err(|e| StoreError::Serialization(e.to_string()))?,
        base_version: version_from_i64(base_version)?,
        proposed: manifest_from_json(&proposed_json)?,
        created_at: parse_datetime(&created_at)?,
    })
}

// ============================================================================
// IManifestStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IManifestStore for SqliteManifestStore {
    async fn get_record(
        &self,
        account: &AccountId,
        game: &GameId,
    ) -> Result<Option<RemoteManifestRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT account_id, game_id, manifest_json, version, updated_at
             FROM remote_manifests WHERE account_id = ? AND game_id = ?",
        )
        .bind(account.as_str())
        .bind(game.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn commit(
        &self,
        account: &AccountId,
        game: &GameId,
        expected: ManifestVersion,
        manifest: &Manifest,
    ) -> Result<ManifestVersion, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        compare_and_swap(&mut *conn, account, game, expected, manifest).await
    }

    async fn save_pending(&self, plan: &PendingPlan) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Proposals on an older base can only lose the compare-and-swap
        let stale = sqlx::query(
            "DELETE FROM pending_plans
             WHERE account_id = ? AND game_id = ? AND base_version < ?
               AND committed_version IS NULL",
        )
        .bind(plan.account_id.as_str())
        .bind(plan.game_id.as_str())
        .bind(version_to_i64(plan.base_version)?)
        .execute(&mut *tx)
        .await
        .map_err(backend)?
        .rows_affected();

        sqlx::query(
            "INSERT INTO pending_plans
                 (plan_id, account_id, game_id, base_version, proposed_json, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(plan.plan_id.to_string())
        .bind(plan.account_id.as_str())
        .bind(plan.game_id.as_str())
        .bind(version_to_i64(plan.base_version)?)
        .bind(manifest_to_json(&plan.proposed)?)
        .bind(plan.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        debug!(
            plan_id = %plan.plan_id,
            account = %plan.account_id,
            game = %plan.game_id,
            base_version = %plan.base_version,
            stale,
            "Pending plan stored"
        );
        Ok(())
    }

    async fn get_pending(
        &self,
        account: &AccountId,
        game: &GameId,
        plan_id: PlanId,
    ) -> Result<Option<PendingPlan>, StoreError> {
        let row = sqlx::query(
            "SELECT plan_id, account_id, game_id, base_version, proposed_json, created_at
             FROM pending_plans
             WHERE plan_id = ? AND account_id = ? AND game_id = ? AND committed_version IS NULL",
        )
        .bind(plan_id.to_string())
        .bind(account.as_str())
        .bind(game.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(pending_from_row).transpose()
    }

    async fn commit_pending(
        &self,
        account: &AccountId,
        game: &GameId,
        plan_id: PlanId,
    ) -> Result<PendingCommit, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query(
            "SELECT plan_id, account_id, game_id, base_version, proposed_json, created_at,
                    committed_version
             FROM pending_plans WHERE plan_id = ? AND account_id = ? AND game_id = ?",
        )
        .bind(plan_id.to_string())
        .bind(account.as_str())
        .bind(game.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(PendingCommit::Unknown);
        };
        let committed: Option<i64> = row.try_get("committed_version").map_err(backend)?;
        if let Some(version) = committed {
            return Ok(PendingCommit::AlreadyCommitted(version_from_i64(version)?));
        }
        let plan = pending_from_row(&row)?;

        // Dropping the transaction on error rolls back, leaving the plan pending
        let version =
            compare_and_swap(&mut *tx, account, game, plan.base_version, &plan.proposed).await?;

        sqlx::query("UPDATE pending_plans SET committed_version = ? WHERE plan_id = ?")
            .bind(version_to_i64(version)?)
            .bind(plan_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let superseded = sqlx::query(
            "DELETE FROM pending_plans WHERE account_id = ? AND game_id = ? AND plan_id != ?",
        )
        .bind(account.as_str())
        .bind(game.as_str())
        .bind(plan_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(backend)?
        .rows_affected();

        tx.commit().await.map_err(backend)?;

        debug!(plan_id = %plan_id, version = %version, superseded, "Pending plan committed");
        Ok(PendingCommit::Committed(version))
    }

    async fn discard_pending(
        &self,
        account: &AccountId,
        game: &GameId,
        plan_id: PlanId,
    ) -> Result<bool, StoreError> {
        let deleted = sqlx::query(
            "DELETE FROM pending_plans
             WHERE plan_id = ? AND account_id = ? AND game_id = ? AND committed_version IS NULL",
        )
        .bind(plan_id.to_string())
        .bind(account.as_str())
        .bind(game.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?
        .rows_affected();

        Ok(deleted > 0)
    }

    async fn delete_game_data(
        &self,
        account: &AccountId,
        game: &GameId,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("DELETE FROM pending_plans WHERE account_id = ? AND game_id = ?")
            .bind(account.as_str())
            .bind(game.as_str())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let deleted = sqlx::query("DELETE FROM remote_manifests WHERE account_id = ? AND game_id = ?")
            .bind(account.as_str())
            .bind(game.as_str())
            .execute(&mut *tx)
            .await
            .map_err(backend)?
            .rows_affected();

        tx.commit().await.map_err(backend)?;

        info!(account = %account, game = %game, existed = deleted > 0, "Game data deleted");
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conversion() {
        assert_eq!(version_from_i64(3).unwrap(), ManifestVersion::new(3));
        assert!(version_from_i64(-1).is_err());
        assert_eq!(version_to_i64(ManifestVersion::new(7)).unwrap(), 7);
        assert!(version_to_i64(ManifestVersion::new(u64::MAX)).is_err());
    }

    #[test]
    fn test_plan_id_from_str() {
        let id = PlanId::new();
        assert_eq!(plan_id_from_str(&id.to_string()).unwrap(), id);
        assert!(matches!(plan_id_from_str("7"), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(parse_datetime("2026-03-01T10:00:00+00:00").is_ok());
        assert!(matches!(
            parse_datetime("yesterday"),
            Err(StoreError::Serialization(_))
        ));
    }
}
