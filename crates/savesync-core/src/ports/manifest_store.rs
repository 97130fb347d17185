//! Remote manifest store port (driven/secondary port, server side)
//!
//! Durable per-(account, game) state owned by the request handler:
//! the confirmed [`RemoteManifestRecord`] and the [`PendingPlan`]s of plans
//! issued against it, keyed by [`PlanId`].
//!
//! ## Concurrency
//!
//! Commits are compare-and-swap on [`ManifestVersion`]. Two devices that
//! acknowledge plans computed against the same base version cannot both
//! win; the loser gets [`StoreError::VersionConflict`].
//!
//! [`IManifestStore::commit_pending`] performs the compare-and-swap and marks
//! the proposal committed in one transaction. If it fails the proposal stays
//! pending, so the acknowledgement can be retried.

use crate::domain::{
    AccountId, GameId, Manifest, ManifestVersion, PendingCommit, PendingPlan, PlanId,
    RemoteManifestRecord,
};
use crate::error::StoreError;

/// Port trait for the remote manifest store
#[async_trait::async_trait]
pub trait IManifestStore: Send + Sync {
    /// Loads the confirmed record, or `None` before the first commit
    async fn get_record(
        &self,
        account: &AccountId,
        game: &GameId,
    ) -> Result<Option<RemoteManifestRecord>, StoreError>;

    /// Atomically replaces the record if it is still at `expected`
    ///
    /// `expected == ManifestVersion::ABSENT` creates the record. Returns the
    /// new version on success.
    async fn commit(
        &self,
        account: &AccountId,
        game: &GameId,
        expected: ManifestVersion,
        manifest: &Manifest,
    ) -> Result<ManifestVersion, StoreError>;

    /// Stores `plan` as a pending proposal alongside any other pending plans
    async fn save_pending(&self, plan: &PendingPlan) -> Result<(), StoreError>;

    /// Loads a proposal that has not been committed or discarded
    async fn get_pending(
        &self,
        account: &AccountId,
        game: &GameId,
        plan_id: PlanId,
    ) -> Result<Option<PendingPlan>, StoreError>;

    /// Commits the proposal `plan_id` on top of the version it was based on
    ///
    /// On success every other proposal for the game is dropped, since each
    /// was computed against a version that no longer exists. A repeated call
    /// for a committed plan returns [`PendingCommit::AlreadyCommitted`].
    async fn commit_pending(
        &self,
        account: &AccountId,
        game: &GameId,
        plan_id: PlanId,
    ) -> Result<PendingCommit, StoreError>;

    /// Drops the uncommitted proposal `plan_id`; returns true if it existed
    async fn discard_pending(
        &self,
        account: &AccountId,
        game: &GameId,
        plan_id: PlanId,
    ) -> Result<bool, StoreError>;

    /// Deletes the record and any pending proposal (explicit data deletion)
    ///
    /// Returns true if a record existed.
    async fn delete_game_data(&self, account: &AccountId, game: &GameId)
        -> Result<bool, StoreError>;
}
