//! Remote manifest records
//!
//! The request handler owns two kinds of durable state per (account, game):
//! the [`RemoteManifestRecord`] holding the last manifest confirmed synced,
//! and one [`PendingPlan`] per issued plan holding the manifest that plan
//! proposed. A pending plan only becomes the record after a success
//! acknowledgement naming its [`PlanId`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::manifest::Manifest;
use super::newtypes::{AccountId, GameId, ManifestVersion, PlanId};

/// Last manifest confirmed synced for one account and game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteManifestRecord {
    /// Owning account
    pub account_id: AccountId,
    /// Game the saves belong to
    pub game_id: GameId,
    /// Confirmed file state
    pub manifest: Manifest,
    /// Compare-and-swap token, bumped on every commit
    pub version: ManifestVersion,
    /// When the record was last committed
    pub updated_at: DateTime<Utc>,
}

impl RemoteManifestRecord {
    /// An empty, uncommitted record for a first sync
    pub fn absent(account_id: AccountId, game_id: GameId) -> Self {
        Self {
            account_id,
            game_id,
            manifest: Manifest::new(),
            version: ManifestVersion::ABSENT,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Manifest proposed by a plan request, awaiting acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPlan {
    /// Handed to the client in the plan response
    pub plan_id: PlanId,
    /// Owning account
    pub account_id: AccountId,
    /// Game the saves belong to
    pub game_id: GameId,
    /// Version of the record the proposal was computed against
    pub base_version: ManifestVersion,
    /// Manifest the record should hold once the plan has executed
    pub proposed: Manifest,
    /// When the plan was issued
    pub created_at: DateTime<Utc>,
}

/// What a success acknowledgement did to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCommit {
    /// The proposal became the record at this version
    Committed(ManifestVersion),
    /// The proposal had already been committed by an earlier acknowledgement
    AlreadyCommitted(ManifestVersion),
    /// No proposal with that id is pending (discarded, superseded or never issued)
    Unknown,
}
