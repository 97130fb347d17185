//! Sync plan types
//!
//! A [`SyncPlan`] is the transient output of reconciling a local manifest
//! against the last confirmed remote manifest. Every list is ordered by
//! filename. Conflict entries are informational: each conflicting filename
//! is also listed under the upload or download it was resolved into.

use serde::{Deserialize, Serialize};

use super::newtypes::{Checksum, Filename};

/// Which copy of a file a decision favours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The copy on this device
    Local,
    /// The last confirmed remote copy
    Remote,
}

/// Transfer direction a file was resolved into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannedAction {
    /// Local content replaces the remote copy
    Upload,
    /// Remote content replaces the local copy (after a backup)
    Download,
}

impl PlannedAction {
    /// The action that makes `winner` the surviving copy
    pub fn favouring(winner: Side) -> Self {
        match winner {
            Side::Local => PlannedAction::Upload,
            Side::Remote => PlannedAction::Download,
        }
    }
}

/// Record of an equal-timestamp, differing-content tie and how it was broken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    /// The contested file
    pub filename: Filename,
    /// The transfer the tie was resolved into
    pub action: PlannedAction,
    /// The side whose content survives
    pub winner: Side,
    /// Checksum of the local copy
    pub local_checksum: Checksum,
    /// Checksum of the remote copy
    pub remote_checksum: Checksum,
}

/// Actions reconciling a local manifest with a remote one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Files whose local content must be sent to the remote store
    pub uploads: Vec<Filename>,
    /// Files whose remote content must replace the local copy
    pub downloads: Vec<Filename>,
    /// Ties broken by the deterministic rule (informational)
    pub conflicts: Vec<ConflictEntry>,
    /// Files explicitly marked deleted, dropped from the remote manifest on commit
    pub deletes: Vec<Filename>,
}

impl SyncPlan {
    /// Returns true if executing the plan would change anything
    pub fn has_actions(&self) -> bool {
        !self.uploads.is_empty() || !self.downloads.is_empty() || !self.deletes.is_empty()
    }

    /// Total number of transfers (uploads + downloads)
    pub fn transfer_count(&self) -> usize {
        self.uploads.len() + self.downloads.len()
    }

    /// The transfer planned for `filename`, if any
    pub fn action_for(&self, filename: &Filename) -> Option<PlannedAction> {
        if self.uploads.binary_search(filename).is_ok() {
            Some(PlannedAction::Upload)
        } else if self.downloads.binary_search(filename).is_ok() {
            Some(PlannedAction::Download)
        } else {
            None
        }
    }
}
