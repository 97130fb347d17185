//! Per-file classification
//!
//! Decides what must happen to a single filename given its local and remote
//! records. Content identity is decided by checksum alone; timestamps only
//! order differing content.

use std::cmp::Ordering;

use savesync_core::domain::{ConflictEntry, FileRecord, PlannedAction, Side};
use tracing::debug;

/// Outcome of comparing one filename across both manifests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Both sides hold identical content
    InSync,
    /// Local content must replace the remote copy
    Upload,
    /// Remote content must replace the local copy
    Download,
    /// Equal timestamps with differing content, broken deterministically
    Conflict(ConflictEntry),
}

impl Classification {
    /// The transfer this classification resolves into, if any
    pub fn action(&self) -> Option<PlannedAction> {
        match self {
            Classification::InSync => None,
            Classification::Upload => Some(PlannedAction::Upload),
            Classification::Download => Some(PlannedAction::Download),
            Classification::Conflict(entry) => Some(entry.action),
        }
    }
}

/// Classifies a filename present on at least one side
///
/// Returns `None` when both records are absent.
pub fn classify(local: Option<&FileRecord>, remote: Option<&FileRecord>) -> Option<Classification> {
    let classification = match (local, remote) {
        (None, None) => return None,
        (Some(_), None) => Classification::Upload,
        (None, Some(_)) => Classification::Download,
        (Some(local), Some(remote)) => compare_present(local, remote),
    };
    Some(classification)
}

fn compare_present(local: &FileRecord, remote: &FileRecord) -> Classification {
    if local.same_content(remote) {
        return Classification::InSync;
    }

    match local.modified_timestamp.cmp(&remote.modified_timestamp) {
        Ordering::Greater => Classification::Upload,
        Ordering::Less => Classification::Download,
        Ordering::Equal => {
            let winner = break_tie(local, remote);
            let action = PlannedAction::favouring(winner);
            debug!(
                filename = %local.path,
                local_checksum = %local.checksum,
                remote_checksum = %remote.checksum,
                winner = ?winner,
                "Equal timestamps with differing content, tie broken"
            );
            Classification::Conflict(ConflictEntry {
                filename: local.path.clone(),
                action,
                winner,
                local_checksum: local.checksum.clone(),
                remote_checksum: remote.checksum.clone(),
            })
        }
    }
}

/// Picks the surviving side of a timestamp tie: the larger checksum wins
///
/// Depends only on the two checksums, so every device resolving the same
/// pair reaches the same answer.
pub fn break_tie(local: &FileRecord, remote: &FileRecord) -> Side {
    if local.checksum > remote.checksum {
        Side::Local
    } else {
        Side::Remote
    }
}
