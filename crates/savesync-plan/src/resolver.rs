//! Sync plan resolution
//!
//! Builds a [`SyncPlan`] from a local manifest, the last confirmed remote
//! manifest and any explicit delete markers, and derives the manifest the
//! remote record should hold once that plan has executed.

use std::collections::BTreeSet;

use savesync_core::domain::{Filename, Manifest, PlannedAction, SyncPlan};
use tracing::{debug, info};

use crate::classify::{classify, Classification};

/// Stateless planner; identical inputs always yield identical plans
pub struct PlanResolver;

impl PlanResolver {
    /// Reconciles `local` against `remote`
    ///
    /// Every filename in the union of both manifests is classified
    /// independently. A filename is deleted only when `deletes` names it and
    /// the remote manifest holds it; such a filename is not transferred.
    /// Markers for filenames the remote manifest does not hold are ignored.
    pub fn resolve(local: &Manifest, remote: &Manifest, deletes: &[Filename]) -> SyncPlan {
        let delete_set: BTreeSet<&Filename> =
            deletes.iter().filter(|name| remote.contains(name)).collect();

        let names: BTreeSet<&Filename> = local.filenames().chain(remote.filenames()).collect();

        let mut plan = SyncPlan::default();
        for name in names {
            if delete_set.contains(name) {
                plan.deletes.push(name.clone());
                continue;
            }

            match classify(local.get(name), remote.get(name)) {
                None | Some(Classification::InSync) => {}
                Some(Classification::Upload) => plan.uploads.push(name.clone()),
                Some(Classification::Download) => plan.downloads.push(name.clone()),
                Some(Classification::Conflict(entry)) => {
                    match entry.action {
                        PlannedAction::Upload => plan.uploads.push(name.clone()),
                        PlannedAction::Download => plan.downloads.push(name.clone()),
                    }
                    plan.conflicts.push(entry);
                }
            }
        }

        let ignored = deletes.len() - plan.deletes.len();
        if ignored > 0 {
            debug!(ignored, "Ignored delete markers for files unknown remotely");
        }

        info!(
            uploads = plan.uploads.len(),
            downloads = plan.downloads.len(),
            conflicts = plan.conflicts.len(),
            deletes = plan.deletes.len(),
            "Sync plan resolved"
        );
        plan
    }

    /// The manifest the remote record should hold after `plan` executes
    ///
    /// Uploaded files take their local record, deleted files are dropped and
    /// everything else keeps its remote record.
    pub fn proposed_manifest(local: &Manifest, remote: &Manifest, plan: &SyncPlan) -> Manifest {
        let mut proposed = remote.clone();
        for name in &plan.uploads {
            if let Some(record) = local.get(name) {
                proposed.insert(record.clone());
            }
        }
        for name in &plan.deletes {
            proposed.remove(name);
        }
        proposed
    }
}
