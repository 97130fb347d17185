//! Transfer executor
//!
//! Carries out the uploads and downloads of a plan response against the
//! capabilities it hands out.
//!
//! ## Guarantees
//!
//! - An upload is reported successful only after the store accepted it.
//! - A download is written only after its checksum matches the declared
//!   one, and only after the current local bytes were backed up.
//! - A download whose local file already has the declared checksum is not
//!   fetched or backed up again.
//! - A written download takes the remote copy's modification time, so the
//!   next manifest agrees with the remote one.
//! - Every action must finish before the capability deadline; a late action
//!   is abandoned and never retried against the stale URL.
//! - Actions are independent: one failure never skips the others.

use std::sync::Arc;

use savesync_core::domain::{BackupEntry, Filename, PlannedAction};
use savesync_core::error::SaveSyncError;
use savesync_core::ports::{DownloadTarget, ITransferClient, PlanResponse, UploadTarget};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::backup::BackupManager;
use crate::filesystem::set_modified;
use crate::manifest::{checksum_bytes, checksum_file, ManifestBuilder};
use crate::retry::{with_retry, RetryPolicy};

// ============================================================================
// ExecutionReport
// ============================================================================

/// One action that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionFailure {
    pub filename: Filename,
    pub action: PlannedAction,
    pub error: String,
}

/// Outcome of executing every action of a plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Files the store accepted
    pub uploaded: Vec<Filename>,
    /// Files replaced locally with verified remote content
    pub downloaded: Vec<Filename>,
    /// Copies taken before local overwrites
    pub backups: Vec<BackupEntry>,
    /// Actions that did not complete
    pub failures: Vec<ActionFailure>,
}

impl ExecutionReport {
    /// Returns true if every planned action completed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line description of the failures, for the completion acknowledgement
    pub fn failure_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        Some(
            self.failures
                .iter()
                .map(|f| format!("{}: {}", f.filename, f.error))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

// ============================================================================
// TransferExecutor
// ============================================================================

/// Executes plan responses for one save directory
pub struct TransferExecutor {
    transfer: Arc<dyn ITransferClient + Send + Sync>,
    files: ManifestBuilder,
    backups: BackupManager,
    retry: RetryPolicy,
}

impl TransferExecutor {
    pub fn new(
        transfer: Arc<dyn ITransferClient + Send + Sync>,
        files: ManifestBuilder,
        backups: BackupManager,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transfer,
            files,
            backups,
            retry,
        }
    }

    /// Runs every upload, then every download, against `deadline`
    #[instrument(skip(self, plan), fields(
        uploads = plan.uploads.len(),
        downloads = plan.downloads.len()
    ))]
    pub async fn execute(&self, plan: &PlanResponse, deadline: Instant) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for target in &plan.uploads {
            let filename = target.filename.clone();
            let result = self.before_deadline(&filename, deadline, self.upload(target)).await;
            match result {
                Ok(()) => report.uploaded.push(filename),
                Err(e) => record_failure(&mut report, filename, PlannedAction::Upload, e),
            }
        }

        for target in &plan.downloads {
            let filename = target.filename.clone();
            let result = self
                .before_deadline(&filename, deadline, self.download(target))
                .await;
            match result {
                Ok(backup) => {
                    report.backups.extend(backup);
                    report.downloaded.push(filename);
                }
                Err(e) => record_failure(&mut report, filename, PlannedAction::Download, e),
            }
        }

        info!(
            uploaded = report.uploaded.len(),
            downloaded = report.downloaded.len(),
            failed = report.failures.len(),
            "Plan executed"
        );
        report
    }

    async fn before_deadline<T>(
        &self,
        filename: &Filename,
        deadline: Instant,
        action: impl std::future::Future<Output = Result<T, SaveSyncError>>,
    ) -> Result<T, SaveSyncError> {
        match tokio::time::timeout_at(deadline, action).await {
            Ok(result) => result,
            Err(_) => Err(SaveSyncError::CapabilityExpired {
                filename: filename.clone(),
            }),
        }
    }

    async fn upload(&self, target: &UploadTarget) -> Result<(), SaveSyncError> {
        let path = self.files.path_for(&target.filename);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| SaveSyncError::storage(&path, e))?;
        let size = data.len();

        with_retry(&self.retry, "upload", || {
            self.transfer.upload(&target.upload_url, data.clone())
        })
        .await?;

        debug!(filename = %target.filename, size, "Uploaded");
        Ok(())
    }

    async fn download(&self, target: &DownloadTarget) -> Result<Option<BackupEntry>, SaveSyncError> {
        let path = self.files.path_for(&target.filename);
        if matches!(checksum_file(&path).await, Ok(local) if local == target.checksum) {
            debug!(filename = %target.filename, "Local copy already matches");
            self.stamp(target, &path).await;
            return Ok(None);
        }

        let data = with_retry(&self.retry, "download", || {
            self.transfer.download(&target.download_url)
        })
        .await?;

        let actual = checksum_bytes(&data)?;
        if actual != target.checksum {
            return Err(SaveSyncError::Integrity {
                filename: target.filename.clone(),
                expected: target.checksum.clone(),
                actual,
            });
        }

        let backup = self
            .backups
            .guarded_overwrite(&target.filename, &path, &data)
            .await?;
        self.stamp(target, &path).await;

        debug!(filename = %target.filename, size = data.len(), "Downloaded");
        Ok(backup)
    }

    /// Applies the remote modification time; the content is already in place
    async fn stamp(&self, target: &DownloadTarget, path: &std::path::Path) {
        let Some(time) = target.modified_timestamp.and_then(|ts| ts.to_system_time()) else {
            return;
        };
        if let Err(e) = set_modified(path, time).await {
            warn!(filename = %target.filename, error = %e, "Could not set modification time");
        }
    }
}

fn record_failure(
    report: &mut ExecutionReport,
    filename: Filename,
    action: PlannedAction,
    error: SaveSyncError,
) {
    warn!(filename = %filename, action = ?action, error = %error, "Action failed");
    report.failures.push(ActionFailure {
        filename,
        action,
        error: error.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use savesync_core::domain::{Checksum, Timestamp};
    use tempfile::TempDir;

    use super::*;

    /// In-memory blob store keyed by capability URL
    #[derive(Default)]
    struct MemoryTransfer {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        fetches: AtomicUsize,
        stall: bool,
    }

    #[async_trait::async_trait]
    impl ITransferClient for MemoryTransfer {
        async fn upload(&self, upload_url: &str, data: Vec<u8>) -> Result<(), SaveSyncError> {
            self.objects.lock().unwrap().insert(upload_url.to_string(), data);
            Ok(())
        }

        async fn download(&self, download_url: &str) -> Result<Vec<u8>, SaveSyncError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.objects
                .lock()
                .unwrap()
                .get(download_url)
                .cloned()
                .ok_or_else(|| SaveSyncError::Transfer {
                    filename: download_url.to_string(),
                    message: "HTTP 404".into(),
                })
        }
    }

    fn name(s: &str) -> Filename {
        Filename::new(s).unwrap()
    }

    fn executor(dir: &TempDir, transfer: Arc<MemoryTransfer>) -> TransferExecutor {
        TransferExecutor::new(
            transfer,
            ManifestBuilder::new(dir.path()),
            BackupManager::new(dir.path().join(".savesync_backups"), 5),
            RetryPolicy::new(0),
        )
    }

    fn download_target(filename: &str, url: &str, data: &[u8]) -> DownloadTarget {
        DownloadTarget {
            filename: name(filename),
            download_url: url.into(),
            checksum: checksum_bytes(data).unwrap(),
            modified_timestamp: None,
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(300)
    }

    #[tokio::test]
    async fn test_download_backs_up_then_overwrites() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("persistent"), b"aaa").unwrap();
        let transfer = Arc::new(MemoryTransfer::default());
        transfer
            .objects
            .lock()
            .unwrap()
            .insert("https://s/get/persistent".into(), b"bbb".to_vec());

        let plan = PlanResponse {
            downloads: vec![download_target("persistent", "https://s/get/persistent", b"bbb")],
            ..Default::default()
        };
        let report = executor(&dir, transfer).execute(&plan, far_deadline()).await;

        assert!(report.is_success());
        assert_eq!(report.downloaded, vec![name("persistent")]);
        assert_eq!(std::fs::read(dir.path().join("persistent")).unwrap(), b"bbb");
        assert_eq!(report.backups.len(), 1);
        assert_eq!(report.backups[0].checksum, checksum_bytes(b"aaa").unwrap());
    }

    #[tokio::test]
    async fn test_repeated_download_is_skipped_and_stamped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("persistent"), b"aaa").unwrap();
        let transfer = Arc::new(MemoryTransfer::default());
        transfer
            .objects
            .lock()
            .unwrap()
            .insert("https://s/get/persistent".into(), b"bbb".to_vec());

        let remote_time = Timestamp::new(1_700_000_000.0).unwrap();
        let mut target = download_target("persistent", "https://s/get/persistent", b"bbb");
        target.modified_timestamp = Some(remote_time);
        let plan = PlanResponse {
            downloads: vec![target],
            ..Default::default()
        };
        let executor = executor(&dir, transfer.clone());

        let first = executor.execute(&plan, far_deadline()).await;
        assert_eq!(first.backups.len(), 1);
        let modified = std::fs::metadata(dir.path().join("persistent"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(Timestamp::from_system_time(modified), remote_time);

        let second = executor.execute(&plan, far_deadline()).await;
        assert!(second.is_success());
        assert!(second.backups.is_empty());
        assert_eq!(transfer.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(
            executor.backups.list(Some(&name("persistent"))).await.unwrap().len(),
            1
        );

        // The rebuilt manifest now agrees with the remote record
        let local = ManifestBuilder::new(dir.path()).build().await.unwrap();
        let record = local.get(&name("persistent")).unwrap();
        assert_eq!(record.modified_timestamp, remote_time);
        assert_eq!(record.checksum, checksum_bytes(b"bbb").unwrap());
    }

    #[tokio::test]
    async fn test_integrity_failure_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("persistent"), b"aaa").unwrap();
        let transfer = Arc::new(MemoryTransfer::default());
        transfer
            .objects
            .lock()
            .unwrap()
            .insert("https://s/get/persistent".into(), b"tampered".to_vec());

        let plan = PlanResponse {
            downloads: vec![download_target("persistent", "https://s/get/persistent", b"bbb")],
            ..Default::default()
        };
        let report = executor(&dir, transfer).execute(&plan, far_deadline()).await;

        assert!(!report.is_success());
        assert!(report.failures[0].error.contains("Integrity check failed"));
        assert_eq!(std::fs::read(dir.path().join("persistent")).unwrap(), b"aaa");
        assert!(report.backups.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_independent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("1-1-LT1.save"), b"slot").unwrap();
        let transfer = Arc::new(MemoryTransfer::default());

        let plan = PlanResponse {
            uploads: vec![
                UploadTarget {
                    filename: name("0-missing.save"),
                    upload_url: "https://s/put/0".into(),
                },
                UploadTarget {
                    filename: name("1-1-LT1.save"),
                    upload_url: "https://s/put/1".into(),
                },
            ],
            ..Default::default()
        };
        let report = executor(&dir, transfer.clone())
            .execute(&plan, far_deadline())
            .await;

        assert_eq!(report.uploaded, vec![name("1-1-LT1.save")]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].filename, name("0-missing.save"));
        assert_eq!(
            transfer.objects.lock().unwrap().get("https://s/put/1").unwrap(),
            b"slot"
        );
        assert!(report.failure_summary().unwrap().starts_with("0-missing.save: "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_abandons_action() {
        let dir = TempDir::new().unwrap();
        let transfer = Arc::new(MemoryTransfer {
            stall: true,
            ..Default::default()
        });

        let plan = PlanResponse {
            downloads: vec![DownloadTarget {
                filename: name("persistent"),
                download_url: "https://s/get/persistent".into(),
                checksum: Checksum::new("00").unwrap(),
                modified_timestamp: None,
            }],
            ..Default::default()
        };
        let deadline = Instant::now() + Duration::from_secs(300);
        let report = executor(&dir, transfer).execute(&plan, deadline).await;

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("expired"));
        assert!(!dir.path().join("persistent").exists());
    }
}
