//! Backup manager
//!
//! Guarantees a durable copy of a file's current bytes exists before the
//! file is overwritten, and bounds how many copies are retained per file.
//!
//! Backups live in a hidden directory inside the save directory and are
//! named `{filename}.{YYYYmmdd_HHMMSS_micros}.backup`, so a lexical sort of
//! one file's backups is also a chronological sort.

use std::path::{Path, PathBuf};

use chrono::{SubsecRound, Utc};
use savesync_core::domain::{BackupEntry, Filename};
use savesync_core::error::SaveSyncError;
use tracing::{debug, info, instrument, warn};

use crate::filesystem::atomic_write;
use crate::manifest::{checksum_bytes, checksum_file};

/// Takes and prunes pre-overwrite backups
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
    max_per_file: usize,
}

impl BackupManager {
    /// Creates a manager storing copies in `backup_dir`
    ///
    /// `max_per_file` is clamped to at least one.
    pub fn new(backup_dir: impl Into<PathBuf>, max_per_file: usize) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            max_per_file: max_per_file.max(1),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Copies the current bytes of `source` into the backup directory
    ///
    /// Returns `None` when `source` does not exist (nothing to protect).
    /// The copy is flushed to disk before this returns.
    #[instrument(skip(self), fields(filename = %filename))]
    pub async fn backup(
        &self,
        filename: &Filename,
        source: &Path,
    ) -> Result<Option<BackupEntry>, SaveSyncError> {
        let data = match tokio::fs::read(source).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no existing file, nothing to back up");
                return Ok(None);
            }
            Err(e) => return Err(SaveSyncError::storage(source, e)),
        };

        // Backup names carry microseconds
        let taken_at = Utc::now().trunc_subsecs(6);
        let path = self
            .backup_dir
            .join(BackupEntry::file_name_for(filename, &taken_at));
        atomic_write(&path, &data)
            .await
            .map_err(|e| SaveSyncError::storage(&path, e))?;

        let entry = BackupEntry {
            filename: filename.clone(),
            taken_at,
            checksum: checksum_bytes(&data)?,
            size: data.len() as u64,
            path,
        };
        info!(checksum = %entry.checksum, size = entry.size, "Backup written");

        // Retention is advisory
        if let Err(e) = self.prune(filename).await {
            warn!(error = %e, "Backup pruning failed");
        }

        Ok(Some(entry))
    }

    /// Replaces `target` with `data`, backing up the current bytes first
    ///
    /// If the backup cannot be written the target is left untouched.
    pub async fn guarded_overwrite(
        &self,
        filename: &Filename,
        target: &Path,
        data: &[u8],
    ) -> Result<Option<BackupEntry>, SaveSyncError> {
        let entry = self.backup(filename, target).await?;
        atomic_write(target, data)
            .await
            .map_err(|e| SaveSyncError::storage(target, e))?;
        Ok(entry)
    }

    /// Lists retained backups, oldest first per filename
    ///
    /// With `filter`, only that file's backups are returned.
    pub async fn list(&self, filter: Option<&Filename>) -> Result<Vec<BackupEntry>, SaveSyncError> {
        let mut entries = Vec::new();
        for (filename, taken_at, path) in self.scan().await? {
            if filter.is_some_and(|f| f != &filename) {
                continue;
            }
            let size = tokio::fs::metadata(&path)
                .await
                .map_err(|e| SaveSyncError::storage(&path, e))?
                .len();
            let checksum = checksum_file(&path).await?;
            entries.push(BackupEntry {
                filename,
                taken_at,
                checksum,
                size,
                path,
            });
        }
        Ok(entries)
    }

    /// Deletes the oldest backups of `filename` beyond the retention count
    ///
    /// Returns how many copies were removed.
    pub async fn prune(&self, filename: &Filename) -> Result<usize, SaveSyncError> {
        let copies: Vec<PathBuf> = self
            .scan()
            .await?
            .into_iter()
            .filter(|(name, _, _)| name == filename)
            .map(|(_, _, path)| path)
            .collect();

        let excess = copies.len().saturating_sub(self.max_per_file);
        for path in &copies[..excess] {
            tokio::fs::remove_file(path)
                .await
                .map_err(|e| SaveSyncError::storage(path, e))?;
            debug!(path = %path.display(), "Pruned backup");
        }
        Ok(excess)
    }

    /// Prunes every file that has backups; returns the total removed
    pub async fn prune_all(&self) -> Result<usize, SaveSyncError> {
        let mut names: Vec<Filename> = self.scan().await?.into_iter().map(|(n, _, _)| n).collect();
        names.dedup();

        let mut removed = 0;
        for name in &names {
            removed += self.prune(name).await?;
        }
        Ok(removed)
    }

    /// Backup files on disk, sorted by (filename, timestamp)
    async fn scan(
        &self,
    ) -> Result<Vec<(Filename, chrono::DateTime<Utc>, PathBuf)>, SaveSyncError> {
        let mut dir = match tokio::fs::read_dir(&self.backup_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SaveSyncError::storage(&self.backup_dir, e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| SaveSyncError::storage(&self.backup_dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some((filename, taken_at)) = BackupEntry::parse_file_name(&name) {
                found.push((filename, taken_at, entry.path()));
            }
        }
        found.sort();
        Ok(found)
    }
}
