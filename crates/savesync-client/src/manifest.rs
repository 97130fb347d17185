//! Manifest builder
//!
//! Scans the save directory and describes the two tracked slots: the
//! persistent data file and the most recently modified save file.
//!
//! ## Tracking rules
//!
//! - `persistent` is tracked whenever it exists as a regular file.
//! - Save files are non-hidden regular files ending in `.save`; only the
//!   newest by mtime is tracked, ties going to the larger filename.
//! - Hidden entries (including the backup directory) are never tracked.
//! - A missing directory or a file vanishing mid-scan is not an error.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use savesync_core::domain::{Checksum, FileRecord, Filename, Manifest, Timestamp};
use savesync_core::error::SaveSyncError;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

/// Name of the persistent data file
pub const PERSISTENT_FILENAME: &str = "persistent";

/// Suffix identifying save slot files
pub const SAVE_SUFFIX: &str = ".save";

const READ_CHUNK_SIZE: usize = 8192;

/// Builds manifests for one save directory
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    save_dir: PathBuf,
}

impl ManifestBuilder {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
        }
    }

    /// The directory being scanned
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Location of a tracked file inside the save directory
    pub fn path_for(&self, filename: &Filename) -> PathBuf {
        self.save_dir.join(filename.as_str())
    }

    /// Builds a fresh manifest of the tracked files
    ///
    /// # Errors
    ///
    /// Fails with `Storage` if the directory or a tracked file cannot be read.
    #[instrument(skip(self), fields(save_dir = %self.save_dir.display()))]
    pub async fn build(&self) -> Result<Manifest, SaveSyncError> {
        let mut entries = match tokio::fs::read_dir(&self.save_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("save directory missing, empty manifest");
                return Ok(Manifest::new());
            }
            Err(e) => return Err(SaveSyncError::storage(&self.save_dir, e)),
        };

        let mut persistent = false;
        let mut newest_save: Option<(SystemTime, String)> = None;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SaveSyncError::storage(&self.save_dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }

            if name == PERSISTENT_FILENAME {
                persistent = true;
            } else if is_save_file(&name) {
                let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                    Ok(modified) => modified,
                    Err(e) => return Err(SaveSyncError::storage(entry.path(), e)),
                };
                let newer = match &newest_save {
                    None => true,
                    Some((best_time, best_name)) => {
                        (modified, name.as_str()) > (*best_time, best_name.as_str())
                    }
                };
                if newer {
                    newest_save = Some((modified, name));
                }
            }
        }

        let mut tracked = Vec::with_capacity(2);
        if persistent {
            tracked.push(PERSISTENT_FILENAME.to_string());
        }
        if let Some((_, name)) = newest_save {
            tracked.push(name);
        }

        let mut manifest = Manifest::new();
        for name in tracked {
            let Ok(filename) = Filename::new(name.clone()) else {
                debug!(name = %name, "skipping file with unsupported name");
                continue;
            };
            if let Some(record) = self.record_for(&filename).await? {
                manifest.insert(record);
            }
        }

        debug!(files = manifest.len(), "manifest built");
        Ok(manifest)
    }

    /// Describes one file, or `None` if it no longer exists
    async fn record_for(&self, filename: &Filename) -> Result<Option<FileRecord>, SaveSyncError> {
        let path = self.path_for(filename);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SaveSyncError::storage(path, e)),
        };
        let modified = metadata
            .modified()
            .map_err(|e| SaveSyncError::storage(&path, e))?;

        let checksum = match checksum_file(&path).await {
            Ok(checksum) => checksum,
            Err(SaveSyncError::Storage { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        Ok(Some(FileRecord::new(
            filename.clone(),
            metadata.len(),
            Timestamp::from_system_time(modified),
            checksum,
        )))
    }
}

fn is_save_file(name: &str) -> bool {
    name.len() > SAVE_SUFFIX.len() && name.ends_with(SAVE_SUFFIX)
}

/// Streams a file through SHA-256
pub async fn checksum_file(path: &Path) -> Result<Checksum, SaveSyncError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| SaveSyncError::storage(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| SaveSyncError::storage(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Checksum::new(format!("{:x}", hasher.finalize()))?)
}

/// SHA-256 of an in-memory buffer, lowercase hex
pub fn checksum_bytes(data: &[u8]) -> Result<Checksum, SaveSyncError> {
    Ok(Checksum::new(format!("{:x}", Sha256::digest(data)))?)
}
