//! Local file writes
//!
//! Every write to the save directory or the backup directory goes through
//! [`atomic_write`]: the bytes land in a hidden temporary file next to the
//! target, are flushed to disk, and only then renamed over the target. A
//! crash at any point leaves either the old file or the new one, never a
//! half-written file.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Writes `data` to `target` via temp file + fsync + rename
///
/// Creates the parent directory if needed.
#[instrument(skip(data), fields(path = %target.display(), bytes = data.len()))]
pub async fn atomic_write(target: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = temp_path_for(target);
    debug!(tmp_path = %tmp_path.display(), "writing to temporary file");

    if let Err(e) = write_synced(&tmp_path, data).await {
        discard(&tmp_path).await;
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, target).await {
        discard(&tmp_path).await;
        return Err(e);
    }

    debug!("write complete");
    Ok(())
}

/// Sets the modification time of an existing file
pub async fn set_modified(path: &Path, time: SystemTime) -> std::io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)?
            .set_modified(time)
    })
    .await
    .map_err(std::io::Error::other)?
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

async fn discard(tmp_path: &Path) {
    if let Err(e) = tokio::fs::remove_file(tmp_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %tmp_path.display(), error = %e, "failed to remove temporary file");
        }
    }
}

/// Hidden sibling of `target`, unique per call so concurrent writers never collide
fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}
