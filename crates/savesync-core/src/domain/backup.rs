//! Backup entries
//!
//! A [`BackupEntry`] describes one retained copy of a file's content taken
//! immediately before a destructive overwrite.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{Checksum, Filename};

/// Timestamp format embedded in backup file names (sortable, microsecond precision)
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// File extension of backup copies
pub const BACKUP_EXTENSION: &str = "backup";

/// A retained pre-overwrite copy of a tracked file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// The file that was about to be overwritten
    pub filename: Filename,
    /// When the overwrite was prepared
    pub taken_at: DateTime<Utc>,
    /// Checksum of the backed-up bytes
    pub checksum: Checksum,
    /// Size of the backed-up bytes
    pub size: u64,
    /// Location of the copy on disk
    pub path: PathBuf,
}

impl BackupEntry {
    /// File name of the backup copy: `{filename}.{timestamp}.backup`
    pub fn file_name_for(filename: &Filename, taken_at: &DateTime<Utc>) -> String {
        format!(
            "{}.{}.{}",
            filename,
            taken_at.format(BACKUP_TIMESTAMP_FORMAT),
            BACKUP_EXTENSION
        )
    }

    /// Parses a backup file name back into its filename and timestamp
    ///
    /// Returns `None` for names that were not produced by [`BackupEntry::file_name_for`].
    pub fn parse_file_name(name: &str) -> Option<(Filename, DateTime<Utc>)> {
        let rest = name.strip_suffix(BACKUP_EXTENSION)?.strip_suffix('.')?;
        let (original, stamp) = rest.rsplit_once('.')?;
        let taken_at = chrono::NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT)
            .ok()?
            .and_utc();
        let filename = Filename::new(original).ok()?;
        Some((filename, taken_at))
    }
}
