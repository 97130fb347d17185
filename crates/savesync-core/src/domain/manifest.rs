//! File manifests
//!
//! A [`Manifest`] maps each tracked [`Filename`] to the [`FileRecord`]
//! describing it at one point in time. Local manifests are rebuilt from disk
//! on every sync attempt; remote manifests are the server's record of the
//! last confirmed state.
//!
//! The serialized form is the wire format of plan requests:
//! `{"persistent": {"path": "persistent", "size": 100, "modified_timestamp": 1000.0, "checksum": "..."}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{Checksum, Filename, Timestamp};

/// Metadata describing one tracked file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File name relative to the save directory
    pub path: Filename,
    /// Size in bytes
    pub size: u64,
    /// Wall-clock seconds at the last local write
    pub modified_timestamp: Timestamp,
    /// Digest of the full file content
    pub checksum: Checksum,
}

impl FileRecord {
    /// Creates a new FileRecord
    pub fn new(
        path: Filename,
        size: u64,
        modified_timestamp: Timestamp,
        checksum: Checksum,
    ) -> Self {
        Self {
            path,
            size,
            modified_timestamp,
            checksum,
        }
    }

    /// Returns true if both records describe identical content
    ///
    /// Size and timestamp are bookkeeping only; the checksum decides.
    pub fn same_content(&self, other: &FileRecord) -> bool {
        self.checksum == other.checksum
    }
}

/// Mapping from filename to [`FileRecord`], ordered by filename
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    files: BTreeMap<Filename, FileRecord>,
}

impl Manifest {
    /// Creates an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a manifest from records, keyed by each record's path
    ///
    /// Later records replace earlier ones with the same path.
    pub fn from_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        let mut manifest = Self::new();
        for record in records {
            manifest.insert(record);
        }
        manifest
    }

    /// Inserts or replaces the record for `record.path`
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        self.files.insert(record.path.clone(), record)
    }

    /// Removes the record for `filename`
    pub fn remove(&mut self, filename: &Filename) -> Option<FileRecord> {
        self.files.remove(filename)
    }

    /// Looks up the record for `filename`
    pub fn get(&self, filename: &Filename) -> Option<&FileRecord> {
        self.files.get(filename)
    }

    /// Returns true if `filename` is tracked
    pub fn contains(&self, filename: &Filename) -> bool {
        self.files.contains_key(filename)
    }

    /// Number of tracked files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no files are tracked
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterates records in filename order
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    /// Iterates filenames in order
    pub fn filenames(&self) -> impl Iterator<Item = &Filename> {
        self.files.keys()
    }

    /// Checks that every entry is keyed under its own record path
    ///
    /// Manifests that arrive over the wire are keyed by the sender, so the
    /// request handler calls this before planning.
    pub fn validate(&self) -> Result<(), DomainError> {
        for (key, record) in &self.files {
            if key != &record.path {
                return Err(DomainError::ManifestKeyMismatch {
                    key: key.to_string(),
                    path: record.path.to_string(),
                });
            }
        }
        Ok(())
    }
}
