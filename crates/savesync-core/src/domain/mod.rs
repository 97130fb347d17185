//! Domain entities and business logic
//!
//! This module contains the core domain types for SaveSync:
//! - Newtypes for validated identifiers, filenames, checksums and timestamps
//! - File manifests describing tracked local or remote state
//! - Sync plans produced by the resolver
//! - Remote manifest records and pending (uncommitted) plans
//! - Backup entries written before destructive overwrites
//! - Domain-specific error types

pub mod backup;
pub mod errors;
pub mod manifest;
pub mod newtypes;
pub mod plan;
pub mod remote;

// Re-export commonly used types
pub use backup::BackupEntry;
pub use errors::DomainError;
pub use manifest::{FileRecord, Manifest};
pub use newtypes::*;
pub use plan::{ConflictEntry, PlannedAction, Side, SyncPlan};
pub use remote::{PendingCommit, PendingPlan, RemoteManifestRecord};
