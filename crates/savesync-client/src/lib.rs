//! SaveSync Client - Client-side sync orchestration
//!
//! Provides:
//! - Manifest building over the tracked save slots
//! - Throttled start, bounded quit and forced sync entry points
//! - Capability-based transfers with integrity verification
//! - Pre-overwrite backups with bounded retention
//!
//! ## Modules
//!
//! - [`engine`] - [`SyncManager`] and [`SyncOutcome`]
//! - [`executor`] - Upload/download execution against a plan response
//! - [`manifest`] - Local manifest building and SHA-256 checksums
//! - [`backup`] - Backup-before-overwrite and retention
//! - [`throttle`] - Persisted last-attempt clock
//! - [`retry`] - Exponential backoff for transient failures
//! - [`filesystem`] - Atomic writes

pub mod backup;
pub mod engine;
pub mod executor;
pub mod filesystem;
pub mod manifest;
pub mod retry;
pub mod throttle;

pub use backup::BackupManager;
pub use engine::{SyncManager, SyncOutcome, SyncStatus};
pub use executor::{ExecutionReport, TransferExecutor};
pub use manifest::ManifestBuilder;
pub use retry::RetryPolicy;
pub use throttle::{SyncMode, ThrottleController};
