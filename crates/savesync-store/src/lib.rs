//! SaveSync Store - Remote manifest persistence
//!
//! SQLite-based storage for the request handler:
//! - Confirmed manifest records, versioned for compare-and-swap commits
//! - Pending plan proposals awaiting a completion acknowledgement
//!
//! ## Architecture
//!
//! This crate implements the `IManifestStore` port from `savesync-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use savesync_store::{DatabasePool, SqliteManifestStore};
//!
//! # async fn example() -> Result<(), savesync_store::DatabaseError> {
//! let pool = DatabasePool::new(Path::new("/var/lib/savesync/manifests.db")).await?;
//! let store = SqliteManifestStore::new(pool.pool().clone());
//! // Use store as IManifestStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteManifestStore;

/// Errors that can occur while opening the database
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}
