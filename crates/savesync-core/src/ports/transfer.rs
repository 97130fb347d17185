//! Transfer port (driven/secondary port, client side)
//!
//! Moves whole-file content to and from the blob store through the
//! time-limited capabilities a plan hands out. Capabilities are opaque
//! URLs; the adapter never interprets them.

use crate::error::SaveSyncError;

/// Port trait for capability-based blob transfers
#[async_trait::async_trait]
pub trait ITransferClient: Send + Sync {
    /// Sends `data` to an upload capability, replacing any existing object
    ///
    /// Returns only after the store has accepted the full body.
    async fn upload(&self, upload_url: &str, data: Vec<u8>) -> Result<(), SaveSyncError>;

    /// Fetches the full object behind a download capability
    async fn download(&self, download_url: &str) -> Result<Vec<u8>, SaveSyncError>;
}
