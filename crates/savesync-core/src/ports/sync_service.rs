//! Sync service port (driven/secondary port, client side)
//!
//! This module defines the client's view of the stateless request handler:
//! a plan request carrying the local manifest, and a completion
//! acknowledgement gating the remote manifest update.
//!
//! ## Design Notes
//!
//! - Uses [`SaveSyncError`] rather than `anyhow::Result` because the sync
//!   manager must tell transient failures from authentication failures.
//! - The request/response structs are the JSON wire format.

use serde::{Deserialize, Serialize};

use crate::domain::{Checksum, ConflictEntry, Filename, GameId, Manifest, PlanId, Timestamp};
use crate::error::SaveSyncError;

/// Capability window assumed when a plan response does not state one
pub const DEFAULT_CAPABILITY_TTL_SECS: u64 = 300;

fn default_expires_in() -> u64 {
    DEFAULT_CAPABILITY_TTL_SECS
}

// ============================================================================
// Plan request / response
// ============================================================================

/// Body of `POST /sync/plan`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Game the manifest belongs to
    pub game_id: GameId,
    /// Freshly built local manifest
    pub manifest: Manifest,
    /// Explicit delete markers; absence from `manifest` never implies deletion
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletes: Vec<Filename>,
}

/// A file to send, with the capability to send it to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub filename: Filename,
    /// Time-limited, single-use upload URL
    pub upload_url: String,
}

/// A file to fetch, with the capability to fetch it from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTarget {
    pub filename: Filename,
    /// Time-limited, single-use download URL
    pub download_url: String,
    /// Checksum the fetched bytes must have
    pub checksum: Checksum,
    /// Modification time of the remote copy, applied to the written file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_timestamp: Option<Timestamp>,
}

/// Body of a successful `POST /sync/plan` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanResponse {
    /// Identifies this plan in its completion acknowledgement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,
    #[serde(default)]
    pub uploads: Vec<UploadTarget>,
    #[serde(default)]
    pub downloads: Vec<DownloadTarget>,
    /// Informational; each entry's file also appears in uploads or downloads
    #[serde(default)]
    pub conflicts: Vec<ConflictEntry>,
    /// Files dropped from the remote manifest on commit
    #[serde(default)]
    pub deletes: Vec<Filename>,
    /// Seconds the capabilities in this response stay valid
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

impl PlanResponse {
    /// Returns true if executing the plan would change anything
    pub fn has_actions(&self) -> bool {
        !self.uploads.is_empty() || !self.downloads.is_empty() || !self.deletes.is_empty()
    }
}

// ============================================================================
// Completion acknowledgement
// ============================================================================

/// Body of `POST /sync/complete`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub game_id: GameId,
    /// The `plan_id` of the plan response being acknowledged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,
    /// True only if every planned action succeeded
    pub success: bool,
    /// Summary of what failed, when `success` is false
    pub error: Option<String>,
}

/// Body of a successful `POST /sync/complete` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub acknowledged: bool,
}

// ============================================================================
// ISyncService trait
// ============================================================================

/// Port trait for the remote sync request handler
///
/// `credential` is the opaque bearer token attached to every request.
#[async_trait::async_trait]
pub trait ISyncService: Send + Sync {
    /// Requests a plan reconciling `request.manifest` with the last confirmed remote state
    async fn request_plan(
        &self,
        credential: &str,
        request: &PlanRequest,
    ) -> Result<PlanResponse, SaveSyncError>;

    /// Reports whether the last plan was executed successfully
    async fn complete(
        &self,
        credential: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, SaveSyncError>;
}
