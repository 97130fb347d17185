//! RemoteSyncService - ISyncService implementation over HTTP
//!
//! Wraps the [`ApiClient`] to fulfil the [`ISyncService`] port contract.
//!
//! ## Design Notes
//!
//! - The credential is passed per call; the sync manager refreshes it before
//!   each attempt, so the adapter holds no token state.
//! - Errors are converted to [`SaveSyncError`] here so that retry decisions
//!   in the client see the transient/permanent split.

use std::time::Duration;

use savesync_core::error::SaveSyncError;
use savesync_core::ports::{
    CompletionRequest, CompletionResponse, ISyncService, PlanRequest, PlanResponse,
};
use tracing::{debug, instrument};

use crate::client::ApiClient;

/// Path of the planning endpoint
pub const PLAN_PATH: &str = "/sync/plan";

/// Path of the completion endpoint
pub const COMPLETE_PATH: &str = "/sync/complete";

/// [`ISyncService`] backed by the SaveSync request handler
#[derive(Debug, Clone)]
pub struct RemoteSyncService {
    client: ApiClient,
}

impl RemoteSyncService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Builds a service for `base_url` with the given request timeout
    pub fn connect(base_url: &str, timeout: Duration) -> Result<Self, SaveSyncError> {
        Ok(Self::new(ApiClient::new(base_url, timeout)?))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl ISyncService for RemoteSyncService {
    #[instrument(skip(self, credential, request), fields(
        game_id = %request.game_id,
        files = request.manifest.len(),
        deletes = request.deletes.len()
    ))]
    async fn request_plan(
        &self,
        credential: &str,
        request: &PlanRequest,
    ) -> Result<PlanResponse, SaveSyncError> {
        let response: PlanResponse = self.client.post_json(PLAN_PATH, credential, request).await?;
        debug!(
            uploads = response.uploads.len(),
            downloads = response.downloads.len(),
            conflicts = response.conflicts.len(),
            expires_in = response.expires_in,
            "Plan received"
        );
        Ok(response)
    }

    #[instrument(skip(self, credential, request), fields(
        game_id = %request.game_id,
        success = request.success
    ))]
    async fn complete(
        &self,
        credential: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, SaveSyncError> {
        let response: CompletionResponse = self
            .client
            .post_json(COMPLETE_PATH, credential, request)
            .await?;
        debug!(acknowledged = response.acknowledged, "Completion acknowledged");
        Ok(response)
    }
}
