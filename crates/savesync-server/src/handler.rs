//! Request handlers for the sync endpoints
//!
//! The handler is stateless between requests: everything durable lives in
//! the [`IManifestStore`]. A plan request computes the plan against the
//! confirmed record, stores the resulting manifest as pending under a fresh
//! [`PlanId`], and hands out capabilities. Only a success acknowledgement
//! naming that id turns the pending manifest into the record, by
//! compare-and-swap on the version the plan was based on.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use savesync_core::domain::{
    AccountId, GameId, PendingCommit, PendingPlan, PlanId, RemoteManifestRecord,
};
use savesync_core::ports::{
    object_key, CapabilityOp, CompletionRequest, CompletionResponse, DownloadTarget,
    ICapabilityIssuer, ICredentialValidator, IManifestStore, PlanRequest, PlanResponse,
    UploadTarget,
};
use savesync_plan::PlanResolver;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::ServerError;

/// Body of `POST /sync/delete`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDataRequest {
    pub game_id: GameId,
}

/// Response of `POST /sync/delete`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDataResponse {
    /// True if a confirmed record existed
    pub deleted: bool,
}

/// Handles plan, completion and data deletion requests
pub struct SyncHandler {
    store: Arc<dyn IManifestStore + Send + Sync>,
    issuer: Arc<dyn ICapabilityIssuer + Send + Sync>,
    credentials: Arc<dyn ICredentialValidator + Send + Sync>,
    capability_ttl: Duration,
}

impl SyncHandler {
    pub fn new(
        store: Arc<dyn IManifestStore + Send + Sync>,
        issuer: Arc<dyn ICapabilityIssuer + Send + Sync>,
        credentials: Arc<dyn ICredentialValidator + Send + Sync>,
        capability_ttl: Duration,
    ) -> Self {
        Self {
            store,
            issuer,
            credentials,
            capability_ttl,
        }
    }

    fn account(&self, bearer: &str) -> Result<AccountId, ServerError> {
        Ok(self.credentials.account_for(bearer)?)
    }

    /// Handles `POST /sync/plan`
    #[instrument(skip(self, bearer, request), fields(game_id = %request.game_id))]
    pub async fn plan(&self, bearer: &str, request: PlanRequest) -> Result<PlanResponse, ServerError> {
        // Step 1: Identify the caller and check the manifest
        let account = self.account(bearer)?;
        request.manifest.validate()?;

        // Step 2: Resolve against the confirmed record
        let record = self
            .store
            .get_record(&account, &request.game_id)
            .await?
            .unwrap_or_else(|| RemoteManifestRecord::absent(account.clone(), request.game_id.clone()));
        let plan = PlanResolver::resolve(&request.manifest, &record.manifest, &request.deletes);

        // Step 3: Remember what the record becomes if the client succeeds.
        // A plan without actions is never acknowledged.
        let plan_id = PlanId::new();
        if plan.has_actions() {
            let proposed =
                PlanResolver::proposed_manifest(&request.manifest, &record.manifest, &plan);
            self.store
                .save_pending(&PendingPlan {
                    plan_id,
                    account_id: account.clone(),
                    game_id: request.game_id.clone(),
                    base_version: record.version,
                    proposed,
                    created_at: Utc::now(),
                })
                .await?;
        }

        // Step 4: Issue capabilities
        let mut uploads = Vec::with_capacity(plan.uploads.len());
        for filename in &plan.uploads {
            let key = object_key(&account, &request.game_id, filename);
            uploads.push(UploadTarget {
                filename: filename.clone(),
                upload_url: self.issue(CapabilityOp::Put, &key)?,
            });
        }

        let mut downloads = Vec::with_capacity(plan.downloads.len());
        for filename in &plan.downloads {
            let remote = record.manifest.get(filename).ok_or_else(|| {
                ServerError::Internal(format!("planned download of {filename} has no remote record"))
            })?;
            let key = object_key(&account, &request.game_id, filename);
            downloads.push(DownloadTarget {
                filename: filename.clone(),
                download_url: self.issue(CapabilityOp::Get, &key)?,
                checksum: remote.checksum.clone(),
                modified_timestamp: Some(remote.modified_timestamp),
            });
        }

        info!(
            account = %account,
            plan_id = %plan_id,
            base_version = %record.version,
            uploads = uploads.len(),
            downloads = downloads.len(),
            conflicts = plan.conflicts.len(),
            deletes = plan.deletes.len(),
            "Plan issued"
        );

        Ok(PlanResponse {
            plan_id: Some(plan_id),
            uploads,
            downloads,
            conflicts: plan.conflicts,
            deletes: plan.deletes,
            expires_in: self.capability_ttl.as_secs(),
        })
    }

    /// Handles `POST /sync/complete`
    ///
    /// A failure acknowledgement discards the named plan. A success
    /// acknowledgement commits it; repeating one whose first delivery
    /// already committed reports success again. A success acknowledgement
    /// for a plan that is no longer pending is a conflict.
    #[instrument(skip(self, bearer, request), fields(
        game_id = %request.game_id,
        success = request.success
    ))]
    pub async fn complete(
        &self,
        bearer: &str,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ServerError> {
        let account = self.account(bearer)?;
        let plan_id = request
            .plan_id
            .ok_or_else(|| ServerError::InvalidRequest("plan_id is required".into()))?;

        if !request.success {
            let discarded = self
                .store
                .discard_pending(&account, &request.game_id, plan_id)
                .await?;
            info!(
                account = %account,
                plan_id = %plan_id,
                discarded,
                error = request.error.as_deref().unwrap_or("unspecified"),
                "Client reported failure; pending plan discarded"
            );
            return Ok(CompletionResponse { acknowledged: true });
        }

        match self
            .store
            .commit_pending(&account, &request.game_id, plan_id)
            .await?
        {
            PendingCommit::Committed(version) => {
                info!(account = %account, plan_id = %plan_id, version = %version, "Sync confirmed");
            }
            PendingCommit::AlreadyCommitted(version) => {
                info!(account = %account, plan_id = %plan_id, version = %version, "Repeated acknowledgement");
            }
            PendingCommit::Unknown => {
                warn!(account = %account, plan_id = %plan_id, "Acknowledgement for a plan that is not pending");
                return Err(ServerError::Conflict(format!(
                    "plan {plan_id} is not pending; request a new plan"
                )));
            }
        }
        Ok(CompletionResponse { acknowledged: true })
    }

    /// Handles `POST /sync/delete`: drops every record of the caller's game
    #[instrument(skip(self, bearer, request), fields(game_id = %request.game_id))]
    pub async fn delete_data(
        &self,
        bearer: &str,
        request: DeleteDataRequest,
    ) -> Result<DeleteDataResponse, ServerError> {
        let account = self.account(bearer)?;
        let deleted = self.store.delete_game_data(&account, &request.game_id).await?;
        Ok(DeleteDataResponse { deleted })
    }

    fn issue(&self, op: CapabilityOp, key: &str) -> Result<String, ServerError> {
        self.issuer
            .issue(op, key, self.capability_ttl)
            .map_err(|e| ServerError::Internal(format!("capability for {key}: {e:#}")))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use savesync_core::domain::{
        Checksum, FileRecord, Filename, Manifest, ManifestVersion, Timestamp,
    };
    use savesync_core::error::StoreError;
    use savesync_store::{DatabasePool, SqliteManifestStore};

    use super::*;
    use crate::capability::HmacCapabilityIssuer;
    use crate::credentials::tests::jwt;
    use crate::credentials::GatewayClaimsValidator;

    fn handler_with(store: Arc<dyn IManifestStore + Send + Sync>) -> SyncHandler {
        SyncHandler::new(
            store,
            Arc::new(
                HmacCapabilityIssuer::new("https://store.example.com/saves", b"0123456789abcdef".to_vec())
                    .unwrap(),
            ),
            Arc::new(GatewayClaimsValidator::new()),
            Duration::from_secs(300),
        )
    }

    async fn sqlite_store() -> SqliteManifestStore {
        let pool = DatabasePool::in_memory().await.unwrap();
        SqliteManifestStore::new(pool.pool().clone())
    }

    pub(crate) async fn handler() -> SyncHandler {
        handler_with(Arc::new(sqlite_store().await))
    }

    pub(crate) fn bearer(sub: &str) -> String {
        jwt(serde_json::json!({ "sub": sub }))
    }

    fn alice_id() -> AccountId {
        AccountId::new("alice").unwrap()
    }

    fn game() -> GameId {
        GameId::new("testgame").unwrap()
    }

    fn name(s: &str) -> Filename {
        Filename::new(s).unwrap()
    }

    fn manifest(entries: &[(&str, &str, f64)]) -> Manifest {
        Manifest::from_records(entries.iter().map(|(n, c, t)| {
            FileRecord::new(name(n), 3, Timestamp::new(*t).unwrap(), Checksum::new(*c).unwrap())
        }))
    }

    fn plan_request(m: Manifest) -> PlanRequest {
        PlanRequest {
            game_id: game(),
            manifest: m,
            deletes: vec![],
        }
    }

    fn ack(plan: &PlanResponse, success: bool) -> CompletionRequest {
        CompletionRequest {
            game_id: game(),
            plan_id: plan.plan_id,
            success,
            error: (!success).then(|| "persistent: HTTP 403".to_string()),
        }
    }

    async fn record(handler: &SyncHandler) -> Option<RemoteManifestRecord> {
        handler.store.get_record(&alice_id(), &game()).await.unwrap()
    }

    /// Store whose first `commit_pending` fails like a busy database
    struct FlakyCommitStore {
        inner: SqliteManifestStore,
        failed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl IManifestStore for FlakyCommitStore {
        async fn get_record(
            &self,
            account: &AccountId,
            game: &GameId,
        ) -> Result<Option<RemoteManifestRecord>, StoreError> {
            self.inner.get_record(account, game).await
        }

        async fn commit(
            &self,
            account: &AccountId,
            game: &GameId,
            expected: ManifestVersion,
            manifest: &Manifest,
        ) -> Result<ManifestVersion, StoreError> {
            self.inner.commit(account, game, expected, manifest).await
        }

        async fn save_pending(&self, plan: &PendingPlan) -> Result<(), StoreError> {
            self.inner.save_pending(plan).await
        }

        async fn get_pending(
            &self,
            account: &AccountId,
            game: &GameId,
            plan_id: PlanId,
        ) -> Result<Option<PendingPlan>, StoreError> {
            self.inner.get_pending(account, game, plan_id).await
        }

        async fn commit_pending(
            &self,
            account: &AccountId,
            game: &GameId,
            plan_id: PlanId,
        ) -> Result<PendingCommit, StoreError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(StoreError::Backend("database is locked".into()));
            }
            self.inner.commit_pending(account, game, plan_id).await
        }

        async fn discard_pending(
            &self,
            account: &AccountId,
            game: &GameId,
            plan_id: PlanId,
        ) -> Result<bool, StoreError> {
            self.inner.discard_pending(account, game, plan_id).await
        }

        async fn delete_game_data(
            &self,
            account: &AccountId,
            game: &GameId,
        ) -> Result<bool, StoreError> {
            self.inner.delete_game_data(account, game).await
        }
    }

    #[tokio::test]
    async fn test_first_sync_uploads_and_commits_on_success() {
        let handler = handler().await;
        let alice = bearer("alice");
        let local = manifest(&[("persistent", "aaa", 100.0), ("1-1-LT1.save", "bbb", 200.0)]);

        let response = handler.plan(&alice, plan_request(local.clone())).await.unwrap();
        assert!(response.plan_id.is_some());
        assert_eq!(response.uploads.len(), 2);
        assert!(response.downloads.is_empty());
        assert_eq!(response.expires_in, 300);
        assert!(response.uploads[0]
            .upload_url
            .starts_with("https://store.example.com/saves/users/alice/games/testgame/"));

        // Planning alone changes nothing
        let replay = handler.plan(&alice, plan_request(local.clone())).await.unwrap();
        assert_eq!(replay.uploads.len(), 2);
        assert_ne!(replay.plan_id, response.plan_id);

        handler.complete(&alice, ack(&replay, true)).await.unwrap();

        let after = handler.plan(&alice, plan_request(local)).await.unwrap();
        assert!(!after.has_actions());
    }

    #[tokio::test]
    async fn test_second_device_downloads_with_declared_checksum() {
        let handler = handler().await;
        let alice = bearer("alice");

        let first = handler
            .plan(&alice, plan_request(manifest(&[("persistent", "bbb", 200.0)])))
            .await
            .unwrap();
        handler.complete(&alice, ack(&first, true)).await.unwrap();

        let older = manifest(&[("persistent", "aaa", 100.0)]);
        let response = handler.plan(&alice, plan_request(older)).await.unwrap();
        assert!(response.uploads.is_empty());
        assert_eq!(response.downloads.len(), 1);
        assert_eq!(response.downloads[0].checksum.as_str(), "bbb");
        assert_eq!(
            response.downloads[0].modified_timestamp,
            Some(Timestamp::new(200.0).unwrap())
        );
        assert!(response.downloads[0].download_url.contains("op=get"));
    }

    #[tokio::test]
    async fn test_failure_ack_discards_pending_plan() {
        let handler = handler().await;
        let alice = bearer("alice");
        let local = manifest(&[("persistent", "aaa", 100.0)]);

        let response = handler.plan(&alice, plan_request(local.clone())).await.unwrap();
        handler.complete(&alice, ack(&response, false)).await.unwrap();

        // Nothing was committed, so the upload is planned again
        let again = handler.plan(&alice, plan_request(local)).await.unwrap();
        assert_eq!(again.uploads.len(), 1);

        // The discarded plan cannot be revived by a late success
        let err = handler.complete(&alice, ack(&response, true)).await.unwrap_err();
        assert!(matches!(err, ServerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_interleaved_devices_commit_only_their_own_plan() {
        let handler = handler().await;
        let alice = bearer("alice");

        let device_a = handler
            .plan(&alice, plan_request(manifest(&[("1-1-A.save", "aaa", 100.0)])))
            .await
            .unwrap();
        let device_b = handler
            .plan(&alice, plan_request(manifest(&[("2-1-B.save", "bbb", 200.0)])))
            .await
            .unwrap();
        assert_eq!(device_a.uploads[0].filename, name("1-1-A.save"));
        assert_eq!(device_b.uploads[0].filename, name("2-1-B.save"));

        handler.complete(&alice, ack(&device_a, true)).await.unwrap();
        handler.complete(&alice, ack(&device_b, false)).await.unwrap();

        let record = record(&handler).await.unwrap();
        assert!(record.manifest.contains(&name("1-1-A.save")));
        assert!(!record.manifest.contains(&name("2-1-B.save")));
        assert_eq!(record.version, ManifestVersion::new(1));
    }

    #[tokio::test]
    async fn test_lost_commit_race_is_conflict() {
        let handler = handler().await;
        let alice = bearer("alice");

        // Both devices plan against the empty record; B acknowledges first
        let device_a = handler
            .plan(&alice, plan_request(manifest(&[("persistent", "aaa", 100.0)])))
            .await
            .unwrap();
        let device_b = handler
            .plan(&alice, plan_request(manifest(&[("persistent", "bbb", 200.0)])))
            .await
            .unwrap();
        handler.complete(&alice, ack(&device_b, true)).await.unwrap();

        let err = handler.complete(&alice, ack(&device_a, true)).await.unwrap_err();
        assert!(matches!(err, ServerError::Conflict(_)));

        let record = record(&handler).await.unwrap();
        assert_eq!(record.version, ManifestVersion::new(1));
        assert_eq!(
            record.manifest.get(&name("persistent")).unwrap().checksum.as_str(),
            "bbb"
        );
    }

    #[tokio::test]
    async fn test_failed_commit_can_be_acknowledged_again() {
        let handler = handler_with(Arc::new(FlakyCommitStore {
            inner: sqlite_store().await,
            failed: AtomicBool::new(false),
        }));
        let alice = bearer("alice");

        let response = handler
            .plan(&alice, plan_request(manifest(&[("persistent", "aaa", 100.0)])))
            .await
            .unwrap();

        let err = handler.complete(&alice, ack(&response, true)).await.unwrap_err();
        assert!(matches!(err, ServerError::Internal(_)));
        assert!(record(&handler).await.is_none());

        let retried = handler.complete(&alice, ack(&response, true)).await.unwrap();
        assert!(retried.acknowledged);
        assert_eq!(record(&handler).await.unwrap().version, ManifestVersion::new(1));
    }

    #[tokio::test]
    async fn test_repeated_success_ack_is_idempotent() {
        let handler = handler().await;
        let alice = bearer("alice");
        let response = handler
            .plan(&alice, plan_request(manifest(&[("persistent", "aaa", 100.0)])))
            .await
            .unwrap();

        handler.complete(&alice, ack(&response, true)).await.unwrap();
        let again = handler.complete(&alice, ack(&response, true)).await.unwrap();
        assert!(again.acknowledged);
        assert_eq!(record(&handler).await.unwrap().version, ManifestVersion::new(1));
    }

    #[tokio::test]
    async fn test_ack_for_unknown_plan() {
        let handler = handler().await;
        let alice = bearer("alice");
        let unknown = PlanResponse {
            plan_id: Some(PlanId::new()),
            ..Default::default()
        };

        let err = handler.complete(&alice, ack(&unknown, true)).await.unwrap_err();
        assert!(matches!(err, ServerError::Conflict(_)));

        // A failure report has nothing to undo
        let response = handler.complete(&alice, ack(&unknown, false)).await.unwrap();
        assert!(response.acknowledged);
    }

    #[tokio::test]
    async fn test_ack_without_plan_id_is_invalid() {
        let handler = handler().await;
        let err = handler
            .complete(&bearer("alice"), ack(&PlanResponse::default(), true))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_plan_without_actions_stores_nothing() {
        let handler = handler().await;
        let response = handler
            .plan(&bearer("alice"), plan_request(Manifest::new()))
            .await
            .unwrap();
        assert!(!response.has_actions());

        let pending = handler
            .store
            .get_pending(&alice_id(), &game(), response.plan_id.unwrap())
            .await
            .unwrap();
        assert!(pending.is_none());
    }

    #[tokio::test]
    async fn test_delete_markers_drop_remote_files() {
        let handler = handler().await;
        let alice = bearer("alice");
        let first = handler
            .plan(
                &alice,
                plan_request(manifest(&[("persistent", "aaa", 100.0), ("old.save", "ccc", 50.0)])),
            )
            .await
            .unwrap();
        handler.complete(&alice, ack(&first, true)).await.unwrap();

        let mut request = plan_request(manifest(&[("persistent", "aaa", 100.0)]));
        request.deletes = vec![name("old.save"), name("never-synced.save")];
        let response = handler.plan(&alice, request).await.unwrap();
        assert_eq!(response.deletes, vec![name("old.save")]);
        assert!(response.downloads.is_empty());
        handler.complete(&alice, ack(&response, true)).await.unwrap();

        let after = handler
            .plan(&alice, plan_request(manifest(&[("persistent", "aaa", 100.0)])))
            .await
            .unwrap();
        assert!(!after.has_actions());
    }

    #[tokio::test]
    async fn test_accounts_are_isolated() {
        let handler = handler().await;
        let response = handler
            .plan(&bearer("alice"), plan_request(manifest(&[("persistent", "aaa", 100.0)])))
            .await
            .unwrap();
        handler.complete(&bearer("alice"), ack(&response, true)).await.unwrap();

        let response = handler.plan(&bearer("bob"), plan_request(Manifest::new())).await.unwrap();
        assert!(!response.has_actions());
    }

    #[tokio::test]
    async fn test_bad_credential_is_unauthorized() {
        let handler = handler().await;
        let err = handler
            .plan("garbage", plan_request(Manifest::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_delete_data() {
        let handler = handler().await;
        let alice = bearer("alice");
        let response = handler
            .plan(&alice, plan_request(manifest(&[("persistent", "aaa", 100.0)])))
            .await
            .unwrap();
        handler.complete(&alice, ack(&response, true)).await.unwrap();

        let response = handler
            .delete_data(&alice, DeleteDataRequest { game_id: game() })
            .await
            .unwrap();
        assert!(response.deleted);

        let again = handler
            .delete_data(&alice, DeleteDataRequest { game_id: game() })
            .await
            .unwrap();
        assert!(!again.deleted);
    }
}
