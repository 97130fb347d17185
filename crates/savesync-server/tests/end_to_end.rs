//! Client service talking to a live request handler over loopback

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use savesync_api::provider::RemoteSyncService;
use savesync_core::domain::{Checksum, FileRecord, Filename, GameId, Manifest, Timestamp};
use savesync_core::ports::{CompletionRequest, ISyncService, PlanRequest, PlanResponse};
use savesync_server::{http, GatewayClaimsValidator, HmacCapabilityIssuer, SyncHandler};
use savesync_store::{DatabasePool, SqliteManifestStore};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct Running {
    base_url: String,
    shutdown: CancellationToken,
}

impl Drop for Running {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start() -> Running {
    let pool = DatabasePool::in_memory().await.unwrap();
    let handler = Arc::new(SyncHandler::new(
        Arc::new(SqliteManifestStore::new(pool.pool().clone())),
        Arc::new(
            HmacCapabilityIssuer::new("https://store.example.com/saves", b"0123456789abcdef".to_vec())
                .unwrap(),
        ),
        Arc::new(GatewayClaimsValidator::new()),
        Duration::from_secs(120),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = CancellationToken::new();
    tokio::spawn(http::serve(listener, handler, shutdown.clone()));

    Running { base_url, shutdown }
}

fn credential(sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": sub }).to_string());
    format!("{header}.{payload}.sig")
}

fn game() -> GameId {
    GameId::new("testgame").unwrap()
}

fn manifest(entries: &[(&str, &str, f64)]) -> Manifest {
    Manifest::from_records(entries.iter().map(|(n, c, t)| {
        FileRecord::new(
            Filename::new(*n).unwrap(),
            3,
            Timestamp::new(*t).unwrap(),
            Checksum::new(*c).unwrap(),
        )
    }))
}

fn request(m: Manifest) -> PlanRequest {
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
        error: (!success).then(|| "upload failed".to_string()),
    }
}

#[tokio::test]
async fn test_two_devices_converge() {
    let server = start().await;
    let service = RemoteSyncService::connect(&server.base_url, Duration::from_secs(5)).unwrap();
    let alice = credential("alice");

    // Device A pushes its save
    let plan = service
        .request_plan(&alice, &request(manifest(&[("persistent", "aaa", 100.0)])))
        .await
        .unwrap();
    assert_eq!(plan.uploads.len(), 1);
    assert_eq!(plan.expires_in, 120);
    assert!(plan.uploads[0].upload_url.contains("/saves/users/alice/games/testgame/persistent?op=put"));
    assert!(service.complete(&alice, &ack(&plan, true)).await.unwrap().acknowledged);
    // A retried acknowledgement is still accepted
    assert!(service.complete(&alice, &ack(&plan, true)).await.unwrap().acknowledged);

    // Device B has nothing locally and is told to download it
    let plan = service.request_plan(&alice, &request(Manifest::new())).await.unwrap();
    assert!(plan.uploads.is_empty());
    assert_eq!(plan.downloads.len(), 1);
    assert_eq!(plan.downloads[0].checksum.as_str(), "aaa");
    assert!(plan.downloads[0].download_url.contains("op=get"));
    assert_eq!(
        plan.downloads[0].modified_timestamp,
        Some(Timestamp::new(100.0).unwrap())
    );
}

#[tokio::test]
async fn test_failed_ack_leaves_remote_untouched() {
    let server = start().await;
    let service = RemoteSyncService::connect(&server.base_url, Duration::from_secs(5)).unwrap();
    let bob = credential("bob");

    let failed = service
        .request_plan(&bob, &request(manifest(&[("persistent", "aaa", 100.0)])))
        .await
        .unwrap();
    service.complete(&bob, &ack(&failed, false)).await.unwrap();

    // Nothing was committed, so the same manifest still needs uploading
    let plan = service
        .request_plan(&bob, &request(manifest(&[("persistent", "aaa", 100.0)])))
        .await
        .unwrap();
    assert_eq!(plan.uploads.len(), 1);

    // The discarded plan can no longer be committed
    let err = service.complete(&bob, &ack(&failed, true)).await.unwrap_err();
    assert!(matches!(
        err,
        savesync_core::error::SaveSyncError::Rejected { status: 409, .. }
    ));
}

#[tokio::test]
async fn test_bad_credential_is_authentication_error() {
    let server = start().await;
    let service = RemoteSyncService::connect(&server.base_url, Duration::from_secs(5)).unwrap();

    let err = service
        .request_plan("not-a-jwt", &request(Manifest::new()))
        .await
        .unwrap_err();
    assert!(err.is_authentication());
}
