//! Integration tests for the request handler adapter
//!
//! Verifies the wire format of plan and completion calls, bearer
//! propagation, and the mapping of error statuses onto retry semantics.

use std::time::Duration;

use savesync_core::domain::PlanId;
use savesync_core::error::SaveSyncError;
use savesync_core::ports::{CompletionRequest, ISyncService, PlanRequest};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, CREDENTIAL};

fn plan_request() -> PlanRequest {
    PlanRequest {
        game_id: common::game(),
        manifest: common::manifest_with("1-1-LT1.save", "abc"),
        deletes: vec![],
    }
}

#[tokio::test]
async fn test_plan_request_round_trip() {
    let (server, service) = common::setup_service_mock().await;

    Mock::given(method("POST"))
        .and(path("/sync/plan"))
        .and(header("Authorization", format!("Bearer {CREDENTIAL}").as_str()))
        .and(body_partial_json(serde_json::json!({
            "game_id": "testgame",
            "manifest": {
                "1-1-LT1.save": {
                    "path": "1-1-LT1.save",
                    "size": 3,
                    "checksum": "abc"
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "plan_id": "5f0c7a52-96a1-4c39-9d8e-2f1f0b4d6a11",
            "uploads": [
                { "filename": "1-1-LT1.save", "upload_url": "https://store/put/1" }
            ],
            "downloads": [
                {
                    "filename": "persistent",
                    "download_url": "https://store/get/p",
                    "checksum": "def",
                    "modified_timestamp": 1700000000.5
                }
            ],
            "conflicts": [],
            "expires_in": 120
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = service
        .request_plan(CREDENTIAL, &plan_request())
        .await
        .expect("plan request failed");

    assert_eq!(response.uploads.len(), 1);
    assert_eq!(response.uploads[0].filename, common::name("1-1-LT1.save"));
    assert_eq!(response.downloads[0].checksum.as_str(), "def");
    assert_eq!(
        response.downloads[0].modified_timestamp.unwrap().as_secs_f64(),
        1700000000.5
    );
    assert_eq!(
        response.plan_id.unwrap().to_string(),
        "5f0c7a52-96a1-4c39-9d8e-2f1f0b4d6a11"
    );
    assert!(response.deletes.is_empty());
    assert_eq!(response.expires_in, 120);
    assert!(response.has_actions());
}

#[tokio::test]
async fn test_plan_response_defaults() {
    let (server, service) = common::setup_service_mock().await;

    Mock::given(method("POST"))
        .and(path("/sync/plan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let response = service.request_plan(CREDENTIAL, &plan_request()).await.unwrap();
    assert!(!response.has_actions());
    assert_eq!(response.expires_in, 300);
}

#[tokio::test]
async fn test_delete_markers_are_sent() {
    let (server, service) = common::setup_service_mock().await;

    Mock::given(method("POST"))
        .and(path("/sync/plan"))
        .and(body_partial_json(serde_json::json!({ "deletes": ["old.save"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "deletes": ["old.save"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = plan_request();
    request.deletes.push(common::name("old.save"));
    let response = service.request_plan(CREDENTIAL, &request).await.unwrap();
    assert_eq!(response.deletes, vec![common::name("old.save")]);
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication_error() {
    let (server, service) = common::setup_service_mock().await;

    Mock::given(method("POST"))
        .and(path("/sync/plan"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let err = service.request_plan(CREDENTIAL, &plan_request()).await.unwrap_err();
    assert!(err.is_authentication());
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, service) = common::setup_service_mock().await;

    Mock::given(method("POST"))
        .and(path("/sync/plan"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let err = service.request_plan(CREDENTIAL, &plan_request()).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_rate_limit_surfaces_retry_after() {
    let (server, service) = common::setup_service_mock().await;

    Mock::given(method("POST"))
        .and(path("/sync/plan"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "4"))
        .expect(1)
        .mount(&server)
        .await;

    let err = service.request_plan(CREDENTIAL, &plan_request()).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(4)));
}

#[tokio::test]
async fn test_malformed_plan_is_invalid_response() {
    let (server, service) = common::setup_service_mock().await;

    Mock::given(method("POST"))
        .and(path("/sync/plan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uploads": [{ "filename": "../escape", "upload_url": "x" }]
        })))
        .mount(&server)
        .await;

    let err = service.request_plan(CREDENTIAL, &plan_request()).await.unwrap_err();
    assert!(matches!(err, SaveSyncError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_completion_acknowledged() {
    let (server, service) = common::setup_service_mock().await;

    Mock::given(method("POST"))
        .and(path("/sync/complete"))
        .and(body_partial_json(serde_json::json!({
            "game_id": "testgame",
            "plan_id": "5f0c7a52-96a1-4c39-9d8e-2f1f0b4d6a11",
            "success": false,
            "error": "persistent: HTTP 403"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "acknowledged": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = CompletionRequest {
        game_id: common::game(),
        plan_id: Some("5f0c7a52-96a1-4c39-9d8e-2f1f0b4d6a11".parse().unwrap()),
        success: false,
        error: Some("persistent: HTTP 403".into()),
    };
    let response = service.complete(CREDENTIAL, &request).await.unwrap();
    assert!(response.acknowledged);
}

#[tokio::test]
async fn test_completion_conflict_is_rejected() {
    let (server, service) = common::setup_service_mock().await;

    Mock::given(method("POST"))
        .and(path("/sync/complete"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error": "remote manifest changed since plan"
        })))
        .mount(&server)
        .await;

    let request = CompletionRequest {
        game_id: common::game(),
        plan_id: Some(PlanId::new()),
        success: true,
        error: None,
    };
    let err = service.complete(CREDENTIAL, &request).await.unwrap_err();
    match err {
        SaveSyncError::Rejected { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "remote manifest changed since plan");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
