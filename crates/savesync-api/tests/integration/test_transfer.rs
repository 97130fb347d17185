//! Integration tests for capability-based transfers

use savesync_api::transfer::HttpTransferClient;
use savesync_core::error::SaveSyncError;
use savesync_core::ports::ITransferClient;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_upload_puts_octet_stream() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/users/u1/games/testgame/persistent"))
        .and(query_param("op", "put"))
        .and(header("Content-Type", "application/octet-stream"))
        .and(body_bytes(b"save-bytes".to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!(
        "{}/users/u1/games/testgame/persistent?op=put&expires=9999999999&signature=ab",
        server.uri()
    );
    HttpTransferClient::default()
        .upload(&url, b"save-bytes".to_vec())
        .await
        .expect("upload failed");
}

#[tokio::test]
async fn test_download_returns_bytes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/u1/games/testgame/1-1-LT1.save"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"bbb".to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(&server)
        .await;

    let url = format!("{}/users/u1/games/testgame/1-1-LT1.save?op=get", server.uri());
    let data = HttpTransferClient::default().download(&url).await.unwrap();
    assert_eq!(data, b"bbb");
}

#[tokio::test]
async fn test_expired_capability_is_not_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": "capability expired"
        })))
        .mount(&server)
        .await;

    let url = format!("{}/users/u1/games/testgame/persistent?op=get", server.uri());
    let err = HttpTransferClient::default().download(&url).await.unwrap_err();
    assert!(!err.is_transient());
    match err {
        SaveSyncError::Transfer { filename, message } => {
            assert_eq!(filename, "persistent");
            assert!(message.contains("capability expired"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_store_outage_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = format!("{}/users/u1/games/testgame/persistent", server.uri());
    let err = HttpTransferClient::default()
        .upload(&url, vec![1, 2, 3])
        .await
        .unwrap_err();
    assert!(err.is_transient());
}
