//! Integration tests for the Cognito-style identity provider

use savesync_core::error::SaveSyncError;
use savesync_core::ports::IIdentityProvider;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_login_uses_password_flow() {
    let (server, provider) = common::setup_identity_mock().await;

    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AWSCognitoIdentityProviderService.InitiateAuth",
        ))
        .and(header("Content-Type", "application/x-amz-json-1.1"))
        .and(body_partial_json(serde_json::json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": "client-123",
            "AuthParameters": { "USERNAME": "ana", "PASSWORD": "hunter2" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "AuthenticationResult": {
                "AccessToken": "access-1",
                "IdToken": "id-1",
                "RefreshToken": "refresh-1",
                "ExpiresIn": 3600,
                "TokenType": "Bearer"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = provider.authenticate("ana", "hunter2").await.unwrap();
    assert_eq!(tokens.access_token, "access-1");
    assert_eq!(tokens.id_token.as_deref(), Some("id-1"));
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
    assert!(!tokens.expires_within(chrono::Duration::minutes(30)));
}

#[tokio::test]
async fn test_refresh_keeps_no_refresh_token() {
    let (server, provider) = common::setup_identity_mock().await;

    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "AuthParameters": { "REFRESH_TOKEN": "refresh-1" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "AuthenticationResult": {
                "AccessToken": "access-2",
                "ExpiresIn": 600
            }
        })))
        .mount(&server)
        .await;

    let tokens = provider.refresh("refresh-1").await.unwrap();
    assert_eq!(tokens.access_token, "access-2");
    assert!(tokens.refresh_token.is_none());
    assert!(tokens.expires_within(chrono::Duration::minutes(11)));
}

#[tokio::test]
async fn test_wrong_password_is_authentication_error() {
    let (server, provider) = common::setup_identity_mock().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "__type": "NotAuthorizedException",
            "message": "Incorrect username or password."
        })))
        .mount(&server)
        .await;

    let err = provider.authenticate("ana", "wrong").await.unwrap_err();
    match err {
        SaveSyncError::Authentication(message) => {
            assert_eq!(message, "Incorrect username or password.")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_challenge_is_not_supported() {
    let (server, provider) = common::setup_identity_mock().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ChallengeName": "NEW_PASSWORD_REQUIRED",
            "Session": "opaque"
        })))
        .mount(&server)
        .await;

    let err = provider.authenticate("ana", "temp").await.unwrap_err();
    assert!(err.is_authentication());
}

#[tokio::test]
async fn test_sign_up_sends_email_attribute() {
    let (server, provider) = common::setup_identity_mock().await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AWSCognitoIdentityProviderService.SignUp"))
        .and(body_partial_json(serde_json::json!({
            "ClientId": "client-123",
            "Username": "ana",
            "UserAttributes": [{ "Name": "email", "Value": "ana@example.com" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "UserConfirmed": false,
            "UserSub": "0000-1111"
        })))
        .expect(1)
        .mount(&server)
        .await;

    provider
        .sign_up("ana", "hunter2!", "ana@example.com")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_throttled_refresh_is_rate_limited() {
    let (server, provider) = common::setup_identity_mock().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "3"))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider.refresh("refresh-1").await.unwrap_err();
    assert!(err.is_transient());
    assert!(!err.is_authentication());
    assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(3)));
}
