//! Shared test helpers for the HTTP adapter integration tests
//!
//! Each helper starts a wiremock server and returns an adapter pointed at it.

use savesync_api::client::ApiClient;
use savesync_api::identity::CognitoIdentityProvider;
use savesync_api::provider::RemoteSyncService;
use savesync_core::domain::{Checksum, FileRecord, Filename, GameId, Manifest, Timestamp};
use wiremock::MockServer;

pub const CREDENTIAL: &str = "test-bearer-token";

/// Starts a mock request handler and a service pointed at it
pub async fn setup_service_mock() -> (MockServer, RemoteSyncService) {
    let server = MockServer::start().await;
    let client = ApiClient::with_base_url(server.uri()).expect("client builds");
    (server, RemoteSyncService::new(client))
}

/// Starts a mock identity endpoint and a provider pointed at it
pub async fn setup_identity_mock() -> (MockServer, CognitoIdentityProvider) {
    let server = MockServer::start().await;
    let provider = CognitoIdentityProvider::new(format!("{}/", server.uri()), "client-123");
    (server, provider)
}

pub fn game() -> GameId {
    GameId::new("testgame").unwrap()
}

pub fn name(s: &str) -> Filename {
    Filename::new(s).unwrap()
}

/// A one-file manifest as built from a fresh save directory
pub fn manifest_with(filename: &str, checksum: &str) -> Manifest {
    Manifest::from_records([FileRecord::new(
        name(filename),
        3,
        Timestamp::new(1_700_000_000.0).unwrap(),
        Checksum::new(checksum).unwrap(),
    )])
}
