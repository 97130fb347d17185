//! Integration tests for savesync-api
//!
//! Uses wiremock to simulate the request handler, the object store and the
//! identity provider, and verifies the adapters end to end.

mod common;

mod test_identity;
mod test_sync_service;
mod test_transfer;
