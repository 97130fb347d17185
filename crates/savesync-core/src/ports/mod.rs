//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! Client side:
//! - [`ISyncService`] - Plan requests and completion acknowledgements
//! - [`ITransferClient`] - Capability-based uploads and downloads
//! - [`IIdentityProvider`] - Login, refresh and sign-up
//! - [`ICredentialProvider`] - Bearer credentials for the sync manager
//!
//! Server side:
//! - [`IManifestStore`] - Confirmed records and pending plans
//! - [`ICapabilityIssuer`] - Signed, time-limited transfer URLs
//! - [`ICredentialValidator`] - Request credential to account mapping

pub mod capability;
pub mod credentials;
pub mod identity;
pub mod manifest_store;
pub mod sync_service;
pub mod transfer;

pub use capability::{object_key, CapabilityOp, ICapabilityIssuer};
pub use credentials::ICredentialValidator;
pub use identity::{ICredentialProvider, IIdentityProvider, Tokens};
pub use manifest_store::IManifestStore;
pub use sync_service::{
    CompletionRequest, CompletionResponse, DownloadTarget, ISyncService, PlanRequest,
    PlanResponse, UploadTarget,
};
pub use transfer::ITransferClient;
