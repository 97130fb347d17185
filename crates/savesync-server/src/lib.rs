//! SaveSync Server - Stateless sync request handler
//!
//! Serves the two calls a client makes per sync:
//! - `POST /sync/plan`: reconcile the client's manifest with the confirmed
//!   remote one, store the proposal as pending, and hand out signed
//!   transfer capabilities
//! - `POST /sync/complete`: commit the pending proposal (compare-and-swap on
//!   the record version) or discard it
//!
//! ## Modules
//!
//! - [`config`] - YAML server configuration
//! - [`capability`] - HMAC-SHA256 signed object-store URLs
//! - [`credentials`] - Account resolution from gateway-verified JWTs
//! - [`handler`] - Plan and completion logic over the store port
//! - [`http`] - hyper routing and JSON framing
//! - [`error`] - [`ServerError`] and its HTTP status mapping

pub mod capability;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handler;
pub mod http;

pub use capability::HmacCapabilityIssuer;
pub use config::ServerConfig;
pub use credentials::GatewayClaimsValidator;
pub use error::ServerError;
pub use handler::SyncHandler;
