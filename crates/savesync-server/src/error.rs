//! Error types for the request handler

use hyper::StatusCode;
use savesync_core::domain::DomainError;
use savesync_core::error::{SaveSyncError, StoreError};
use thiserror::Error;

/// Errors a request can fail with, each mapped onto one HTTP status
#[derive(Debug, Error)]
pub enum ServerError {
    /// Malformed body or invalid manifest
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or unusable credential
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Unknown route
    #[error("not found: {0}")]
    NotFound(String),

    /// Known route, wrong method
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// The acknowledgement lost a compare-and-swap race
    #[error("conflict: {0}")]
    Conflict(String),

    /// Body exceeds the accepted size
    #[error("payload too large")]
    PayloadTooLarge,

    /// Storage or signing failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status reported for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `{"error": ...}` body
    ///
    /// Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ServerError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { expected, actual } => ServerError::Conflict(format!(
                "remote manifest changed since plan (planned against {expected}, now {actual})"
            )),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<DomainError> for ServerError {
    fn from(err: DomainError) -> Self {
        ServerError::InvalidRequest(err.to_string())
    }
}

impl From<SaveSyncError> for ServerError {
    fn from(err: SaveSyncError) -> Self {
        match err {
            SaveSyncError::Authentication(message) => ServerError::Unauthorized(message),
            SaveSyncError::Domain(e) => e.into(),
            other => ServerError::Internal(other.to_string()),
        }
    }
}
