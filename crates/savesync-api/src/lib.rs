//! SaveSync API - HTTP adapters
//!
//! Provides async clients for:
//! - The sync request handler (`POST /sync/plan`, `POST /sync/complete`)
//! - Capability-based blob transfers
//! - A Cognito-style identity provider (`InitiateAuth`, `SignUp`)
//!
//! ## Modules
//!
//! - [`client`] - Typed JSON client for the request handler
//! - [`provider`] - [`ISyncService`](savesync_core::ports::ISyncService) adapter
//! - [`transfer`] - [`ITransferClient`](savesync_core::ports::ITransferClient) adapter
//! - [`identity`] - [`IIdentityProvider`](savesync_core::ports::IIdentityProvider) adapter

pub mod client;
pub mod identity;
pub mod provider;
pub mod transfer;

use std::time::Duration;

use reqwest::StatusCode;
use savesync_core::error::SaveSyncError;
use thiserror::Error;

/// Errors that can occur when talking to SaveSync's HTTP collaborators
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was malformed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The credential is missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The capability or credential does not permit the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another device committed first
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Server-suggested delay, when given
        retry_after: Option<Duration>,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Classifies a non-success status and its error message
    pub fn from_status(status: StatusCode, message: String, retry_after: Option<Duration>) -> Self {
        match status {
            StatusCode::BAD_REQUEST => ApiError::BadRequest(message),
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            StatusCode::FORBIDDEN => ApiError::Forbidden(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::CONFLICT => ApiError::Conflict(message),
            StatusCode::TOO_MANY_REQUESTS => ApiError::TooManyRequests { retry_after },
            s if s.is_server_error() => ApiError::ServerError {
                status: s.as_u16(),
                message,
            },
            s => ApiError::InvalidResponse(format!("unexpected status {s}: {message}")),
        }
    }

    /// Returns true if the same request may succeed later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::TooManyRequests { .. }
                | ApiError::ServerError { .. }
                | ApiError::NetworkError(_)
        )
    }
}

impl From<ApiError> for SaveSyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(message) => SaveSyncError::Authentication(message),
            ApiError::BadRequest(message) => SaveSyncError::Rejected {
                status: 400,
                message,
            },
            ApiError::Forbidden(message) => SaveSyncError::Rejected {
                status: 403,
                message,
            },
            ApiError::NotFound(message) => SaveSyncError::Rejected {
                status: 404,
                message,
            },
            ApiError::Conflict(message) => SaveSyncError::Rejected {
                status: 409,
                message,
            },
            ApiError::TooManyRequests { retry_after } => SaveSyncError::RateLimited { retry_after },
            e @ (ApiError::ServerError { .. } | ApiError::NetworkError(_)) => {
                SaveSyncError::Network(e.to_string())
            }
            ApiError::InvalidResponse(message) => SaveSyncError::InvalidResponse(message),
        }
    }
}

/// Parses a `Retry-After` header given in seconds
pub(crate) fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
