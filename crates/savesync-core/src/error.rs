//! Error taxonomy shared by the client and server adapters
//!
//! [`SaveSyncError`] classifies every failure a sync attempt can hit so that
//! callers can decide between retrying, aborting a single action, or giving
//! up on the attempt. [`StoreError`] covers the remote manifest store.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::ValidationError;
use crate::domain::{Checksum, DomainError, Filename, ManifestVersion};

/// Errors surfaced by sync-path operations and the authentication boundary
#[derive(Debug, Error)]
pub enum SaveSyncError {
    /// Required setup is missing or invalid
    #[error("Configuration error: {}", format_validation(.0))]
    Configuration(Vec<ValidationError>),

    /// The credential is missing, invalid or expired
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A transient network failure (connect error, timeout, 5xx)
    #[error("Network error: {0}")]
    Network(String),

    /// The peer answered 429
    #[error("Rate limited{}", .retry_after.map(|d| format!(", retry after {}s", d.as_secs())).unwrap_or_default())]
    RateLimited {
        /// Server-suggested delay, when given
        retry_after: Option<Duration>,
    },

    /// A transfer was rejected for a non-transient reason
    #[error("Transfer of {filename} failed: {message}")]
    Transfer {
        /// The file being transferred
        filename: String,
        /// What went wrong
        message: String,
    },

    /// Downloaded content does not match the declared checksum
    #[error("Integrity check failed for {filename}: expected {expected}, got {actual}")]
    Integrity {
        /// The file whose download was rejected
        filename: Filename,
        /// Checksum declared by the remote manifest
        expected: Checksum,
        /// Checksum of the bytes actually received
        actual: Checksum,
    },

    /// The capability window closed before the action finished
    #[error("Capability for {filename} expired before the transfer completed")]
    CapabilityExpired {
        /// The file whose action was abandoned
        filename: Filename,
    },

    /// Local I/O failed; the affected file keeps its prior state
    #[error("Storage error at {}: {source}", .path.display())]
    Storage {
        /// Path involved in the failed operation
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The service refused the request (bad request, lost commit race, ...)
    #[error("Request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status of the refusal
        status: u16,
        /// Message returned by the service
        message: String,
    },

    /// The peer sent a response that could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A domain validation failure
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl SaveSyncError {
    /// Creates a storage error for `path`
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SaveSyncError::Storage {
            path: path.into(),
            source,
        }
    }

    /// Returns true if retrying the same call may succeed
    ///
    /// Only network-level failures and rate limiting qualify.
    /// Authentication, integrity and capability expiry never do.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SaveSyncError::Network(_) | SaveSyncError::RateLimited { .. }
        )
    }

    /// Minimum wait the peer asked for before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SaveSyncError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Returns true if the caller must re-authenticate before trying again
    pub fn is_authentication(&self) -> bool {
        matches!(self, SaveSyncError::Authentication(_))
    }
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by remote manifest store adapters
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another commit landed first; the record is no longer at the expected version
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// Version the caller based its change on
        expected: ManifestVersion,
        /// Version currently stored
        actual: ManifestVersion,
    },

    /// A stored value could not be decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend failed
    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SaveSyncError::Network("connection reset".into()).is_transient());
        assert!(!SaveSyncError::Authentication("expired".into()).is_transient());
        assert!(!SaveSyncError::CapabilityExpired {
            filename: Filename::new("persistent").unwrap()
        }
        .is_transient());
        assert!(!SaveSyncError::Integrity {
            filename: Filename::new("persistent").unwrap(),
            expected: Checksum::new("aaa").unwrap(),
            actual: Checksum::new("bbb").unwrap(),
        }
        .is_transient());
    }

    #[test]
    fn test_rate_limit_is_transient_with_delay() {
        let err = SaveSyncError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert!(err.is_transient());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(err.to_string(), "Rate limited, retry after 7s");
        assert_eq!(
            SaveSyncError::RateLimited { retry_after: None }.to_string(),
            "Rate limited"
        );
        assert_eq!(SaveSyncError::Network("reset".into()).retry_after(), None);
    }

    #[test]
    fn test_configuration_display_lists_fields() {
        let err = SaveSyncError::Configuration(vec![
            ValidationError {
                field: "client.game_id".into(),
                message: "is required".into(),
            },
            ValidationError {
                field: "auth.region".into(),
                message: "is required".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Configuration error: client.game_id: is required; auth.region: is required"
        );
    }

    #[test]
    fn test_storage_display() {
        let err = SaveSyncError::storage(
            "/saves/persistent",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Storage error at /saves/persistent: denied");
    }

    #[test]
    fn test_version_conflict_display() {
        let err = StoreError::VersionConflict {
            expected: ManifestVersion::new(1),
            actual: ManifestVersion::new(2),
        };
        assert_eq!(err.to_string(), "version conflict: expected v1, found v2");
    }
}
