//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly validation failures raised by newtype constructors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid tracked filename
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    /// Invalid content checksum
    #[error("Invalid checksum: {0}")]
    InvalidChecksum(String),

    /// Invalid modification timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Invalid game identifier
    #[error("Invalid game id: {0}")]
    InvalidGameId(String),

    /// Invalid account identifier
    #[error("Invalid account id: {0}")]
    InvalidAccountId(String),

    /// Invalid plan identifier
    #[error("Invalid plan id: {0}")]
    InvalidPlanId(String),

    /// A manifest entry is keyed under a different name than its record
    #[error("Manifest key {key} does not match record path {path}")]
    ManifestKeyMismatch {
        /// The map key
        key: String,
        /// The record's own path
        path: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
