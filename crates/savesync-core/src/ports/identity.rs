//! Identity provider port (driven/secondary port, client side)
//!
//! The identity provider issues bearer credentials for a username and
//! password, refreshes them, and registers new users. Tokens are only ever
//! held in process memory by [`crate::usecases::AuthenticateUseCase`].

use chrono::{DateTime, Utc};

use crate::error::SaveSyncError;

/// Token lifetime assumed when the provider does not report one
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

// ============================================================================
// Tokens struct
// ============================================================================

/// Credentials returned by the identity provider
#[derive(Debug, Clone)]
pub struct Tokens {
    /// Bearer token attached to sync requests
    pub access_token: String,
    /// Identity token, when the provider returns one
    pub id_token: Option<String>,
    /// Token for refreshing the access token without a password
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the access token will expire within the given duration
    pub fn expires_within(&self, duration: chrono::Duration) -> bool {
        Utc::now() + duration >= self.expires_at
    }
}

// ============================================================================
// IIdentityProvider trait
// ============================================================================

/// Port trait for the external identity provider
#[async_trait::async_trait]
pub trait IIdentityProvider: Send + Sync {
    /// Exchanges a username and password for tokens
    async fn authenticate(&self, username: &str, password: &str) -> Result<Tokens, SaveSyncError>;

    /// Exchanges a refresh token for a fresh access token
    ///
    /// Providers may omit the refresh token from the result; callers keep
    /// the one they already hold in that case.
    async fn refresh(&self, refresh_token: &str) -> Result<Tokens, SaveSyncError>;

    /// Registers a new user
    async fn sign_up(&self, username: &str, password: &str, email: &str)
        -> Result<(), SaveSyncError>;
}

// ============================================================================
// ICredentialProvider trait
// ============================================================================

/// What the sync manager needs from an authenticated session
#[async_trait::async_trait]
pub trait ICredentialProvider: Send + Sync {
    /// Returns true if a credential is currently held
    async fn is_authenticated(&self) -> bool;

    /// Returns a bearer credential valid for at least the refresh margin
    async fn bearer_token(&self) -> Result<String, SaveSyncError>;
}
