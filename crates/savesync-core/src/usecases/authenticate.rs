//! Authentication use case
//!
//! Holds the session's tokens in memory and keeps the access token fresh.
//! Login, sign-up and refresh are delegated to the identity provider port;
//! nothing here is ever written to disk.

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::SaveSyncError;
use crate::ports::{ICredentialProvider, IIdentityProvider, Tokens};

/// Access tokens expiring within this many seconds are refreshed before use
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// Use case for authentication operations
///
/// One instance backs one signed-in session. The sync manager reads
/// credentials from it through [`ICredentialProvider`].
pub struct AuthenticateUseCase {
    identity: Arc<dyn IIdentityProvider + Send + Sync>,
    tokens: RwLock<Option<Tokens>>,
}

impl AuthenticateUseCase {
    /// Creates a signed-out session backed by `identity`
    pub fn new(identity: Arc<dyn IIdentityProvider + Send + Sync>) -> Self {
        Self {
            identity,
            tokens: RwLock::new(None),
        }
    }

    /// Signs in with a username and password
    ///
    /// On failure any previously held tokens are left untouched.
    ///
    /// # Errors
    ///
    /// - `Authentication` if the provider rejects the credentials
    /// - `Network` if the provider is unreachable
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<(), SaveSyncError> {
        let tokens = self.identity.authenticate(username, password).await?;
        *self.tokens.write().await = Some(tokens);
        info!("Signed in");
        Ok(())
    }

    /// Registers a new user; does not sign in
    #[tracing::instrument(skip(self, password))]
    pub async fn signup(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<(), SaveSyncError> {
        self.identity.sign_up(username, password, email).await?;
        info!("Registered new user");
        Ok(())
    }

    /// Discards all held tokens
    pub async fn logout(&self) {
        if self.tokens.write().await.take().is_some() {
            info!("Signed out");
        }
    }

    /// Returns true if an access token is held
    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    /// Returns an access token, refreshing it first if it is about to expire
    ///
    /// # Errors
    ///
    /// - `Authentication` if not signed in, or if the token expired and
    ///   cannot be refreshed
    /// - `Network` if the token expired and a refresh could not reach the
    ///   provider; while it is still valid the current token is returned
    pub async fn bearer_token(&self) -> Result<String, SaveSyncError> {
        // Step 1: Fast path when the current token is comfortably valid
        let (refresh_token, still_valid) = {
            let guard = self.tokens.read().await;
            let tokens = guard
                .as_ref()
                .ok_or_else(|| SaveSyncError::Authentication("not signed in".into()))?;

            if !tokens.expires_within(Duration::seconds(REFRESH_MARGIN_SECS)) {
                return Ok(tokens.access_token.clone());
            }

            match &tokens.refresh_token {
                Some(refresh_token) => (
                    refresh_token.clone(),
                    (!tokens.is_expired()).then(|| tokens.access_token.clone()),
                ),
                None if !tokens.is_expired() => return Ok(tokens.access_token.clone()),
                None => {
                    return Err(SaveSyncError::Authentication(
                        "session expired and no refresh token is available".into(),
                    ))
                }
            }
        };

        // Step 2: Refresh outside the lock
        debug!("Access token near expiry, refreshing");
        let refreshed = match self.identity.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return match still_valid {
                    Some(access_token) if e.is_transient() => Ok(access_token),
                    _ => Err(e),
                };
            }
        };

        // Step 3: Store, keeping the old refresh token if none was returned
        let mut guard = self.tokens.write().await;
        let access_token = refreshed.access_token.clone();
        let kept_refresh = refreshed.refresh_token.clone().or(Some(refresh_token));
        *guard = Some(Tokens {
            refresh_token: kept_refresh,
            ..refreshed
        });

        Ok(access_token)
    }
}

#[async_trait::async_trait]
impl ICredentialProvider for AuthenticateUseCase {
    async fn is_authenticated(&self) -> bool {
        AuthenticateUseCase::is_authenticated(self).await
    }

    async fn bearer_token(&self) -> Result<String, SaveSyncError> {
        AuthenticateUseCase::bearer_token(self).await
    }
}
