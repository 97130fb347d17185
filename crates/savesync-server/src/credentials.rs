//! Account resolution from gateway-verified credentials
//!
//! The request handler sits behind a gateway that has already verified the
//! JWT's signature and expiry against the identity provider. What is left
//! here is reading the `sub` claim, which becomes the account id.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use savesync_core::domain::AccountId;
use savesync_core::error::SaveSyncError;
use savesync_core::ports::ICredentialValidator;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
}

/// [`ICredentialValidator`] trusting an upstream JWT-verifying gateway
#[derive(Debug, Clone, Default)]
pub struct GatewayClaimsValidator;

impl GatewayClaimsValidator {
    pub fn new() -> Self {
        Self
    }
}

fn refuse(message: &str) -> SaveSyncError {
    SaveSyncError::Authentication(message.to_string())
}

impl ICredentialValidator for GatewayClaimsValidator {
    fn account_for(&self, bearer: &str) -> Result<AccountId, SaveSyncError> {
        let mut parts = bearer.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(refuse("credential is not a JWT")),
        };

        // Some encoders keep the padding
        let decoded = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| refuse("credential payload is not base64url"))?;
        let claims: Claims =
            serde_json::from_slice(&decoded).map_err(|_| refuse("credential payload is not JSON"))?;

        let sub = claims.sub.ok_or_else(|| refuse("credential has no subject"))?;
        if sub == "." || sub == ".." {
            return Err(refuse("credential subject is not an account id"));
        }
        AccountId::new(sub).map_err(|e| SaveSyncError::Authentication(e.to_string()))
    }
}
