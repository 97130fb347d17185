//! CognitoIdentityProvider - IIdentityProvider over the Cognito JSON protocol
//!
//! Speaks the `AWSCognitoIdentityProviderService` JSON 1.1 protocol used by
//! user pools:
//! - `InitiateAuth` with `USER_PASSWORD_AUTH` for login
//! - `InitiateAuth` with `REFRESH_TOKEN_AUTH` for refresh
//! - `SignUp` for registration, with the email as a user attribute
//!
//! Any endpoint speaking the same protocol (e.g. a local emulator) can be
//! targeted with [`CognitoIdentityProvider::new`].

use std::collections::HashMap;

use chrono::{Duration, Utc};
use reqwest::Client;
use savesync_core::config::Config;
use savesync_core::error::SaveSyncError;
use savesync_core::ports::identity::DEFAULT_TOKEN_LIFETIME_SECS;
use savesync_core::ports::{IIdentityProvider, Tokens};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::parse_retry_after;

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: HashMap<&'a str, &'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    password: &'a str,
    user_attributes: Vec<UserAttribute<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UserAttribute<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Error body: `{"__type": "NotAuthorizedException", "message": "..."}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

// ============================================================================
// CognitoIdentityProvider
// ============================================================================

/// [`IIdentityProvider`] for a Cognito user pool app client
#[derive(Debug, Clone)]
pub struct CognitoIdentityProvider {
    client: Client,
    endpoint: String,
    client_id: String,
}

impl CognitoIdentityProvider {
    /// Creates a provider for `endpoint` and the app client `client_id`
    pub fn new(endpoint: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            client_id: client_id.into(),
        }
    }

    /// Creates a provider from the `auth` section of the configuration
    pub fn from_config(config: &Config) -> Result<Self, SaveSyncError> {
        let client = Client::builder()
            .timeout(config.sync.timeout())
            .build()
            .map_err(|e| SaveSyncError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.auth_endpoint(),
            client_id: config.auth.app_client_id.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Calls a Cognito action and returns the raw JSON body
    async fn call<B: Serialize>(&self, action: &str, body: &B) -> Result<Value, SaveSyncError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .json(body)
            .send()
            .await
            .map_err(|e| SaveSyncError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers().get("Retry-After"));
            return Err(SaveSyncError::RateLimited { retry_after });
        }
        let text = response
            .text()
            .await
            .map_err(|e| SaveSyncError::Network(e.to_string()))?;

        if status.is_server_error() {
            return Err(SaveSyncError::Network(format!("{action}: HTTP {status}")));
        }
        if !status.is_success() {
            let message = describe_error(&text);
            warn!(action, status = status.as_u16(), message = %message, "Identity provider refused request");
            return Err(SaveSyncError::Authentication(message));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| SaveSyncError::InvalidResponse(format!("{action}: {e}")))
    }

    async fn initiate_auth(
        &self,
        flow: &str,
        parameters: HashMap<&str, &str>,
    ) -> Result<Tokens, SaveSyncError> {
        let request = InitiateAuthRequest {
            auth_flow: flow,
            client_id: &self.client_id,
            auth_parameters: parameters,
        };
        let body = self.call("InitiateAuth", &request).await?;
        let response: InitiateAuthResponse = serde_json::from_value(body)
            .map_err(|e| SaveSyncError::InvalidResponse(format!("InitiateAuth: {e}")))?;

        let result = match (response.authentication_result, response.challenge_name) {
            (Some(result), _) => result,
            (None, Some(challenge)) => {
                return Err(SaveSyncError::Authentication(format!(
                    "unsupported challenge: {challenge}"
                )))
            }
            (None, None) => {
                return Err(SaveSyncError::InvalidResponse(
                    "InitiateAuth: missing AuthenticationResult".into(),
                ))
            }
        };

        let lifetime = result.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Ok(Tokens {
            access_token: result.access_token,
            id_token: result.id_token,
            refresh_token: result.refresh_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        })
    }
}

fn describe_error(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        Ok(ErrorBody {
            kind: Some(kind), ..
        }) => kind,
        _ if body.is_empty() => "request refused".to_string(),
        _ => body.to_string(),
    }
}

#[async_trait::async_trait]
impl IIdentityProvider for CognitoIdentityProvider {
    #[instrument(skip(self, password))]
    async fn authenticate(&self, username: &str, password: &str) -> Result<Tokens, SaveSyncError> {
        let parameters = HashMap::from([("USERNAME", username), ("PASSWORD", password)]);
        let tokens = self.initiate_auth("USER_PASSWORD_AUTH", parameters).await?;
        info!(expires_at = %tokens.expires_at, "Authenticated");
        Ok(tokens)
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<Tokens, SaveSyncError> {
        let parameters = HashMap::from([("REFRESH_TOKEN", refresh_token)]);
        let tokens = self.initiate_auth("REFRESH_TOKEN_AUTH", parameters).await?;
        debug!(expires_at = %tokens.expires_at, "Access token refreshed");
        Ok(tokens)
    }

    #[instrument(skip(self, password, email))]
    async fn sign_up(&self, username: &str, password: &str, email: &str) -> Result<(), SaveSyncError> {
        let request = SignUpRequest {
            client_id: &self.client_id,
            username,
            password,
            user_attributes: vec![UserAttribute {
                name: "email",
                value: email,
            }],
        };
        self.call("SignUp", &request).await?;
        info!("User registered; confirmation may be required");
        Ok(())
    }
}
