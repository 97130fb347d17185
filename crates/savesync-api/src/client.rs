//! Request handler client
//!
//! Typed JSON client for the SaveSync request handler. Every call carries
//! the caller's bearer credential; error bodies of the form `{"error": "..."}`
//! are surfaced as [`ApiError`] variants keyed by status code. Nothing is
//! retried here: a 429 comes back as [`ApiError::TooManyRequests`] carrying
//! the server's `Retry-After`, for the caller's retry policy to honour.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{parse_retry_after, ApiError};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body returned by the request handler
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

// ============================================================================
// ApiClient
// ============================================================================

/// HTTP client for the SaveSync request handler
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a client for `base_url` with the given per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a client with the default timeout (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::new(base_url, DEFAULT_TIMEOUT)
    }

    /// Wraps an existing `reqwest::Client`
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for `path`
    pub fn request(&self, method: Method, path: &str, credential: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url).bearer_auth(credential)
    }

    /// POSTs `body` as JSON and decodes a JSON response
    pub async fn post_json<B, R>(&self, path: &str, credential: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, path, credential)
            .json(body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let text = response.text().await?;
        debug!(path, bytes = text.len(), "Response received");
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(format!("{path}: {e}")))
    }
}

/// Turns a non-success response into an [`ApiError`]
pub(crate) async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = parse_retry_after(response.headers().get("Retry-After"));
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or(body);

    warn!(status = status.as_u16(), message = %message, "Request failed");
    Err(ApiError::from_status(status, message, retry_after))
}
