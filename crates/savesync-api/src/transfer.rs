//! HttpTransferClient - ITransferClient implementation over capability URLs
//!
//! Capability URLs are absolute and self-authorising, so requests carry no
//! bearer credential. Uploads are a single `PUT` with an octet-stream body;
//! downloads are a plain `GET`.

use std::time::Duration;

use reqwest::Client;
use savesync_core::error::SaveSyncError;
use savesync_core::ports::ITransferClient;
use tracing::debug;

use crate::client::check_status;
use crate::ApiError;

/// [`ITransferClient`] for signed object-store URLs
#[derive(Debug, Clone)]
pub struct HttpTransferClient {
    client: Client,
}

impl HttpTransferClient {
    pub fn new(timeout: Duration) -> Result<Self, SaveSyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::from)?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransferClient {
    fn default() -> Self {
        Self::with_client(Client::new())
    }
}

/// Maps a transfer failure, keeping transient failures retryable
fn transfer_error(url: &str, err: ApiError) -> SaveSyncError {
    if err.is_transient() {
        return SaveSyncError::from(err);
    }
    match err {
        ApiError::InvalidResponse(message) => SaveSyncError::InvalidResponse(message),
        other => SaveSyncError::Transfer {
            filename: object_name(url).to_string(),
            message: other.to_string(),
        },
    }
}

/// Last path segment of a capability URL, without its query
fn object_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

#[async_trait::async_trait]
impl ITransferClient for HttpTransferClient {
    async fn upload(&self, upload_url: &str, data: Vec<u8>) -> Result<(), SaveSyncError> {
        let size = data.len();
        let response = self
            .client
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| transfer_error(upload_url, e.into()))?;
        check_status(response)
            .await
            .map_err(|e| transfer_error(upload_url, e))?;

        debug!(object = object_name(upload_url), size, "PUT accepted");
        Ok(())
    }

    async fn download(&self, download_url: &str) -> Result<Vec<u8>, SaveSyncError> {
        let response = self
            .client
            .get(download_url)
            .send()
            .await
            .map_err(|e| transfer_error(download_url, e.into()))?;
        let response = check_status(response)
            .await
            .map_err(|e| transfer_error(download_url, e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transfer_error(download_url, e.into()))?;

        debug!(object = object_name(download_url), size = bytes.len(), "GET complete");
        Ok(bytes.to_vec())
    }
}
