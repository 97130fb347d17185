//! Server configuration
//!
//! YAML file with every field defaulted, plus an environment override for
//! the signing secret so it need not live on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use savesync_core::config::ValidationError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Environment variable overriding `signing_secret`
pub const SIGNING_SECRET_ENV: &str = "SAVESYNC_SIGNING_SECRET";

/// Shortest accepted signing secret, in bytes
const MIN_SECRET_LEN: usize = 16;

/// Configuration of the `savesyncd` request handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on, e.g. `127.0.0.1:8080`.
    pub listen_addr: String,
    /// SQLite database holding manifest records and pending plans.
    pub database_path: PathBuf,
    /// Base URL capabilities are issued against.
    pub object_store_base_url: String,
    /// HMAC key shared with the object store.
    pub signing_secret: String,
    /// Validity window of issued capabilities.
    pub capability_ttl_seconds: u64,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("/var/lib"))
            .join("savesync");
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            database_path: data_dir.join("manifests.db"),
            object_store_base_url: String::new(),
            signing_secret: String::new(),
            capability_ttl_seconds: 300,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Platform-appropriate default path, `$XDG_CONFIG_HOME/savesync/server.yaml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("savesync")
            .join("server.yaml")
    }

    /// Applies environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(secret) = std::env::var(SIGNING_SECRET_ENV) {
            if !secret.is_empty() {
                self.signing_secret = secret;
            }
        }
        self
    }

    pub fn capability_ttl(&self) -> Duration {
        Duration::from_secs(self.capability_ttl_seconds)
    }

    /// Validate the configuration and return all errors found.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "listen_addr".into(),
                message: format!("not a socket address: '{}'", self.listen_addr),
            });
        }
        if self.database_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "database_path".into(),
                message: "is required".into(),
            });
        }
        match Url::parse(&self.object_store_base_url) {
            Ok(url) if url.cannot_be_a_base() => errors.push(ValidationError {
                field: "object_store_base_url".into(),
                message: "must be a hierarchical URL".into(),
            }),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError {
                field: "object_store_base_url".into(),
                message: format!("invalid URL: {e}"),
            }),
        }
        if self.signing_secret.len() < MIN_SECRET_LEN {
            errors.push(ValidationError {
                field: "signing_secret".into(),
                message: format!(
                    "must be at least {MIN_SECRET_LEN} bytes (or set {SIGNING_SECRET_ENV})"
                ),
            });
        }
        if self.capability_ttl_seconds == 0 {
            errors.push(ValidationError {
                field: "capability_ttl_seconds".into(),
                message: "must be greater than zero".into(),
            });
        }

        errors
    }
}
