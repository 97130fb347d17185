//! CLI subcommands
//!
//! Each module exposes a clap command type with an `execute(&Context)`
//! method. Shared setup (configuration loading, sync manager wiring) lives
//! here.

pub mod auth;
pub mod backups;
pub mod config;
pub mod manifest;
pub mod plan;
pub mod status;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use savesync_api::identity::CognitoIdentityProvider;
use savesync_api::provider::RemoteSyncService;
use savesync_api::transfer::HttpTransferClient;
use savesync_client::SyncManager;
use savesync_core::config::Config;
use savesync_core::ports::ICredentialProvider;
use savesync_core::usecases::AuthenticateUseCase;
use tracing::debug;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Invocation-wide settings shared by every command
pub struct Context {
    pub format: OutputFormat,
    config_override: Option<PathBuf>,
}

impl Context {
    pub fn new(format: OutputFormat, config: Option<&str>) -> Self {
        Self {
            format,
            config_override: config.map(PathBuf::from),
        }
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format)
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// The `--config` path, or the platform default
    pub fn config_path(&self) -> PathBuf {
        self.config_override
            .clone()
            .unwrap_or_else(Config::default_path)
    }

    /// Loads and validates the configuration
    pub fn load_config(&self) -> Result<Config> {
        let path = self.config_path();
        debug!(config_path = %path.display(), "Loading configuration");
        Config::load_validated(&path)
            .with_context(|| format!("Configuration at {} is not usable", path.display()))
    }

    /// A signed-out session against the configured identity provider
    pub fn session(&self, config: &Config) -> Result<Arc<AuthenticateUseCase>> {
        let identity = CognitoIdentityProvider::from_config(config)
            .context("Failed to set up the identity provider")?;
        Ok(Arc::new(AuthenticateUseCase::new(Arc::new(identity))))
    }

    /// A sync manager wired to the configured service and object store
    pub fn sync_manager(
        &self,
        config: &Config,
        credentials: Arc<dyn ICredentialProvider + Send + Sync>,
    ) -> Result<SyncManager> {
        let service = RemoteSyncService::connect(config.api_base_url(), config.sync.timeout())
            .context("Failed to set up the sync service client")?;
        let transfer = HttpTransferClient::new(config.sync.timeout())
            .context("Failed to set up the transfer client")?;

        SyncManager::new(config, credentials, Arc::new(service), Arc::new(transfer))
            .context("Failed to create the sync manager")
    }
}
