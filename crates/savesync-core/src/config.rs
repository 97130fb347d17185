//! Configuration module for SaveSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! A configuration is constructed once, validated eagerly, and then passed by
//! reference to every component that needs it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::GameId;
use crate::error::SaveSyncError;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for the SaveSync client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub auth: AuthConfig,
    pub sync: SyncConfig,
    pub backup: BackupConfig,
    pub logging: LoggingConfig,
}

/// Where saves live and which service they are synchronized with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the sync request handler, e.g. `https://api.example.com/prod`.
    pub api_base_url: String,
    /// Identifier of the game whose saves are synchronized.
    pub game_id: String,
    /// Directory holding the game's save files.
    pub save_dir: PathBuf,
}

/// Identity provider settings (Cognito-compatible user pool).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Provider region, e.g. `us-east-1`.
    pub region: String,
    /// User pool identifier.
    pub user_pool_id: String,
    /// Public app client identifier.
    pub app_client_id: String,
    /// Endpoint override; defaults to `https://cognito-idp.{region}.amazonaws.com/`.
    pub endpoint: Option<String>,
}

/// Synchronization timing and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum seconds between two start-of-session sync attempts.
    pub interval_seconds: u64,
    /// Retries for transient network failures.
    pub max_retries: u32,
    /// Per-request network timeout in seconds.
    pub timeout_seconds: u64,
    /// Upper bound in seconds for the whole quit-time sync.
    pub quit_timeout_seconds: u64,
    /// Validity window in seconds assumed for transfer capabilities.
    pub capability_ttl_seconds: u64,
    /// File recording the last attempted sync time.
    pub state_file: PathBuf,
}

/// Pre-overwrite backup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Backup directory name, created inside the save directory.
    pub dir_name: String,
    /// Backups retained per tracked file; older ones are pruned.
    pub max_per_file: usize,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Load from `path` and validate, failing with
    /// [`SaveSyncError::Configuration`] listing every problem found.
    pub fn load_validated(path: &Path) -> Result<Self, SaveSyncError> {
        let config = Self::load(path).map_err(|e| {
            SaveSyncError::Configuration(vec![ValidationError {
                field: path.display().to_string(),
                message: format!("cannot be loaded: {e:#}"),
            }])
        })?;
        config.into_validated()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/savesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("savesync")
            .join("config.yaml")
    }

    /// Base URL without trailing slashes.
    pub fn api_base_url(&self) -> &str {
        self.client.api_base_url.trim_end_matches('/')
    }

    /// Identity provider endpoint, derived from the region unless overridden.
    pub fn auth_endpoint(&self) -> String {
        match &self.auth.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://cognito-idp.{}.amazonaws.com/", self.auth.region),
        }
    }

    /// The configured game id.
    ///
    /// # Errors
    /// Fails with a configuration error if the id is malformed.
    pub fn game_id(&self) -> Result<GameId, SaveSyncError> {
        GameId::new(self.client.game_id.clone()).map_err(|e| {
            SaveSyncError::Configuration(vec![ValidationError {
                field: "client.game_id".into(),
                message: e.to_string(),
            }])
        })
    }

    /// Directory holding pre-overwrite backups.
    pub fn backup_dir(&self) -> PathBuf {
        self.client.save_dir.join(&self.backup.dir_name)
    }
}

impl SyncConfig {
    /// Minimum spacing between start-of-session attempts.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Per-request network timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Bound on the whole quit-time sync.
    pub fn quit_timeout(&self) -> Duration {
        Duration::from_secs(self.quit_timeout_seconds)
    }

    /// Assumed capability validity window.
    pub fn capability_ttl(&self) -> Duration {
        Duration::from_secs(self.capability_ttl_seconds)
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

// Config, ClientConfig and AuthConfig derive Default because all their
// fields implement Default. (clippy::derivable_impls)

impl Default for SyncConfig {
    fn default() -> Self {
        let state_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("savesync");
        Self {
            interval_seconds: 300,
            max_retries: 3,
            timeout_seconds: 30,
            quit_timeout_seconds: 10,
            capability_ttl_seconds: 300,
            state_file: state_dir.join("sync_state.json"),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir_name: ".savesync_backups".to_string(),
            max_per_file: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.timeout_seconds"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `sync.max_retries`.
const MAX_RETRIES_LIMIT: u32 = 10;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- client ---
        let base_url = self.api_base_url();
        if base_url.is_empty() {
            errors.push(required("client.api_base_url"));
        } else if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            errors.push(ValidationError {
                field: "client.api_base_url".into(),
                message: format!("must be an http(s) URL, got '{base_url}'"),
            });
        }
        if self.client.game_id.is_empty() {
            errors.push(required("client.game_id"));
        } else if let Err(e) = GameId::new(self.client.game_id.clone()) {
            errors.push(ValidationError {
                field: "client.game_id".into(),
                message: e.to_string(),
            });
        }
        if self.client.save_dir.as_os_str().is_empty() {
            errors.push(required("client.save_dir"));
        }

        // --- auth ---
        if self.auth.region.is_empty() {
            errors.push(required("auth.region"));
        }
        if self.auth.user_pool_id.is_empty() {
            errors.push(required("auth.user_pool_id"));
        }
        if self.auth.app_client_id.is_empty() {
            errors.push(required("auth.app_client_id"));
        }

        // --- sync ---
        if self.sync.max_retries > MAX_RETRIES_LIMIT {
            errors.push(ValidationError {
                field: "sync.max_retries".into(),
                message: format!("must be at most {MAX_RETRIES_LIMIT}"),
            });
        }
        if self.sync.timeout_seconds == 0 {
            errors.push(positive("sync.timeout_seconds"));
        }
        if self.sync.quit_timeout_seconds == 0 {
            errors.push(positive("sync.quit_timeout_seconds"));
        }
        if self.sync.capability_ttl_seconds == 0 {
            errors.push(positive("sync.capability_ttl_seconds"));
        }

        // --- backup ---
        if self.backup.max_per_file == 0 {
            errors.push(positive("backup.max_per_file"));
        }
        let dir_name = &self.backup.dir_name;
        if !dir_name.starts_with('.')
            || dir_name.len() < 2
            || dir_name.contains(|c: char| c == '/' || c == '\\')
        {
            errors.push(ValidationError {
                field: "backup.dir_name".into(),
                message: format!(
                    "must be a hidden directory name like '.savesync_backups', got '{dir_name}'"
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }

    /// Consume the configuration, returning it only if it is valid.
    pub fn into_validated(self) -> Result<Self, SaveSyncError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(SaveSyncError::Configuration(errors))
        }
    }
}

fn required(field: &str) -> ValidationError {
    ValidationError {
        field: field.into(),
        message: "is required".into(),
    }
}

fn positive(field: &str) -> ValidationError {
    ValidationError {
        field: field.into(),
        message: "must be greater than 0".into(),
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use savesync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .api_base_url("https://api.example.com/prod")
///     .game_id("my-visual-novel")
///     .save_dir(PathBuf::from("/home/user/.renpy/my-visual-novel"))
///     .auth_region("us-east-1")
///     .auth_user_pool_id("us-east-1_AbCdEf")
///     .auth_app_client_id("client-id")
///     .build_validated()
///     .expect("valid configuration");
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- client ---

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.client.api_base_url = url.into();
        self
    }

    pub fn game_id(mut self, game_id: impl Into<String>) -> Self {
        self.config.client.game_id = game_id.into();
        self
    }

    pub fn save_dir(mut self, dir: PathBuf) -> Self {
        self.config.client.save_dir = dir;
        self
    }

    // --- auth ---

    pub fn auth_region(mut self, region: impl Into<String>) -> Self {
        self.config.auth.region = region.into();
        self
    }

    pub fn auth_user_pool_id(mut self, pool_id: impl Into<String>) -> Self {
        self.config.auth.user_pool_id = pool_id.into();
        self
    }

    pub fn auth_app_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.auth.app_client_id = client_id.into();
        self
    }

    pub fn auth_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.auth.endpoint = Some(endpoint.into());
        self
    }

    // --- sync ---

    pub fn sync_interval_seconds(mut self, seconds: u64) -> Self {
        self.config.sync.interval_seconds = seconds;
        self
    }

    pub fn sync_max_retries(mut self, n: u32) -> Self {
        self.config.sync.max_retries = n;
        self
    }

    pub fn sync_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.sync.timeout_seconds = seconds;
        self
    }

    pub fn sync_quit_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.sync.quit_timeout_seconds = seconds;
        self
    }

    pub fn sync_capability_ttl_seconds(mut self, seconds: u64) -> Self {
        self.config.sync.capability_ttl_seconds = seconds;
        self
    }

    pub fn sync_state_file(mut self, path: PathBuf) -> Self {
        self.config.sync.state_file = path;
        self
    }

    // --- backup ---

    pub fn backup_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.backup.dir_name = name.into();
        self
    }

    pub fn backup_max_per_file(mut self, n: usize) -> Self {
        self.config.backup.max_per_file = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn complete_builder() -> ConfigBuilder {
        ConfigBuilder::new()
            .api_base_url("https://api.example.com/prod/")
            .game_id("my-visual-novel")
            .save_dir(PathBuf::from("/tmp/saves"))
            .auth_region("us-east-1")
            .auth_user_pool_id("us-east-1_AbCdEf")
            .auth_app_client_id("client-123")
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sync.interval_seconds, 300);
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.sync.timeout_seconds, 30);
        assert_eq!(config.sync.capability_ttl_seconds, 300);
        assert_eq!(config.backup.dir_name, ".savesync_backups");
        assert_eq!(config.backup.max_per_file, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_config_reports_all_missing_fields() {
        let errors = Config::default().validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();

        assert!(fields.contains(&"client.api_base_url"));
        assert!(fields.contains(&"client.game_id"));
        assert!(fields.contains(&"client.save_dir"));
        assert!(fields.contains(&"auth.region"));
        assert!(fields.contains(&"auth.user_pool_id"));
        assert!(fields.contains(&"auth.app_client_id"));
    }

    #[test]
    fn test_complete_config_is_valid() {
        let config = complete_builder().build_validated();
        assert!(config.is_ok(), "unexpected errors: {:?}", config.err());
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        let config = complete_builder().build();
        assert_eq!(config.api_base_url(), "https://api.example.com/prod");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let errors = complete_builder()
            .api_base_url("ftp://example.com")
            .build()
            .validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "client.api_base_url");
    }

    #[test]
    fn test_rejects_malformed_game_id() {
        let errors = complete_builder().game_id("bad/id").build().validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "client.game_id");
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let errors = complete_builder()
            .sync_timeout_seconds(0)
            .sync_quit_timeout_seconds(0)
            .sync_capability_ttl_seconds(0)
            .build()
            .validate();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_zero_interval_is_allowed() {
        let config = complete_builder().sync_interval_seconds(0).build_validated();
        assert!(config.is_ok());
    }

    #[test]
    fn test_rejects_too_many_retries() {
        let errors = complete_builder().sync_max_retries(11).build().validate();
        assert_eq!(errors[0].field, "sync.max_retries");
    }

    #[test]
    fn test_rejects_visible_backup_dir() {
        let errors = complete_builder().backup_dir_name("backups").build().validate();
        assert_eq!(errors[0].field, "backup.dir_name");
    }

    #[test]
    fn test_rejects_invalid_log_level() {
        let errors = complete_builder().logging_level("loud").build().validate();
        assert_eq!(errors[0].field, "logging.level");
        assert!(errors[0].message.contains("loud"));
    }

    #[test]
    fn test_into_validated_returns_configuration_error() {
        let result = Config::default().into_validated();
        assert!(matches!(result, Err(SaveSyncError::Configuration(_))));
    }

    #[test]
    fn test_auth_endpoint() {
        let config = complete_builder().build();
        assert_eq!(
            config.auth_endpoint(),
            "https://cognito-idp.us-east-1.amazonaws.com/"
        );

        let config = complete_builder().auth_endpoint("http://localhost:9229/").build();
        assert_eq!(config.auth_endpoint(), "http://localhost:9229/");
    }

    #[test]
    fn test_backup_dir() {
        let config = complete_builder().build();
        assert_eq!(
            config.backup_dir(),
            PathBuf::from("/tmp/saves/.savesync_backups")
        );
    }

    #[test]
    fn test_load_partial_yaml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "client:\n  api_base_url: https://api.example.com\n  game_id: vn\n  save_dir: /tmp/saves\nsync:\n  interval_seconds: 60\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.client.game_id, "vn");
        assert_eq!(config.sync.interval_seconds, 60);
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.backup.max_per_file, 5);
    }

    #[test]
    fn test_load_validated_reports_missing_auth() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "client:\n  api_base_url: https://api.example.com\n  game_id: vn\n  save_dir: /tmp/saves\n"
        )
        .unwrap();

        match Config::load_validated(file.path()) {
            Err(SaveSyncError::Configuration(errors)) => {
                assert_eq!(errors.len(), 3);
                assert!(errors.iter().all(|e| e.field.starts_with("auth.")));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = Config::load_or_default(Path::new("/nonexistent/savesync.yaml"));
        assert_eq!(config.sync.interval_seconds, 300);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = complete_builder().build();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.client.game_id, config.client.game_id);
        assert_eq!(parsed.auth.app_client_id, config.auth.app_client_id);
    }

    #[test]
    fn test_default_path() {
        let path = Config::default_path();
        assert!(path.ends_with("savesync/config.yaml"));
    }
}
