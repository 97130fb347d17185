//! Config command - View and validate SaveSync configuration
//!
//! Provides the `savesync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports every error

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use savesync_core::config::Config;
use tracing::info;

use super::Context;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
        }
    }

    fn execute_show(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let config_path = ctx.config_path();
        let config = Config::load_or_default(&config_path);

        info!(config_path = %config_path.display(), "Showing configuration");

        if ctx.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            fmt.print_json(&json);
        } else {
            fmt.success(&format!("Configuration ({})", config_path.display()));
            if !config_path.exists() {
                fmt.warn("File not found; showing defaults");
            }
            fmt.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                fmt.info(line);
            }
        }

        Ok(())
    }

    fn execute_validate(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let config_path = ctx.config_path();

        let config = Config::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        let errors = config.validate();

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": errors
                    .iter()
                    .map(|e| serde_json::json!({ "field": e.field, "message": e.message }))
                    .collect::<Vec<_>>(),
            }));
        } else if errors.is_empty() {
            fmt.success(&format!("{} is valid", config_path.display()));
        } else {
            for error in &errors {
                fmt.error(&error.to_string());
            }
        }

        if !errors.is_empty() {
            bail!("{} configuration error(s)", errors.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{context, write_config};

    #[tokio::test]
    async fn test_validate_accepts_complete_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context(&write_config(dir.path()));
        ConfigCommand::Validate.execute(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_counts_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "sync:\n  timeout_seconds: 0\n").unwrap();

        let err = ConfigCommand::Validate
            .execute(&context(&path))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("configuration error(s)"));
    }

    #[tokio::test]
    async fn test_show_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context(&dir.path().join("missing.yaml"));
        ConfigCommand::Show.execute(&ctx).await.unwrap();
    }
}
