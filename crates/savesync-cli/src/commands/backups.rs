//! Backups commands - Inspect and prune pre-overwrite copies
//!
//! Provides the `savesync backups` CLI subcommands:
//! 1. `list`  - Shows retained copies, optionally for one file
//! 2. `prune` - Enforces the retention count now

use anyhow::Result;
use clap::Subcommand;
use savesync_client::BackupManager;
use savesync_core::config::Config;
use savesync_core::domain::Filename;
use tracing::info;

use super::Context;
use crate::output::short_checksum;

#[derive(Debug, Subcommand)]
pub enum BackupsCommand {
    /// List retained backups, oldest first per file
    List {
        /// Only show backups of this file
        #[arg(long)]
        file: Option<String>,
    },
    /// Delete copies beyond the configured retention count
    Prune {
        /// Only prune backups of this file
        #[arg(long)]
        file: Option<String>,
    },
}

impl BackupsCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let config = ctx.load_config()?;
        let backups = manager(&config);

        match self {
            BackupsCommand::List { file } => {
                let filter = file.as_deref().map(Filename::new).transpose()?;
                self.execute_list(ctx, &backups, filter.as_ref()).await
            }
            BackupsCommand::Prune { file } => {
                let filter = file.as_deref().map(Filename::new).transpose()?;
                self.execute_prune(ctx, &backups, filter.as_ref()).await
            }
        }
    }

    async fn execute_list(
        &self,
        ctx: &Context,
        backups: &BackupManager,
        filter: Option<&Filename>,
    ) -> Result<()> {
        let fmt = ctx.formatter();
        let entries = backups.list(filter).await?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "backup_dir": backups.backup_dir().display().to_string(),
                "backups": entries,
            }));
            return Ok(());
        }

        if entries.is_empty() {
            fmt.success("No backups");
            return Ok(());
        }
        fmt.success(&format!(
            "{} backup(s) in {}",
            entries.len(),
            backups.backup_dir().display()
        ));
        for entry in &entries {
            fmt.info(&format!(
                "{:<24} {}  {:>10} B  {}",
                entry.filename.as_str(),
                entry.taken_at.format("%Y-%m-%d %H:%M:%S"),
                entry.size,
                short_checksum(entry.checksum.as_str())
            ));
        }
        Ok(())
    }

    async fn execute_prune(
        &self,
        ctx: &Context,
        backups: &BackupManager,
        filter: Option<&Filename>,
    ) -> Result<()> {
        let fmt = ctx.formatter();
        let removed = match filter {
            Some(filename) => backups.prune(filename).await?,
            None => backups.prune_all().await?,
        };
        info!(removed, "Pruned backups");

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({ "removed": removed }));
        } else {
            fmt.success(&format!("Removed {removed} backup(s)"));
        }
        Ok(())
    }
}

fn manager(config: &Config) -> BackupManager {
    BackupManager::new(config.backup_dir(), config.backup.max_per_file)
}
