//! Sync command - Synchronize saves with the remote store
//!
//! Provides the `savesync sync` CLI command which:
//! 1. Loads and validates configuration
//! 2. Signs in for the lifetime of the process
//! 3. Wires the sync service, transfer client and sync manager
//! 4. Runs a start-of-session, quit-time or forced sync and reports the outcome

use anyhow::{bail, Result};
use clap::Args;
use savesync_client::SyncOutcome;
use savesync_core::domain::Filename;
use tracing::info;

use super::auth::{sign_in, CredentialArgs};
use super::Context;
use crate::output::{short_checksum, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Ignore the throttle window
    #[arg(long, conflicts_with = "quit")]
    pub force: bool,

    /// Quit-time sync: ignores the throttle, bounded by the quit timeout
    #[arg(long)]
    pub quit: bool,

    /// Mark a file as deleted by the user (repeatable)
    #[arg(long = "delete", value_name = "FILENAME")]
    pub deletes: Vec<String>,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();

        // Step 1: Configuration
        let config = ctx.load_config()?;

        // Step 2: Sign in
        let session = sign_in(ctx, &config, &self.credentials).await?;

        // Step 3: Wire the manager
        let manager = ctx.sync_manager(&config, session)?;
        for name in &self.deletes {
            manager.mark_deleted(Filename::new(name.as_str())?).await;
        }

        // Step 4: Run
        let outcome = if self.quit {
            manager.sync_on_quit().await
        } else if self.force {
            manager.force_sync().await
        } else {
            manager.sync_on_start().await
        };
        info!(success = outcome.is_success(), "Sync finished");

        if ctx.is_json() {
            fmt.print_json(&serde_json::to_value(&outcome)?);
        } else {
            render(&outcome, &*fmt);
        }

        match outcome {
            SyncOutcome::Synced { .. } | SyncOutcome::NothingToDo | SyncOutcome::Throttled { .. } => {
                Ok(())
            }
            _ => bail!("Sync did not complete"),
        }
    }
}

fn render(outcome: &SyncOutcome, fmt: &dyn OutputFormatter) {
    match outcome {
        SyncOutcome::Synced { report } => {
            fmt.success("Sync completed");
            for name in &report.uploaded {
                fmt.info(&format!("\u{2191} {name}"));
            }
            for name in &report.downloaded {
                fmt.info(&format!("\u{2193} {name}"));
            }
            for backup in &report.backups {
                fmt.info(&format!(
                    "backup of {} ({}) at {}",
                    backup.filename,
                    short_checksum(backup.checksum.as_str()),
                    backup.path.display()
                ));
            }
        }
        SyncOutcome::NothingToDo => fmt.success("Already in sync"),
        SyncOutcome::Throttled { next_allowed } => {
            let when = next_allowed
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "now".to_string());
            fmt.warn(&format!("Synced recently; next automatic sync at {when}. Use --force to sync now."));
        }
        SyncOutcome::NotAuthenticated => fmt.error("Not signed in, or the session could not be refreshed"),
        SyncOutcome::AlreadyRunning => fmt.error("Another sync is already running"),
        SyncOutcome::Failed { reason, report } => {
            fmt.error(&format!("Sync failed: {reason}"));
            if let Some(report) = report {
                for failure in &report.failures {
                    fmt.info(&format!("{}: {}", failure.filename, failure.error));
                }
            }
        }
        SyncOutcome::TimedOut => fmt.error("Quit-time sync timed out; local files were left as they were"),
    }
}
