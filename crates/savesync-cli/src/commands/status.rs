//! Status command - Throttle state and tracked files
//!
//! Reads the persisted last-attempt time and scans the save directory. No
//! network calls are made.

use anyhow::Result;
use clap::Args;

use super::Context;
use crate::output::short_checksum;

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let config = ctx.load_config()?;

        // A signed-out session is enough to read bookkeeping
        let manager = ctx.sync_manager(&config, ctx.session(&config)?)?;
        let status = manager.status().await;
        let manifest = manager.local_manifest().await?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "status": status,
                "config_path": ctx.config_path().display().to_string(),
                "save_dir": config.client.save_dir.display().to_string(),
                "tracked": manifest,
            }));
            return Ok(());
        }

        fmt.success(&format!("SaveSync status for {}", status.game_id));
        fmt.field("Save directory", &config.client.save_dir.display().to_string());
        fmt.field(
            "Last attempt",
            &status
                .last_attempt
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
        fmt.field(
            "Next automatic",
            &status
                .next_allowed
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "any time".to_string()),
        );

        if manifest.is_empty() {
            fmt.info("No tracked files");
        } else {
            fmt.info("Tracked files:");
            for record in manifest.records() {
                fmt.info(&format!(
                    "  {:<24} {:>10} B  {}",
                    record.path.as_str(),
                    record.size,
                    short_checksum(record.checksum.as_str())
                ));
            }
        }
        Ok(())
    }
}
