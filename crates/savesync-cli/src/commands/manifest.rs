//! Manifest command - Print the local manifest
//!
//! Output is the same JSON document sent in a plan request, so it can be
//! saved and fed to `savesync plan --remote` on another machine.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use savesync_client::ManifestBuilder;

use super::Context;

#[derive(Debug, Args)]
pub struct ManifestCommand {
    /// Scan this directory instead of the configured save directory
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

impl ManifestCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let save_dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => ctx.load_config()?.client.save_dir,
        };

        let manifest = ManifestBuilder::new(&save_dir)
            .build()
            .await
            .with_context(|| format!("Failed to scan {}", save_dir.display()))?;

        // The manifest is the output in both modes
        println!(
            "{}",
            serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?
        );
        Ok(())
    }
}
