//! Plan command - Dry-run plan resolution locally
//!
//! Resolves the local manifest against a remote manifest read from a JSON
//! file, using the same resolver the request handler runs. Nothing is
//! transferred and no service is contacted.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Args;
use savesync_client::ManifestBuilder;
use savesync_core::domain::{Filename, Manifest, SyncPlan};
use savesync_plan::PlanResolver;

use super::Context;
use crate::output::{short_checksum, OutputFormatter};

#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Remote manifest JSON file; an absent file means no remote state
    #[arg(long, value_name = "FILE")]
    pub remote: Option<PathBuf>,

    /// Treat a file as deleted by the user (repeatable)
    #[arg(long = "delete", value_name = "FILENAME")]
    pub deletes: Vec<String>,
}

impl PlanCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let config = ctx.load_config()?;

        // Step 1: Both manifests
        let local = ManifestBuilder::new(&config.client.save_dir)
            .build()
            .await
            .context("Failed to build the local manifest")?;
        let remote = match &self.remote {
            Some(path) => read_manifest(path)?,
            None => Manifest::new(),
        };
        let deletes = self
            .deletes
            .iter()
            .map(|name| Filename::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        // Step 2: Resolve
        let plan = PlanResolver::resolve(&local, &remote, &deletes);

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "plan": plan,
                "proposed_manifest": PlanResolver::proposed_manifest(&local, &remote, &plan),
            }));
        } else {
            render(&plan, &*fmt);
        }
        Ok(())
    }
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let manifest: Manifest = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a manifest", path.display()))?;
    manifest
        .validate()
        .with_context(|| format!("{} is not a consistent manifest", path.display()))?;
    Ok(manifest)
}

fn render(plan: &SyncPlan, fmt: &dyn OutputFormatter) {
    if !plan.has_actions() {
        fmt.success("Nothing to do");
        return;
    }

    fmt.success(&format!(
        "{} upload(s), {} download(s), {} delete(s)",
        plan.uploads.len(),
        plan.downloads.len(),
        plan.deletes.len()
    ));
    for name in &plan.uploads {
        fmt.info(&format!("\u{2191} {name}"));
    }
    for name in &plan.downloads {
        fmt.info(&format!("\u{2193} {name}"));
    }
    for name in &plan.deletes {
        fmt.info(&format!("\u{2715} {name}"));
    }
    for conflict in &plan.conflicts {
        fmt.warn(&format!(
            "{}: same timestamp, different content (local {}, remote {}); keeping {:?}",
            conflict.filename,
            short_checksum(conflict.local_checksum.as_str()),
            short_checksum(conflict.remote_checksum.as_str()),
            conflict.winner
        ));
    }
}
