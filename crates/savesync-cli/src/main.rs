//! SaveSync CLI - Command-line interface for SaveSync
//!
//! Provides commands for:
//! - Signing in and registering with the identity provider
//! - Inspecting the local manifest and dry-running plans
//! - Running start, quit and forced syncs
//! - Listing and pruning pre-overwrite backups
//! - Viewing and validating configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    auth::AuthCommand, backups::BackupsCommand, config::ConfigCommand,
    manifest::ManifestCommand, plan::PlanCommand, status::StatusCommand, sync::SyncCommand,
    Context,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "savesync", version, about = "Game save synchronization")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Synchronize saves with the remote store
    Sync(SyncCommand),
    /// Show throttle state and tracked files
    Status(StatusCommand),
    /// Print the manifest of the local save directory
    Manifest(ManifestCommand),
    /// Dry-run plan resolution against a remote manifest file
    Plan(PlanCommand),
    /// List and prune pre-overwrite backups
    #[command(subcommand)]
    Backups(BackupsCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = Context::new(format, cli.config.as_deref());

    match cli.command {
        Commands::Auth(cmd) => cmd.execute(&ctx).await,
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Manifest(cmd) => cmd.execute(&ctx).await,
        Commands::Plan(cmd) => cmd.execute(&ctx).await,
        Commands::Backups(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}
