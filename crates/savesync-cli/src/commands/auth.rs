//! Auth commands - Sign in and register with the identity provider
//!
//! Provides the `savesync auth` CLI subcommands:
//! 1. `login`  - Checks a username/password pair against the identity provider
//! 2. `signup` - Registers a new user (confirmation happens out of band)
//!
//! Tokens are never written to disk, so commands that talk to the sync
//! service sign in for the duration of the process. Passwords come from
//! `SAVESYNC_PASSWORD` or, failing that, the first line of stdin.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use savesync_core::config::Config;
use savesync_core::usecases::AuthenticateUseCase;
use tracing::info;

use super::Context;

/// Environment variable consulted when `--username` is not given
pub const USERNAME_ENV: &str = "SAVESYNC_USERNAME";

/// Environment variable holding the password
pub const PASSWORD_ENV: &str = "SAVESYNC_PASSWORD";

/// Who to sign in as
#[derive(Debug, Clone, Default, Args)]
pub struct CredentialArgs {
    /// Account username (defaults to $SAVESYNC_USERNAME)
    #[arg(long, short = 'u')]
    pub username: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Check credentials against the identity provider
    Login {
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// Register a new account
    Signup {
        #[command(flatten)]
        credentials: CredentialArgs,
        /// Email address for account confirmation
        #[arg(long)]
        email: String,
    },
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        match self {
            AuthCommand::Login { credentials } => self.execute_login(ctx, credentials).await,
            AuthCommand::Signup { credentials, email } => {
                self.execute_signup(ctx, credentials, email).await
            }
        }
    }

    async fn execute_login(&self, ctx: &Context, credentials: &CredentialArgs) -> Result<()> {
        let fmt = ctx.formatter();
        let config = ctx.load_config()?;
        let username = resolve_username(credentials)?;

        sign_in(ctx, &config, credentials).await?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "authenticated": true,
                "username": username,
            }));
        } else {
            fmt.success(&format!("Signed in as {username}"));
            fmt.info("Tokens are kept in memory only; sync commands sign in again.");
        }
        Ok(())
    }

    async fn execute_signup(
        &self,
        ctx: &Context,
        credentials: &CredentialArgs,
        email: &str,
    ) -> Result<()> {
        let fmt = ctx.formatter();
        let config = ctx.load_config()?;
        let username = resolve_username(credentials)?;
        let password = read_password()?;

        info!(username = %username, "Registering account");
        ctx.session(&config)?
            .signup(&username, &password, email)
            .await
            .context("Sign-up failed")?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "registered": true,
                "username": username,
                "email": email,
            }));
        } else {
            fmt.success(&format!("Registered {username}"));
            fmt.info(&format!("Check {email} to confirm the account before signing in."));
        }
        Ok(())
    }
}

/// Signs in with the given or environment-provided credentials
pub async fn sign_in(
    ctx: &Context,
    config: &Config,
    credentials: &CredentialArgs,
) -> Result<Arc<AuthenticateUseCase>> {
    let username = resolve_username(credentials)?;
    let password = read_password()?;

    let session = ctx.session(config)?;
    session
        .login(&username, &password)
        .await
        .with_context(|| format!("Sign-in failed for {username}"))?;
    Ok(session)
}

fn resolve_username(credentials: &CredentialArgs) -> Result<String> {
    let username = match &credentials.username {
        Some(username) => username.clone(),
        None => std::env::var(USERNAME_ENV).unwrap_or_default(),
    };
    if username.trim().is_empty() {
        bail!("No username given. Use --username or set {USERNAME_ENV}.");
    }
    Ok(username.trim().to_string())
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    password_from(std::io::stdin().lock())
}

fn password_from(mut reader: impl BufRead) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("No password given. Set {PASSWORD_ENV} or pipe it on stdin.");
    }
    Ok(password)
}
