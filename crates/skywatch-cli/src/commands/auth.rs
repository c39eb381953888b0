//! Auth commands - Login, Logout, and Status for OneDrive authentication
//!
//! Provides the `skywatch auth` CLI subcommands which:
//! 1. `login`  - Runs the OAuth2 PKCE flow via GraphAuthAdapter and stores
//!    the tokens in the system keyring.
//! 2. `logout` - Clears tokens from the keyring.
//! 3. `status` - Shows whether tokens are stored and how long they stay valid.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use tracing::info;

use skywatch_core::ports::Tokens;
use skywatch_graph::auth::{GraphAuthAdapter, KeyringTokenStorage, OAuth2Config};

use super::CliContext;

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authenticate with OneDrive via OAuth2
    Login {
        /// Custom Azure App ID
        #[arg(long)]
        app_id: Option<String>,
    },
    /// Remove stored credentials
    Logout,
    /// Check authentication status
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            AuthCommand::Login { app_id } => self.execute_login(ctx, app_id.as_deref()).await,
            AuthCommand::Logout => self.execute_logout(ctx),
            AuthCommand::Status => self.execute_status(ctx),
        }
    }

    /// Runs the interactive sign-in and stores the tokens
    async fn execute_login(&self, ctx: &CliContext, cli_app_id: Option<&str>) -> Result<()> {
        let fmt = ctx.printer();
        let mut config = ctx.load_config()?;
        if let Some(app_id) = cli_app_id {
            config.auth.app_id = Some(app_id.to_string());
        }

        let oauth = OAuth2Config::from_auth_config(&config.auth)
            .context("No app_id provided. Use --app-id or set auth.app_id in config.yaml")?;

        info!(app_id = %oauth.app_id, "Starting OAuth2 login");
        fmt.info("Opening browser for Microsoft login...");

        let adapter = GraphAuthAdapter::new(&oauth)?;
        let tokens = adapter.login().await.context("OAuth2 login failed")?;

        if ctx.no_keyring {
            fmt.warn("--no-keyring given; the tokens are not stored");
        } else {
            KeyringTokenStorage::new(config.auth.keyring_user.clone())
                .store(&tokens)
                .context("Failed to store tokens in keyring")?;
        }

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "success": true,
                "stored": !ctx.no_keyring,
                "keyring_user": config.auth.keyring_user,
                "expires_at": tokens.expires_at.to_rfc3339(),
            }));
        } else {
            fmt.success("Signed in to OneDrive");
            fmt.info(&describe_expiry(&tokens, Utc::now()));
        }

        Ok(())
    }

    /// Clears the stored tokens
    fn execute_logout(&self, ctx: &CliContext) -> Result<()> {
        let fmt = ctx.printer();
        let config = ctx.load_config()?;
        let storage = KeyringTokenStorage::new(config.auth.keyring_user.clone());

        info!(user = %storage.username(), "Logging out");
        storage
            .clear()
            .context("Failed to clear tokens from keyring")?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "success": true,
                "keyring_user": storage.username(),
            }));
        } else {
            fmt.success("Signed out; stored tokens removed");
        }

        Ok(())
    }

    /// Reports whether usable tokens are stored
    fn execute_status(&self, ctx: &CliContext) -> Result<()> {
        let fmt = ctx.printer();
        let config = ctx.load_config()?;
        let storage = KeyringTokenStorage::new(config.auth.keyring_user.clone());
        let tokens = storage.load().context("Failed to read tokens from keyring")?;
        let now = Utc::now();

        if ctx.is_json() {
            let json = match &tokens {
                Some(tokens) => serde_json::json!({
                    "signed_in": true,
                    "keyring_user": storage.username(),
                    "expired": tokens.is_expired(),
                    "expires_at": tokens.expires_at.to_rfc3339(),
                    "can_refresh": tokens.refresh_token.is_some(),
                }),
                None => serde_json::json!({
                    "signed_in": false,
                    "keyring_user": storage.username(),
                }),
            };
            fmt.print_json(&json);
            return Ok(());
        }

        match tokens {
            Some(tokens) => {
                fmt.success(&format!("Tokens stored for keyring user '{}'", storage.username()));
                fmt.info(&describe_expiry(&tokens, now));
                if tokens.refresh_token.is_none() {
                    fmt.warn("No refresh token stored; sign-in will be needed once it expires");
                }
            }
            None => {
                fmt.info("Not signed in. Run 'skywatch auth login' to authenticate.");
            }
        }

        Ok(())
    }
}

/// One line describing when the access token expires relative to `now`
fn describe_expiry(tokens: &Tokens, now: DateTime<Utc>) -> String {
    let remaining = tokens.expires_at - now;
    if remaining.num_seconds() <= 0 {
        let renewal = if tokens.refresh_token.is_some() {
            "it will be refreshed on next use"
        } else {
            "sign in again to continue"
        };
        format!("Access token expired; {renewal}")
    } else if remaining.num_minutes() < 1 {
        format!("Access token expires in {}s", remaining.num_seconds())
    } else {
        format!(
            "Access token expires in {}h {}m",
            remaining.num_hours(),
            remaining.num_minutes() % 60
        )
    }
}
