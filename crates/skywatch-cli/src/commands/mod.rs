//! CLI subcommands and the wiring they share
//!
//! Every command that talks to the remote drive builds the same stack:
//! [`GraphSessionProvider`] + [`BrowserSignIn`] + a credential store,
//! owned by one [`AccessController`].

pub mod auth;
pub mod config;
pub mod file;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use skywatch_core::config::Config;
use skywatch_core::ports::{ICredentialStore, InMemoryCredentialStore};
use skywatch_graph::auth::{BrowserSignIn, KeyringTokenStorage};
use skywatch_graph::provider::GraphSessionProvider;
use skywatch_sync::AccessController;

use crate::output::Printer;

/// Global options every command receives
#[derive(Debug, Clone)]
pub struct CliContext {
    pub json: bool,
    pub quiet: bool,
    /// The file was named with `--config` rather than defaulted
    pub explicit_config: bool,
    pub config_path: PathBuf,
    pub no_keyring: bool,
}

impl CliContext {
    pub fn printer(&self) -> Printer {
        Printer::new(self.json, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Loads and validates the configuration
    ///
    /// A missing default file yields defaults; a missing `--config` file,
    /// an unparseable file or any validation error fails.
    pub fn load_config(&self) -> Result<Config> {
        let config = if self.config_path.exists() {
            Config::load(&self.config_path).with_context(|| {
                format!("Failed to load configuration from {}", self.config_path.display())
            })?
        } else if self.explicit_config {
            anyhow::bail!("Configuration file {} not found", self.config_path.display());
        } else {
            debug!(path = %self.config_path.display(), "No configuration file, using defaults");
            Config::default()
        };

        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow::bail!("Invalid configuration: {}", messages.join("; "));
        }

        Ok(config)
    }

    /// Token store for this run: the keyring unless `--no-keyring`
    pub fn credential_store(&self, config: &Config) -> Arc<dyn ICredentialStore> {
        if self.no_keyring {
            Arc::new(InMemoryCredentialStore::new())
        } else {
            Arc::new(KeyringTokenStorage::new(config.auth.keyring_user.clone()))
        }
    }

    /// Builds the access controller over Microsoft Graph
    pub fn build_controller(&self, config: &Config) -> Result<Arc<AccessController>> {
        let provider = GraphSessionProvider::from_config(config).context(
            "Cannot sign in without auth.app_id; set it in the configuration file",
        )?;

        let controller = AccessController::new(
            Arc::new(provider),
            Arc::new(BrowserSignIn::new()),
            self.credential_store(config),
        )
        .with_create_missing_folders(config.remote.create_missing_folders);

        Ok(Arc::new(controller))
    }
}

/// The remote path from the argument, else from `watch.path`
pub fn resolve_path(arg: Option<&str>, config: &Config) -> Result<String> {
    arg.map(str::to_string)
        .or_else(|| config.watch.path.clone())
        .context("No remote path given; pass one or set watch.path in the configuration file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn context(path: PathBuf, explicit: bool) -> CliContext {
        CliContext {
            json: false,
            quiet: false,
            explicit_config: explicit,
            config_path: path,
            no_keyring: true,
        }
    }

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().join("config.yaml"), false);
        let config = ctx.load_config().unwrap();
        assert_eq!(config.watch.poll_interval, 10);
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().join("absent.yaml"), true);
        assert!(ctx.load_config().is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "watch:\n  poll_interval: 0").unwrap();
        let ctx = context(file.path().to_path_buf(), true);

        let err = ctx.load_config().unwrap_err();
        assert!(err.to_string().contains("watch.poll_interval"));
    }

    #[test]
    fn test_resolve_path_prefers_argument() {
        let mut config = Config::default();
        config.watch.path = Some(r"notes\todo.txt".to_string());

        assert_eq!(resolve_path(Some("other.txt"), &config).unwrap(), "other.txt");
        assert_eq!(resolve_path(None, &config).unwrap(), r"notes\todo.txt");

        config.watch.path = None;
        assert!(resolve_path(None, &config).is_err());
    }

    #[test]
    fn test_build_controller_requires_app_id() {
        let ctx = context(PathBuf::from("unused.yaml"), false);
        let mut config = Config::default();
        assert!(ctx.build_controller(&config).is_err());

        config.auth.app_id = Some("app-id".to_string());
        let controller = ctx.build_controller(&config).unwrap();
        assert!(!controller.is_revoked());
    }
}
