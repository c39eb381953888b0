//! Config command - View and manage SkyWatch configuration
//!
//! Provides the `skywatch config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file location

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use skywatch_core::config::Config;

use super::CliContext;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "watch.poll_interval")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Path => self.execute_path(ctx),
        }
    }

    /// Show the effective configuration
    fn execute_show(&self, ctx: &CliContext) -> Result<()> {
        let printer = ctx.printer();
        let config = Config::load_or_default(&ctx.config_path);

        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            printer.print_json(&json);
        } else {
            printer.success(&format!("Configuration ({})", ctx.config_path.display()));
            printer.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                printer.info(line);
            }
        }

        Ok(())
    }

    /// Set a configuration value using dot-notation and save the file
    fn execute_set(&self, ctx: &CliContext, key: &str, value: &str) -> Result<()> {
        let printer = ctx.printer();
        let mut config = Config::load_or_default(&ctx.config_path);

        info!(key = %key, value = %value, "Setting configuration value");

        apply_config_value(&mut config, key, value)
            .with_context(|| format!("Failed to set '{key}'"))?;

        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow::bail!("Invalid value for '{key}': {}", messages.join("; "));
        }

        if let Some(parent) = ctx.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
        }
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        std::fs::write(&ctx.config_path, yaml).context("Failed to write configuration file")?;

        if ctx.is_json() {
            printer.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": ctx.config_path.display().to_string(),
            }));
        } else {
            printer.success(&format!("Set {key} = {value}"));
            printer.info(&format!("Saved to {}", ctx.config_path.display()));
        }

        Ok(())
    }

    /// Validate the configuration file
    fn execute_validate(&self, ctx: &CliContext) -> Result<()> {
        let printer = ctx.printer();
        let config_path = &ctx.config_path;

        if !config_path.exists() {
            if ctx.is_json() {
                printer.print_json(&serde_json::json!({
                    "valid": true,
                    "config_path": config_path.display().to_string(),
                    "exists": false,
                }));
            } else {
                printer.info(&format!(
                    "Configuration file not found at {}",
                    config_path.display()
                ));
                printer.info("Defaults apply. Run 'skywatch config set <key> <value>' to create one.");
            }
            return Ok(());
        }

        let config = Config::load(config_path).context("Failed to parse configuration")?;

        info!(config_path = %config_path.display(), "Validating configuration");
        let errors = config.validate();

        if ctx.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            printer.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "exists": true,
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            printer.success("Configuration is valid");
            printer.info(&format!("File: {}", config_path.display()));
        } else {
            printer.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            printer.info(&format!("File: {}", config_path.display()));
            for error in &errors {
                printer.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Configuration is invalid")
        }
    }

    fn execute_path(&self, ctx: &CliContext) -> Result<()> {
        let printer = ctx.printer();
        if ctx.is_json() {
            printer.print_json(&serde_json::json!({
                "config_path": ctx.config_path.display().to_string(),
                "exists": ctx.config_path.exists(),
            }));
        } else {
            printer.raw(&ctx.config_path.display().to_string());
        }
        Ok(())
    }
}

/// Apply a dot-notation key/value pair to a Config struct
///
/// Supported keys: every leaf of the `watch`, `remote`, `auth` and `logging`
/// sections. `auth.scopes` takes a comma-separated list; `null` clears the
/// optional values.
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let optional = |value: &str| (value != "null").then(|| value.to_string());

    match key {
        // --- watch ---
        "watch.path" => config.watch.path = optional(value),
        "watch.poll_interval" => {
            config.watch.poll_interval = value
                .parse::<u64>()
                .context("Expected a positive integer for watch.poll_interval")?;
        }
        "watch.seed_fingerprint" => config.watch.seed_fingerprint = optional(value),

        // --- remote ---
        "remote.base_url" => config.remote.base_url = value.to_string(),
        "remote.create_missing_folders" => {
            config.remote.create_missing_folders = value
                .parse::<bool>()
                .context("Expected true or false for remote.create_missing_folders")?;
        }

        // --- auth ---
        "auth.app_id" => config.auth.app_id = optional(value),
        "auth.redirect_uri" => config.auth.redirect_uri = value.to_string(),
        "auth.authority" => config.auth.authority = value.to_string(),
        "auth.keyring_user" => config.auth.keyring_user = value.to_string(),
        "auth.scopes" => {
            config.auth.scopes = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),
        "logging.format" => config.logging.format = value.to_string(),

        _ => anyhow::bail!("Unknown configuration key '{key}'"),
    }

    Ok(())
}
