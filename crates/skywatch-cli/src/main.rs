//! SkyWatch CLI - Watch a OneDrive file for changes
//!
//! Provides commands for:
//! - Watching a remote file and reporting each content change
//! - Reading and writing a remote file once
//! - Authentication with OneDrive
//! - Inspecting configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    auth::AuthCommand,
    config::ConfigCommand,
    file::{GetCommand, PutCommand},
    watch::WatchCommand,
    CliContext,
};
use skywatch_core::config::{Config, LoggingConfig};

#[derive(Debug, Parser)]
#[command(name = "skywatch", version, about = "Watch a OneDrive file for changes")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Keep tokens in memory for this run instead of the system keyring
    #[arg(long, global = true)]
    no_keyring: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Poll a remote file and report every content change
    Watch(WatchCommand),
    /// Print the content of a remote file
    Get(GetCommand),
    /// Write a remote file, creating or overwriting it
    Put(PutCommand),
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ctx = CliContext {
        json: cli.json,
        quiet: cli.quiet,
        explicit_config: cli.config.is_some(),
        config_path: cli.config.unwrap_or_else(Config::default_path),
        no_keyring: cli.no_keyring,
    };

    // Logging settings are read leniently; commands load the file strictly
    let logging = Config::load_or_default(&ctx.config_path).logging;
    init_tracing(cli.verbose, cli.quiet, &logging);

    let result = match cli.command {
        Commands::Watch(cmd) => cmd.execute(&ctx).await,
        Commands::Get(cmd) => cmd.execute(&ctx).await,
        Commands::Put(cmd) => cmd.execute(&ctx).await,
        Commands::Auth(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    };

    if let Err(e) = result {
        ctx.printer().error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

/// Installs the tracing subscriber on stderr
///
/// Level precedence: `RUST_LOG`, then `-v`/`-q`, then `logging.level`.
fn init_tracing(verbose: u8, quiet: bool, logging: &LoggingConfig) {
    let level = match verbose {
        0 if quiet => "warn",
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "skywatch",
            "get",
            r"notes\todo.txt",
            "--json",
            "--no-keyring",
            "-vv",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(cli.no_keyring);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Get(_)));
    }

    #[test]
    fn test_put_requires_content_or_file() {
        assert!(Cli::try_parse_from(["skywatch", "put", "a.txt"]).is_err());
        assert!(Cli::try_parse_from([
            "skywatch", "put", "a.txt", "--content", "x", "--file", "f"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["skywatch", "put", "a.txt", "--content", "x"]).is_ok());
    }
}
