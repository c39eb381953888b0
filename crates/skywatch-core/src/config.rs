//! Configuration module for SkyWatch.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{Fingerprint, RemotePath};

/// Default Microsoft Graph API base URL
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Default redirect URI served by the local OAuth callback server
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8400/callback";

/// Default OAuth scopes for reading and writing the user's drive
pub const DEFAULT_SCOPES: &[&str] = &["Files.ReadWrite", "offline_access"];

/// Default Microsoft identity platform authority (personal accounts)
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/consumers";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for SkyWatch.
///
/// Every section falls back to its defaults when omitted from the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watch: WatchConfig,
    pub remote: RemoteConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Settings for the watched resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Backslash-delimited remote path of the watched file.
    pub path: Option<String>,
    /// Seconds between polls.
    pub poll_interval: u64,
    /// Fingerprint of the last known content; suppresses the first change
    /// notification when the remote content still matches it.
    pub seed_fingerprint: Option<String>,
}

/// Remote drive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the Graph API.
    pub base_url: String,
    /// Create folders on the watched path that do not exist yet.
    pub create_missing_folders: bool,
}

/// Authentication / OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Azure AD Application (client) ID. `None` until configured.
    pub app_id: Option<String>,
    /// Redirect URI registered for the application.
    pub redirect_uri: String,
    /// OAuth scopes to request.
    pub scopes: Vec<String>,
    /// Identity platform authority; `/oauth2/v2.0/{authorize,token}` are
    /// appended to it.
    pub authority: String,
    /// Username under which tokens are stored in the system keyring.
    pub keyring_user: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/skywatch/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("skywatch")
            .join("config.yaml")
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.watch.poll_interval)
    }

    /// Parsed seed fingerprint, if one is configured.
    pub fn seed_fingerprint(&self) -> anyhow::Result<Option<Fingerprint>> {
        self.watch
            .seed_fingerprint
            .as_deref()
            .map(|hex| hex.parse::<Fingerprint>())
            .transpose()
            .map_err(Into::into)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: None,
            poll_interval: 10,
            seed_fingerprint: None,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            create_missing_folders: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            authority: DEFAULT_AUTHORITY.to_string(),
            keyring_user: "default".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"watch.poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            });
        };

        // --- watch ---
        if self.watch.poll_interval == 0 {
            push("watch.poll_interval", "must be greater than 0".into());
        }
        if let Some(path) = &self.watch.path {
            if let Err(e) = RemotePath::parse(path) {
                push("watch.path", e.to_string());
            }
        }
        if let Some(seed) = &self.watch.seed_fingerprint {
            if let Err(e) = seed.parse::<Fingerprint>() {
                push("watch.seed_fingerprint", e.to_string());
            }
        }

        // --- remote ---
        match url::Url::parse(&self.remote.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => push(
                "remote.base_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ),
            Err(e) => push("remote.base_url", format!("invalid URL: {e}")),
        }

        // --- auth ---
        if matches!(self.auth.app_id.as_deref(), Some(id) if id.trim().is_empty()) {
            push("auth.app_id", "must not be empty when set".into());
        }
        match url::Url::parse(&self.auth.redirect_uri) {
            Ok(url) if url.host_str().is_none() => {
                push("auth.redirect_uri", "must include a host".into())
            }
            Ok(_) => {}
            Err(e) => push("auth.redirect_uri", format!("invalid URL: {e}")),
        }
        match url::Url::parse(&self.auth.authority) {
            Ok(url) if url.scheme() == "https" || url.scheme() == "http" => {}
            Ok(url) => push(
                "auth.authority",
                format!("unsupported scheme '{}'", url.scheme()),
            ),
            Err(e) => push("auth.authority", format!("invalid URL: {e}")),
        }
        if self.auth.scopes.is_empty() {
            push("auth.scopes", "at least one scope is required".into());
        }
        if self.auth.keyring_user.trim().is_empty() {
            push("auth.keyring_user", "must not be empty".into());
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            push(
                "logging.format",
                format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use skywatch_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .watch_path(r"notes\todo.txt")
///     .watch_poll_interval(30)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- watch ---

    pub fn watch_path(mut self, path: impl Into<String>) -> Self {
        self.config.watch.path = Some(path.into());
        self
    }

    pub fn watch_poll_interval(mut self, seconds: u64) -> Self {
        self.config.watch.poll_interval = seconds;
        self
    }

    pub fn watch_seed_fingerprint(mut self, hex: impl Into<String>) -> Self {
        self.config.watch.seed_fingerprint = Some(hex.into());
        self
    }

    // --- remote ---

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn remote_create_missing_folders(mut self, enabled: bool) -> Self {
        self.config.remote.create_missing_folders = enabled;
        self
    }

    // --- auth ---

    pub fn auth_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.config.auth.app_id = Some(app_id.into());
        self
    }

    pub fn auth_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.auth.redirect_uri = uri.into();
        self
    }

    pub fn auth_scopes(mut self, scopes: Vec<String>) -> Self {
        self.config.auth.scopes = scopes;
        self
    }

    pub fn auth_authority(mut self, authority: impl Into<String>) -> Self {
        self.config.auth.authority = authority.into();
        self
    }

    pub fn auth_keyring_user(mut self, user: impl Into<String>) -> Self {
        self.config.auth.keyring_user = user.into();
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
