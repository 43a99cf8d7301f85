//! CLI configuration.
//!
//! Configuration is loaded from `~/.config/sapflow/config.toml`.
//!
//! ## Example Configuration
//!
//! ```toml
//! [connection]
//! base_url = "https://proxy.example.com/api"
//! auth_url = "https://tenant.authentication.eu10.hana.ondemand.com"
//! client_id = "sb-workflow-client"
//! client_secret_env = "SAPFLOW_CLIENT_SECRET"
//! timeout_seconds = 30
//! default_token_lifetime = 3600
//!
//! [settings]
//! retry_on_auth_expired = true
//! refresh_after_decision = true
//! date_format = "%b %-d, %Y %H:%M"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use sapflow_common::Config;
use sapflow_common::client::{
    DEFAULT_TIMEOUT_SECONDS, DEFAULT_TOKEN_LIFETIME_SECONDS, DEFAULT_TOKEN_MARGIN_SECONDS,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable consulted for the client secret by default.
pub const DEFAULT_SECRET_ENV: &str = "SAPFLOW_CLIENT_SECRET";

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The configuration is incomplete or inconsistent.
    #[error("Configuration error: {0}")]
    Invalid(String),

    /// The environment variable holding the secret is unset or empty.
    #[error("Client secret not found: set the {0} environment variable")]
    MissingSecret(String),
}

/// Result alias for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// CLI configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Endpoints and credentials
    #[serde(default)]
    pub connection: ConnectionProfile,

    /// Optional behaviour settings
    #[serde(default)]
    pub settings: Settings,
}

/// Endpoints and credentials for one SAP tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Base URL of the workflow endpoints (or the proxy in front of them)
    #[serde(default)]
    pub base_url: String,

    /// Base URL of the authorization server
    #[serde(default)]
    pub auth_url: String,

    /// OAuth2 client id
    #[serde(default)]
    pub client_id: String,

    /// Name of the environment variable holding the client secret
    #[serde(default = "default_secret_env")]
    pub client_secret_env: String,

    /// Request timeout in seconds; 0 disables it (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Seconds shaved off each token lifetime (default: 300)
    #[serde(default = "default_token_margin")]
    pub token_margin_seconds: u64,

    /// Lifetime assumed when the token endpoint omits `expires_in` (default: 3600)
    #[serde(default = "default_token_lifetime")]
    pub default_token_lifetime: u64,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_url: String::new(),
            client_id: String::new(),
            client_secret_env: default_secret_env(),
            timeout_seconds: default_timeout(),
            token_margin_seconds: default_token_margin(),
            default_token_lifetime: default_token_lifetime(),
        }
    }
}

/// Optional CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Repeat a call once after the server reports an expired token (default: true)
    #[serde(default = "default_true")]
    pub retry_on_auth_expired: bool,

    /// Print the task list again after a decision (default: true)
    #[serde(default = "default_true")]
    pub refresh_after_decision: bool,

    /// chrono format string for task dates
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry_on_auth_expired: true,
            refresh_after_decision: true,
            date_format: default_date_format(),
        }
    }
}

fn default_secret_env() -> String {
    DEFAULT_SECRET_ENV.to_string()
}

const fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

const fn default_token_margin() -> u64 {
    DEFAULT_TOKEN_MARGIN_SECONDS
}

const fn default_token_lifetime() -> u64 {
    DEFAULT_TOKEN_LIFETIME_SECONDS
}

const fn default_true() -> bool {
    true
}

fn default_date_format() -> String {
    "%b %-d, %Y %H:%M".to_string()
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

impl CliConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicitly given file must exist. A missing default file yields
    /// the defaults so that every value can come from flags.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config directory cannot be determined
    /// - An explicit file doesn't exist or cannot be read
    /// - Deserialization fails
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        let path = Self::config_path()?;
        if !path.exists() {
            log::debug!("No config file at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, cannot be read, or
    /// doesn't parse.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::Invalid(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Returns the default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| invalid("Failed to determine config directory"))?
            .join("sapflow");

        Ok(config_dir.join("config.toml"))
    }

    /// Replaces endpoint URLs with values given on the command line.
    pub fn apply_overrides(&mut self, base_url: Option<String>, auth_url: Option<String>) {
        if let Some(base_url) = base_url {
            self.connection.base_url = base_url;
        }
        if let Some(auth_url) = auth_url {
            self.connection.auth_url = auth_url;
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Either URL is empty
    /// - The client id is empty
    /// - No secret environment variable is named
    /// - The default token lifetime is zero
    /// - The date format contains an unknown specifier
    pub fn validate(&self) -> Result<()> {
        let connection = &self.connection;

        if connection.base_url.trim().is_empty() {
            return Err(invalid("connection.base_url is required (or pass --base-url)"));
        }
        if connection.auth_url.trim().is_empty() {
            return Err(invalid("connection.auth_url is required (or pass --auth-url)"));
        }
        if connection.client_id.trim().is_empty() {
            return Err(invalid("connection.client_id is required"));
        }
        if connection.client_secret_env.trim().is_empty() {
            return Err(invalid("connection.client_secret_env must name a variable"));
        }
        if connection.default_token_lifetime == 0 {
            return Err(invalid("connection.default_token_lifetime must be positive"));
        }

        let mut date_items = StrftimeItems::new(&self.settings.date_format);
        if date_items.any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Invalid(format!(
                "settings.date_format '{}' is not a valid format string",
                self.settings.date_format
            )));
        }

        Ok(())
    }

    /// Builds the client configuration, reading the secret from the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the secret is not set.
    pub fn client_config(&self) -> Result<Config> {
        self.client_config_with(|name| std::env::var(name).ok())
    }

    /// Builds the client configuration using `lookup` to resolve the
    /// secret's environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or `lookup` finds no secret.
    pub fn client_config_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        self.validate()?;
        let connection = &self.connection;

        let secret = lookup(&connection.client_secret_env)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingSecret(connection.client_secret_env.clone()))?;

        let config = Config::new(connection.base_url.trim(), connection.auth_url.trim())
            .with_client_credentials(connection.client_id.trim(), secret)
            .with_token_margin(connection.token_margin_seconds)
            .with_default_token_lifetime(connection.default_token_lifetime);

        Ok(match connection.timeout_seconds {
            0 => config.without_timeout(),
            seconds => config.with_timeout(seconds),
        })
    }
}
