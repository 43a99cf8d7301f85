//! Client configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Default per-request deadline in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Seconds subtracted from a token's declared lifetime before it is
/// considered expired.
pub const DEFAULT_TOKEN_MARGIN_SECONDS: u64 = 300;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECONDS: u64 = 3600;

/// Configuration for connecting to the SAP workflow API.
///
/// The client secret is stored as a [`SecretString`] and is never
/// serialized.
///
/// # Examples
///
/// ```
/// use sapflow_common::Config;
///
/// let config = Config::new("https://proxy.example.com/api", "https://auth.example.com")
///     .with_client_credentials("my-client", "my-secret")
///     .with_timeout(10);
///
/// assert_eq!(config.timeout_seconds, Some(10));
/// assert_eq!(config.token_url(), "https://auth.example.com/oauth/token");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the resource endpoint (or the proxy in front of it).
    pub base_url: String,
    /// Base URL of the OAuth2 authorization server.
    pub auth_url: String,
    /// OAuth2 client identifier.
    pub client_id: Option<String>,
    /// OAuth2 client secret.
    #[serde(skip_serializing, default)]
    pub client_secret: Option<SecretString>,
    /// Per-request timeout in seconds. `None` disables the deadline.
    pub timeout_seconds: Option<u64>,
    /// Safety margin subtracted from the token lifetime.
    pub token_margin_seconds: u64,
    /// Lifetime assumed when the server does not declare one.
    pub default_token_lifetime: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "/api".to_string(),
            auth_url: String::new(),
            client_id: None,
            client_secret: None,
            timeout_seconds: Some(DEFAULT_TIMEOUT_SECONDS),
            token_margin_seconds: DEFAULT_TOKEN_MARGIN_SECONDS,
            default_token_lifetime: DEFAULT_TOKEN_LIFETIME_SECONDS,
        }
    }
}

impl Config {
    /// Creates a configuration for the given resource and auth base URLs.
    pub fn new(base_url: impl Into<String>, auth_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_url: auth_url.into(),
            ..Default::default()
        }
    }

    /// Sets the OAuth2 client id and secret.
    #[must_use]
    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(SecretString::new(client_secret.into().into()));
        self
    }

    /// Sets the request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Disables the request timeout.
    #[must_use]
    pub const fn without_timeout(mut self) -> Self {
        self.timeout_seconds = None;
        self
    }

    /// Sets the token expiry safety margin in seconds.
    #[must_use]
    pub const fn with_token_margin(mut self, margin_seconds: u64) -> Self {
        self.token_margin_seconds = margin_seconds;
        self
    }

    /// Sets the lifetime assumed when `expires_in` is missing.
    #[must_use]
    pub const fn with_default_token_lifetime(mut self, lifetime_seconds: u64) -> Self {
        self.default_token_lifetime = lifetime_seconds;
        self
    }

    /// Full URL of the token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.auth_url.trim_end_matches('/'))
    }

    /// Joins an endpoint path onto the resource base URL.
    #[must_use]
    pub fn resource_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}
