//! Bearer token acquisition and caching.
//!
//! [`TokenProvider`] hands out a bearer token, fetching a new one from its
//! [`TokenSource`] only when the [`TokenCache`] holds nothing usable. A
//! cached token is usable while `now < expires_at`, where
//!
//! ```text
//! expires_at = issue_time + declared_lifetime - margin
//! ```
//!
//! so a token is never sent when it could expire mid-flight.
//!
//! The cache is a single slot. Refreshes are not serialized: two callers
//! racing on an empty cache may both fetch, and the last writer wins.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, warn};
use sapflow_common::Config;
use sapflow_common::client::{DEFAULT_TOKEN_LIFETIME_SECONDS, DEFAULT_TOKEN_MARGIN_SECONDS};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::error::ClientError;

/// A bearer token together with the instant it stops being usable.
#[derive(Debug, Clone)]
pub struct CachedToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Creates a token that is usable until `expires_at`.
    #[must_use]
    pub const fn new(value: SecretString, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    /// Creates a token issued at `issued_at` with the given declared
    /// lifetime, shortened by `margin_seconds`.
    #[must_use]
    pub fn issued(
        value: SecretString,
        issued_at: DateTime<Utc>,
        lifetime_seconds: u64,
        margin_seconds: u64,
    ) -> Self {
        let expires_at = issued_at
            .checked_add_signed(seconds(lifetime_seconds))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
            .checked_sub_signed(seconds(margin_seconds))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::new(value, expires_at)
    }

    /// Returns true if the token may still be used at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// The instant after which the token is no longer used.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// The token value.
    #[must_use]
    pub const fn secret(&self) -> &SecretString {
        &self.value
    }
}

fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// In-memory, single-slot token cache.
///
/// Cloning the cache shares the slot, so one cache can be handed to
/// several providers or inspected by tests.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    slot: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token if it is still valid at `now`.
    pub async fn get_valid(&self, now: DateTime<Utc>) -> Option<CachedToken> {
        let slot = self.slot.read().await;
        slot.as_ref().filter(|t| t.is_valid_at(now)).cloned()
    }

    /// Returns the cached token regardless of expiry.
    pub async fn peek(&self) -> Option<CachedToken> {
        self.slot.read().await.clone()
    }

    /// Replaces the cached token.
    pub async fn store(&self, token: CachedToken) {
        *self.slot.write().await = Some(token);
    }

    /// Clears the cache. Returns true if a token was present.
    pub async fn invalidate(&self) -> bool {
        self.slot.write().await.take().is_some()
    }
}

/// Result of a successful token exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// The issued access token.
    pub access_token: SecretString,
    /// Declared lifetime in seconds, if the server sent one.
    pub expires_in: Option<u64>,
}

/// Something that can exchange credentials for a bearer token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Performs one token exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails for any reason.
    async fn fetch_token(&self) -> Result<TokenGrant, ClientError>;
}

/// Hands out bearer tokens, consulting the cache before the source.
#[derive(Clone)]
pub struct TokenProvider {
    source: Arc<dyn TokenSource>,
    cache: TokenCache,
    clock: Arc<dyn Clock>,
    margin_seconds: u64,
    default_lifetime: u64,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("cache", &self.cache)
            .field("margin_seconds", &self.margin_seconds)
            .field("default_lifetime", &self.default_lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    /// Creates a provider over `source` and `cache` using the system clock
    /// and the default 300 second margin.
    #[must_use]
    pub fn new(source: Arc<dyn TokenSource>, cache: TokenCache) -> Self {
        Self {
            source,
            cache,
            clock: Arc::new(SystemClock),
            margin_seconds: DEFAULT_TOKEN_MARGIN_SECONDS,
            default_lifetime: DEFAULT_TOKEN_LIFETIME_SECONDS,
        }
    }

    /// Creates a provider taking margin and default lifetime from `config`.
    #[must_use]
    pub fn from_config(config: &Config, source: Arc<dyn TokenSource>, cache: TokenCache) -> Self {
        Self::new(source, cache)
            .with_margin(config.token_margin_seconds)
            .with_default_lifetime(config.default_token_lifetime)
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the expiry safety margin in seconds.
    #[must_use]
    pub const fn with_margin(mut self, margin_seconds: u64) -> Self {
        self.margin_seconds = margin_seconds;
        self
    }

    /// Sets the lifetime used when the server omits `expires_in`.
    #[must_use]
    pub const fn with_default_lifetime(mut self, lifetime_seconds: u64) -> Self {
        self.default_lifetime = lifetime_seconds;
        self
    }

    /// The cache backing this provider.
    #[must_use]
    pub const fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Returns a usable bearer token.
    ///
    /// Served from the cache when possible; otherwise exactly one exchange
    /// is performed and its result cached.
    ///
    /// # Errors
    ///
    /// Propagates the source's error. Nothing is cached on failure, and an
    /// empty access token is treated as a failure.
    pub async fn get_token(&self) -> Result<SecretString, ClientError> {
        if let Some(token) = self.cache.get_valid(self.clock.now()).await {
            debug!(
                "Using cached token (length {})",
                token.secret().expose_secret().len()
            );
            return Ok(token.secret().clone());
        }

        debug!("Fetching new access token");
        let grant = self.source.fetch_token().await?;

        if grant.access_token.expose_secret().is_empty() {
            return Err(ClientError::InvalidResponse(
                "token endpoint returned an empty access token".to_string(),
            ));
        }

        // A zero lifetime is treated like a missing one.
        let declared = grant.expires_in.filter(|&s| s > 0);
        let lifetime = declared.unwrap_or(self.default_lifetime);
        if lifetime <= self.margin_seconds {
            warn!(
                "Token lifetime {lifetime}s does not exceed the {}s margin; it will not be reused",
                self.margin_seconds
            );
        }

        let token = CachedToken::issued(
            grant.access_token,
            self.clock.now(),
            lifetime,
            self.margin_seconds,
        );
        debug!(
            "New token length {}, usable until {}",
            token.secret().expose_secret().len(),
            token.expires_at()
        );

        let value = token.secret().clone();
        self.cache.store(token).await;
        Ok(value)
    }

    /// Discards the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        if self.cache.invalidate().await {
            debug!("Cached token invalidated");
        }
    }
}
