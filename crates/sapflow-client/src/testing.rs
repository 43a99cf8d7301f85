//! Test doubles shared by the unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;

use crate::clock::Clock;
use crate::error::ClientError;
use crate::token::{TokenGrant, TokenSource};

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map_or_else(|_| Utc::now(), |now| *now)
    }
}

/// Token source returning a fixed grant and counting calls.
pub struct StaticSource {
    token: Option<(String, Option<u64>)>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(token: &str, expires_in: Option<u64>) -> Self {
        Self {
            token: Some((token.to_string(), expires_in)),
            calls: AtomicUsize::new(0),
        }
    }

    pub const fn failing() -> Self {
        Self {
            token: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for StaticSource {
    async fn fetch_token(&self) -> Result<TokenGrant, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.token {
            Some((token, expires_in)) => Ok(TokenGrant {
                access_token: SecretString::new(token.as_str().into()),
                expires_in: *expires_in,
            }),
            None => Err(ClientError::TokenRequestFailed {
                status: Some(401),
                message: "invalid_client".to_string(),
            }),
        }
    }
}
