//! Time source for token expiry decisions.

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// The token provider asks a `Clock` instead of calling `Utc::now()` so
/// tests can move time forward deterministically.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
