//! Wall-clock access and trial-end arithmetic.

use chrono::{DateTime, Utc};

/// Seconds in one trial day.
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Source of the current time.
///
/// Handlers take one so trial-end timestamps can be pinned in tests.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Freeze the clock at a Unix timestamp (seconds).
    ///
    /// Out-of-range timestamps fall back to the Unix epoch.
    #[must_use]
    pub fn at_unix(seconds: i64) -> Self {
        Self(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Absolute trial end (Unix seconds) for a trial of `days` starting at `now`.
///
/// `None` and `Some(0)` both mean "no trial".
#[must_use]
pub fn trial_end(days: Option<u32>, now: DateTime<Utc>) -> Option<i64> {
    match days {
        Some(days) if days > 0 => Some(now.timestamp() + i64::from(days) * SECONDS_PER_DAY),
        _ => None,
    }
}
