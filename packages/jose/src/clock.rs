//! Time source for `iat` stamping and claim validation

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Injectable source of "now"
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant, for tests and replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    /// Freeze at `instant`
    #[must_use]
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// Freeze at a NumericDate (seconds since the epoch); out-of-range
    /// values clamp to the epoch
    #[must_use]
    pub fn at_timestamp(seconds: i64) -> Self {
        Self(
            Utc.timestamp_opt(seconds, 0)
                .single()
                .unwrap_or(DateTime::UNIX_EPOCH),
        )
    }

    /// A clock `by` later than this one; overflow saturates at the
    /// representable bounds
    #[must_use]
    pub fn advanced(&self, by: Duration) -> Self {
        Self(self.0.checked_add_signed(by).unwrap_or(if by < Duration::zero() {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        }))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
