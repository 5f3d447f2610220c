//! Minimum-interval throttling for outbound release checks.
//!
//! The timestamp of the last check is written when a check *starts*, so
//! checks run on a fixed cadence instead of a sliding one.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::store::KeyValueStore;

/// Store key holding the unix timestamp of the last check.
pub const LAST_CHECK_KEY: &str = "release_checker_last_check";

/// Default minimum number of seconds between two checks.
pub const DEFAULT_MIN_SECONDS_BETWEEN_CHECKS: u64 = 60;

/// Current unix time in seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Seconds elapsed between `last_check` and `now`.
///
/// Negative when the stored timestamp lies in the future.
pub fn seconds_since_last_check(now: i64, last_check: i64) -> i64 {
    now.saturating_sub(last_check)
}

/// How long a caller must wait before checking again.
///
/// Zero once `elapsed` reaches `min_interval`. A negative `elapsed` counts
/// as no time having passed.
///
/// ```
/// use std::time::Duration;
/// use release_checker::throttle::should_delay;
///
/// assert_eq!(should_delay(30, 60), Duration::from_secs(30));
/// assert_eq!(should_delay(90, 60), Duration::ZERO);
/// ```
pub fn should_delay(elapsed: i64, min_interval: u64) -> Duration {
    let elapsed = u64::try_from(elapsed).unwrap_or(0);
    Duration::from_secs(min_interval.saturating_sub(elapsed))
}

/// Gate in front of the release-list provider.
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    min_interval: u64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, min_seconds_between_checks: u64) -> Self {
        Self {
            store,
            min_interval: min_seconds_between_checks,
        }
    }

    /// Timestamp of the last recorded check.
    ///
    /// With nothing recorded yet this is `now`, so the first check ever
    /// made also waits a full interval.
    pub fn last_check(&self, now: i64) -> i64 {
        self.store.get_int(LAST_CHECK_KEY, now)
    }

    /// Timestamp actually stored, if any check was ever recorded.
    pub fn recorded_check(&self) -> Option<i64> {
        Some(self.store.get_int(LAST_CHECK_KEY, i64::MIN)).filter(|&ts| ts != i64::MIN)
    }

    pub fn elapsed(&self, now: i64) -> i64 {
        seconds_since_last_check(now, self.last_check(now))
    }

    /// Remaining wait before the next check may start.
    pub fn remaining_wait(&self, now: i64) -> Duration {
        should_delay(self.elapsed(now), self.min_interval)
    }

    pub fn interval_elapsed(&self, now: i64) -> bool {
        self.remaining_wait(now).is_zero()
    }

    /// Marks `now` as the start of a check.
    pub fn record_check(&self, now: i64) -> Result<()> {
        self.store.set_int(LAST_CHECK_KEY, now)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval)
    }
}
