//! Order expiry countdown.
//!
//! The countdown is a pure function of the expiry timestamp and the current
//! instant. The instant comes from a [`Clock`] so tests can pin it.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Starts at a base instant; `set` and `advance` move it, `reset` returns to
/// the base.
#[derive(Debug)]
pub struct FixedClock {
    base: DateTime<Utc>,
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock pinned to `base`.
    #[must_use]
    pub const fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            now: Mutex::new(base),
        }
    }

    /// Pin the clock to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock() = instant;
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    /// Return to the base instant.
    pub fn reset(&self) {
        *self.lock() = self.base;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // The guarded value is a plain timestamp; a poisoned lock still holds a valid one.
        self.now
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

/// Time left until `expires_at`, clamped at zero.
#[must_use]
pub fn remaining(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Duration {
    (expires_at - now).max(Duration::zero())
}

/// Render the time left as `DDd HHh MMm SSs left`.
///
/// Every unit is zero-padded to two digits; days grow past two digits when
/// needed. Sub-second remainders are dropped.
#[must_use]
pub fn format_remaining(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> String {
    let total = remaining(now, expires_at).num_seconds();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    format!("{days:02}d {hours:02}h {minutes:02}m {seconds:02}s left")
}

/// Countdown to a fixed expiry instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    expires_at: DateTime<Utc>,
}

impl Countdown {
    /// Count down to `expires_at`.
    #[must_use]
    pub const fn new(expires_at: DateTime<Utc>) -> Self {
        Self { expires_at }
    }

    /// The expiry instant.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Render the countdown at the clock's current instant.
    #[must_use]
    pub fn render(&self, clock: &dyn Clock) -> String {
        format_remaining(clock.now(), self.expires_at)
    }

    /// Whether the expiry has passed at the clock's current instant.
    #[must_use]
    pub fn is_elapsed(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.expires_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2018-12-05T13:47:16.446Z".parse().unwrap()
    }

    #[test]
    fn test_format_remaining() {
        let expires = now()
            + Duration::days(1)
            + Duration::hours(4)
            + Duration::minutes(22)
            + Duration::seconds(59);
        assert_eq!(format_remaining(now(), expires), "01d 04h 22m 59s left");
    }

    #[test]
    fn test_format_remaining_drops_subseconds() {
        let expires = now() + Duration::seconds(5) + Duration::milliseconds(999);
        assert_eq!(format_remaining(now(), expires), "00d 00h 00m 05s left");
    }

    #[test]
    fn test_format_remaining_after_expiry() {
        let expires = now() - Duration::hours(3);
        assert_eq!(format_remaining(now(), expires), "00d 00h 00m 00s left");
    }

    #[test]
    fn test_format_remaining_three_digit_days() {
        let expires = now() + Duration::days(120);
        assert_eq!(format_remaining(now(), expires), "120d 00h 00m 00s left");
    }

    #[test]
    fn test_countdown_follows_clock() {
        let clock = FixedClock::new(now());
        let countdown = Countdown::new(now() + Duration::days(1));
        assert_eq!(countdown.render(&clock), "01d 00h 00m 00s left");

        clock.advance(Duration::seconds(1));
        assert_eq!(countdown.render(&clock), "00d 23h 59m 59s left");
        assert!(!countdown.is_elapsed(&clock));

        clock.set(now() + Duration::days(2));
        assert!(countdown.is_elapsed(&clock));

        clock.reset();
        assert_eq!(clock.now(), now());
    }
}
