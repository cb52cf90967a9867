//! Daily call budget for the external pricing APIs
//!
//! One counter is shared by every path that reaches the catalogue search or
//! market data endpoints, interactive and background alike. The check happens
//! before any network I/O, so a quota breach never wastes a round-trip. The
//! reset is lazy: the first check after a UTC day change zeroes the counter.

use crate::error::{PricingError, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};

/// Default daily ceiling across all pricing paths
pub const DEFAULT_DAILY_LIMIT: u32 = 1000;

/// Calls-made-today counter with lazy UTC-midnight reset
pub struct DailyQuota {
    limit: u32,
    calls_today: u32,
    last_reset: NaiveDate,
}

impl DailyQuota {
    pub fn new(limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            limit,
            calls_today: 0,
            last_reset: now.date_naive(),
        }
    }

    /// Reserve one call. Must be invoked immediately before the network call;
    /// rejects with a retryable quota error once the daily ceiling is reached.
    pub fn check_and_increment(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.roll_day(now);
        if self.calls_today >= self.limit {
            return Err(PricingError::QuotaExceeded {
                retry_after: next_utc_midnight(now),
            });
        }
        self.calls_today += 1;
        Ok(())
    }

    /// Calls recorded so far today
    pub fn calls_today(&mut self, now: DateTime<Utc>) -> u32 {
        self.roll_day(now);
        self.calls_today
    }

    /// Calls left in today's budget
    pub fn remaining(&mut self, now: DateTime<Utc>) -> u32 {
        self.roll_day(now);
        self.limit.saturating_sub(self.calls_today)
    }

    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.last_reset {
            self.calls_today = 0;
            self.last_reset = today;
        }
    }
}

/// The next UTC midnight after `now`, i.e. when the quota resets
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Days::new(1);
    tomorrow.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn rejects_call_over_the_limit() {
        let now = at("2026-08-01T10:00:00Z");
        let mut quota = DailyQuota::new(1000, now);

        for _ in 0..1000 {
            quota.check_and_increment(now).unwrap();
        }

        let err = quota.check_and_increment(now).unwrap_err();
        match err {
            PricingError::QuotaExceeded { retry_after } => {
                assert_eq!(retry_after, at("2026-08-02T00:00:00Z"));
            }
            other => panic!("expected QuotaExceeded, got {}", other),
        }
    }

    #[test]
    fn resets_on_utc_day_rollover() {
        let day1 = at("2026-08-01T23:59:00Z");
        let mut quota = DailyQuota::new(2, day1);

        quota.check_and_increment(day1).unwrap();
        quota.check_and_increment(day1).unwrap();
        assert!(quota.check_and_increment(day1).is_err());

        let day2 = at("2026-08-02T00:01:00Z");
        assert_eq!(quota.calls_today(day2), 0);
        quota.check_and_increment(day2).unwrap();
        assert_eq!(quota.remaining(day2), 1);
    }

    #[test]
    fn remaining_counts_down() {
        let now = at("2026-08-01T10:00:00Z");
        let mut quota = DailyQuota::new(5, now);
        assert_eq!(quota.remaining(now), 5);
        quota.check_and_increment(now).unwrap();
        assert_eq!(quota.remaining(now), 4);
    }

    #[test]
    fn next_midnight_is_start_of_next_day() {
        assert_eq!(
            next_utc_midnight(at("2026-08-01T00:00:00Z")),
            at("2026-08-02T00:00:00Z")
        );
        assert_eq!(
            next_utc_midnight(at("2026-12-31T23:59:59Z")),
            at("2027-01-01T00:00:00Z")
        );
    }
}
