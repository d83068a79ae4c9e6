//! Calendar source for token timestamps
//!
//! Tokens are stamped with whole days since [`TOKEN_EPOCH`], so the engine
//! only ever needs today's date. The clock is injected to make expiry
//! boundaries testable.

use std::sync::atomic::{AtomicI64, Ordering};

use time::{macros::date, Date, Duration, OffsetDateTime};

/// Day zero for token timestamps. Base 36 keeps the stamp at three
/// characters until roughly 2128.
pub const TOKEN_EPOCH: Date = date!(2001 - 01 - 01);

/// Source of "today"
pub trait Clock: Send + Sync {
    fn today(&self) -> Date;

    /// Whole days between [`TOKEN_EPOCH`] and today
    fn days_since_epoch(&self) -> i64 {
        days_since_epoch(self.today())
    }
}

/// Whole days between [`TOKEN_EPOCH`] and `date`
pub fn days_since_epoch(date: Date) -> i64 {
    (date - TOKEN_EPOCH).whole_days()
}

/// Wall clock, UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Date {
        OffsetDateTime::now_utc().date()
    }
}

/// Clock pinned to a day count, adjustable at runtime
#[derive(Debug, Default)]
pub struct FixedClock {
    days: AtomicI64,
}

impl FixedClock {
    pub fn from_days(days: i64) -> Self {
        Self {
            days: AtomicI64::new(days),
        }
    }

    pub fn set_days(&self, days: i64) {
        self.days.store(days, Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: i64) {
        self.days.fetch_add(days, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> Date {
        let days = self.days.load(Ordering::SeqCst);
        TOKEN_EPOCH
            .checked_add(Duration::days(days))
            .unwrap_or(Date::MAX)
    }

    fn days_since_epoch(&self) -> i64 {
        self.days.load(Ordering::SeqCst)
    }
}
