// SPDX-License-Identifier: GPL-3.0-only

//! Time source for the nutrition store
//!
//! "Today" depends on both the current instant and the local timezone, so
//! both come from the clock.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeDelta, Utc};
use std::fmt::Debug;
use std::sync::Mutex;

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;

    /// Local calendar day containing `instant`
    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate;

    fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }
}

/// Wall clock in the system timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&Local).date_naive()
    }
}

/// Manually driven clock with a fixed UTC offset
#[derive(Debug)]
pub struct FixedClock {
    offset: FixedOffset,
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Clock reading `now`, in `now`'s offset
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            offset: *now.offset(),
            now: Mutex::new(now.with_timezone(&Utc)),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now.with_timezone(&Utc);
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}
