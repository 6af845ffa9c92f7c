use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};

/// Source of "today" for day-granularity age calculations.
pub trait Clock {
    fn today(&self) -> NaiveDate;

    /// Calendar day of `at` in the clock's time zone.
    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate;

    /// Whole days from the day of `at` to today, never negative.
    fn days_since(&self, at: DateTime<Utc>) -> i64 {
        (self.today() - self.local_date(at)).num_days().max(0)
    }
}

/// Wall clock in the process's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&Local).date_naive()
    }
}

/// Pinned clock for reproducible scoring.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    today: NaiveDate,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(today: NaiveDate, offset: FixedOffset) -> Self {
        Self { today, offset }
    }

    pub fn utc(today: NaiveDate) -> Self {
        Self::new(today, Utc.fix())
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }
}
