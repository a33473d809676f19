use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive calendar window. A range whose `start` is after its `end` is
/// empty and contains no dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    /// The `days`-long window ending on `end`, inclusive. The start saturates
    /// at the earliest representable date.
    pub fn ending_on(end: NaiveDate, days: u32) -> Self {
        let span = Days::new(u64::from(days.max(1)) - 1);
        DateRange::new(end.checked_sub_days(span).unwrap_or(NaiveDate::MIN), end)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn is_empty(self) -> bool {
        self.start > self.end
    }

    pub fn len_days(self) -> i64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).num_days() + 1
        }
    }

    /// The first day after this window, saturating at the last representable date.
    pub fn next_start(self) -> NaiveDate {
        self.end.succ_opt().unwrap_or(NaiveDate::MAX)
    }
}

/// `YYYY-MM` label for the month containing `date`.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// The given day of the calendar month before `date`'s month, clamped to that
/// month's last day (a closing day of 31 lands on Feb 28/29).
pub fn day_in_previous_month(date: NaiveDate, day: u32) -> NaiveDate {
    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    clamped_date(year, month, day)
}

fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let mut d = day.clamp(1, 31);
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, d) {
            return date;
        }
        // Every month has a 28th, so this terminates.
        d -= 1;
    }
}
