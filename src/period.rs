// 📅 Calendar Periods - (year, month) keys for the monthly series
//
// Month arithmetic is done on the (year, month) pair with integers only.
// Never step by day counts: 28/29/30/31-day months would drift the labels.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month. Ordering is chronological (year first, then month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    /// 1..=12
    pub month: u32,
}

impl YearMonth {
    /// Returns None when month is outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(YearMonth { year, month })
        } else {
            None
        }
    }

    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        YearMonth {
            year: dt.year(),
            month: dt.month(),
        }
    }

    /// The following calendar month
    pub fn next(self) -> Self {
        self.plus_months(1)
    }

    /// Advance by `months` calendar months
    pub fn plus_months(self, months: u32) -> Self {
        let zero_based = self.year as i64 * 12 + (self.month as i64 - 1) + months as i64;
        YearMonth {
            year: zero_based.div_euclid(12) as i32,
            month: (zero_based.rem_euclid(12) + 1) as u32,
        }
    }

    /// Step back by `months` calendar months
    pub fn minus_months(self, months: u32) -> Self {
        let zero_based = self.year as i64 * 12 + (self.month as i64 - 1) - months as i64;
        YearMonth {
            year: zero_based.div_euclid(12) as i32,
            month: (zero_based.rem_euclid(12) + 1) as u32,
        }
    }

    pub fn contains(&self, dt: &NaiveDateTime) -> bool {
        Self::from_datetime(dt) == *self
    }

    /// Chart label, e.g. "2025-01"
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
