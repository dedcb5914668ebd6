//! Gregorian calendar date, used by the time system and by historical
//! date-layering in `archon-data`.

use serde::{Deserialize, Serialize};

const DAYS_IN_MONTH: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[inline]
fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[inline]
fn days_in_month(year: i32, month: u8) -> u8 {
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS_IN_MONTH[(month - 1) as usize]
    }
}

/// A calendar date, Gregorian, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Date {
    pub year: i32,
    pub month: u8, // 1-12
    pub day: u8,   // 1-31, validated against the month/year
}

impl Date {
    pub fn new(year: i32, month: u8, day: u8) -> Self {
        debug_assert!((1..=12).contains(&month), "month out of range: {month}");
        debug_assert!(
            day >= 1 && day <= days_in_month(year, month),
            "day {day} out of range for {year}-{month}"
        );
        Self { year, month, day }
    }

    /// Adds a number of days, rolling over months/years using the true
    /// Gregorian calendar (including leap years).
    pub fn add_days(&self, days: u32) -> Self {
        let mut day = self.day as u32;
        let mut month = self.month;
        let mut year = self.year;
        let mut remaining = days;

        loop {
            let dim = days_in_month(year, month) as u32;
            let room = dim - day + 1;
            if remaining < room {
                day += remaining;
                break;
            }
            remaining -= room;
            day = 1;
            month += 1;
            if month > 12 {
                month = 1;
                year += 1;
            }
        }

        Self { year, month, day: day as u8 }
    }

    pub fn add_years(&self, years: i32) -> Self {
        let year = self.year + years;
        let day = self.day.min(days_in_month(year, self.month));
        Self { year, month: self.month, day }
    }

    /// Total days elapsed since 0001-01-01 (proleptic Gregorian), used to
    /// compare/subtract dates without re-walking the calendar each time.
    pub fn days_from_epoch(&self) -> i64 {
        let y = self.year as i64 - 1;
        let mut days = y * 365 + y.div_euclid(4) - y.div_euclid(100) + y.div_euclid(400);
        for m in 1..self.month {
            days += days_in_month(self.year, m) as i64;
        }
        days += self.day as i64 - 1;
        days
    }

    pub fn months_since(&self, other: &Date) -> i32 {
        (self.year - other.year) * 12 + self.month as i32 - other.month as i32
    }

    /// True if `self` is the first day of a calendar month.
    pub fn is_month_start(&self) -> bool {
        self.day == 1
    }

    /// True if `self` is January 1st.
    pub fn is_year_start(&self) -> bool {
        self.month == 1 && self.day == 1
    }
}

impl Default for Date {
    fn default() -> Self {
        Self::new(1444, 11, 11)
    }
}

impl std::fmt::Display for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.year, self.month, self.day)
    }
}

impl From<archon_txt::RawDate> for Date {
    fn from(raw: archon_txt::RawDate) -> Self {
        Date::new(raw.year, raw.month, raw.day)
    }
}
