//! Billing periods
//!
//! A `BillingPeriod` is a (year, month) pair. It keys recurring ledger rows
//! and serves as the due date of installments. Ordering is chronological.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Earliest year accepted for a billing period
pub const MIN_YEAR: i32 = 1970;
/// Latest year accepted for a billing period
pub const MAX_YEAR: i32 = 2999;

/// Errors raised when building periods or month ranges
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Month {0} is outside 1-12")]
    InvalidMonth(u32),

    #[error("Year {0} is outside {MIN_YEAR}-{MAX_YEAR}")]
    InvalidYear(i32),

    #[error("End month {end} is before start month {start}")]
    InvalidRange { start: u32, end: u32 },
}

/// A calendar month used as a ledger key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillingPeriod {
    year: i32,
    month: u32,
}

impl BillingPeriod {
    /// Creates a period, validating month and year
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(PeriodError::InvalidYear(year));
        }
        Ok(Self { year, month })
    }

    /// The period containing a calendar date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Returns the period `months` months later
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::InvalidYear` when the result falls past `MAX_YEAR`.
    pub fn add_months(&self, months: u32) -> Result<Self, PeriodError> {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) + months as i64;
        let year = i32::try_from(index / 12).unwrap_or(i32::MAX);
        Self::new(year, (index % 12) as u32 + 1)
    }

    /// First calendar day of the period
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// All periods of `year` from January through this period's month
    pub fn year_to_date(&self) -> impl Iterator<Item = BillingPeriod> {
        let year = self.year;
        (1..=self.month).map(move |month| BillingPeriod { year, month })
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Validates an inclusive month range within one year
///
/// Both ends must lie in 1-12 and `end` must not precede `start`.
pub fn validate_month_range(start: u32, end: u32) -> Result<RangeInclusive<u32>, PeriodError> {
    for month in [start, end] {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
    }
    if end < start {
        return Err(PeriodError::InvalidRange { start, end });
    }
    Ok(start..=end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_months_rolls_over_year() {
        let period = BillingPeriod::new(2024, 11).unwrap();
        assert_eq!(period.add_months(0).unwrap(), period);
        assert_eq!(period.add_months(2).unwrap(), BillingPeriod::new(2025, 1).unwrap());
        assert_eq!(period.add_months(14).unwrap(), BillingPeriod::new(2026, 1).unwrap());
    }

    #[test]
    fn test_ordering_is_chronological() {
        let dec = BillingPeriod::new(2023, 12).unwrap();
        let jan = BillingPeriod::new(2024, 1).unwrap();
        assert!(dec < jan);
    }

    #[test]
    fn test_month_range() {
        assert_eq!(validate_month_range(1, 3).unwrap().count(), 3);
        assert_eq!(
            validate_month_range(5, 2),
            Err(PeriodError::InvalidRange { start: 5, end: 2 })
        );
        assert_eq!(validate_month_range(0, 2), Err(PeriodError::InvalidMonth(0)));
    }
}
