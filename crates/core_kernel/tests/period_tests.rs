//! Unit tests for billing periods

use chrono::NaiveDate;
use core_kernel::{validate_month_range, BillingPeriod, PeriodError};

#[test]
fn test_new_rejects_invalid_month() {
    assert_eq!(BillingPeriod::new(2024, 0), Err(PeriodError::InvalidMonth(0)));
    assert_eq!(BillingPeriod::new(2024, 13), Err(PeriodError::InvalidMonth(13)));
}

#[test]
fn test_new_rejects_out_of_range_year() {
    assert_eq!(BillingPeriod::new(1900, 1), Err(PeriodError::InvalidYear(1900)));
}

#[test]
fn test_from_date() {
    let date = NaiveDate::from_ymd_opt(2024, 7, 19).unwrap();
    let period = BillingPeriod::from_date(date);
    assert_eq!((period.year(), period.month()), (2024, 7));
    assert_eq!(period.first_day(), NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
}

#[test]
fn test_installment_due_periods_cross_year() {
    let start = BillingPeriod::new(2024, 11).unwrap();
    let due: Vec<String> = (0..4).map(|n| start.add_months(n).unwrap().to_string()).collect();
    assert_eq!(due, vec!["2024-11", "2024-12", "2025-01", "2025-02"]);
}

#[test]
fn test_due_period_past_last_year_is_rejected() {
    let start = BillingPeriod::new(2999, 12).unwrap();
    assert_eq!(start.add_months(0).unwrap(), start);
    assert_eq!(start.add_months(1), Err(PeriodError::InvalidYear(3000)));
}

#[test]
fn test_year_to_date() {
    let period = BillingPeriod::new(2024, 3).unwrap();
    let months: Vec<u32> = period.year_to_date().map(|p| p.month()).collect();
    assert_eq!(months, vec![1, 2, 3]);
}

#[test]
fn test_month_range_full_year() {
    assert_eq!(validate_month_range(1, 12).unwrap().count(), 12);
    assert_eq!(validate_month_range(6, 6).unwrap().count(), 1);
    assert_eq!(validate_month_range(3, 13), Err(PeriodError::InvalidMonth(13)));
}
