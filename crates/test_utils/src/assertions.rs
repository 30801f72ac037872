//! Custom Test Assertions
//!
//! Assertion helpers for domain types that give more meaningful failure
//! messages than a bare `assert_eq!`.

use core_kernel::{Money, Permillage, PortError};
use domain_building::Apartment;
use domain_payments::PaymentStatus;
use domain_projects::Installment;

/// Asserts an amount in minor units, currency included
pub fn assert_money_cents(actual: &Money, expected_cents: i64) {
    assert_eq!(
        actual.minor(),
        expected_cents,
        "Expected {} minor units, got {}",
        expected_cents,
        actual
    );
}

/// Asserts that money values sum exactly to a total
///
/// # Panics
///
/// Panics on a currency mismatch or when the sum differs from `total`
pub fn assert_money_sum_equals(parts: &[Money], total: &Money) {
    let sum = Money::sum(total.currency(), parts.iter()).expect("Currency mismatch in sum");
    assert_eq!(
        sum, *total,
        "Sum of parts ({}) doesn't equal total ({})",
        sum, total
    );
}

/// Asserts that no two shares differ by more than one minor unit
pub fn assert_shares_within_one_cent(shares: &[Money]) {
    let min = shares.iter().map(Money::minor).min().unwrap_or(0);
    let max = shares.iter().map(Money::minor).max().unwrap_or(0);
    assert!(
        max - min <= 1,
        "Shares spread {} minor units: min={}, max={}",
        max - min,
        min,
        max
    );
}

/// Asserts that apartments' permillage totals exactly 1000
pub fn assert_permillage_whole(apartments: &[Apartment]) {
    let total = domain_building::permillage_total(apartments);
    assert_eq!(
        total,
        Permillage::WHOLE,
        "Permillage totals {}, expected {}",
        total,
        Permillage::WHOLE
    );
}

/// Asserts the status of every installment in a schedule
pub fn assert_installments_status(installments: &[Installment], expected: PaymentStatus) {
    for installment in installments {
        assert_eq!(
            installment.status, expected,
            "Installment {} of {} is {}, expected {}",
            installment.installment_number, installment.unit, installment.status, expected
        );
    }
}

/// Asserts that a port error is a conflict
pub fn assert_conflict<T: std::fmt::Debug>(result: Result<T, PortError>) {
    match result {
        Err(e) if e.is_conflict() => {}
        other => panic!("Expected Conflict, got {:?}", other),
    }
}

/// Asserts that a port error is a not-found
pub fn assert_not_found<T: std::fmt::Debug>(result: Result<T, PortError>) {
    match result {
        Err(e) if e.is_not_found() => {}
        other => panic!("Expected NotFound, got {:?}", other),
    }
}
