//! Pre-built Test Fixtures
//!
//! Ready-to-use values for common domain types. Fixtures are fixed and
//! predictable so assertions can be written against exact numbers.

use chrono::NaiveDate;
use core_kernel::{BillingPeriod, Currency, Money, Permillage};
use domain_building::Iban;
use once_cell::sync::Lazy;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// An amount in euro cents
    pub fn eur(cents: i64) -> Money {
        Money::from_minor(cents, Currency::EUR)
    }

    /// The default monthly quota, 50.00 EUR
    pub fn monthly_quota() -> Money {
        Self::eur(5000)
    }

    /// A renovation budget, 1000.00 EUR
    pub fn project_budget() -> Money {
        Self::eur(100_000)
    }

    /// A USD amount for currency mismatch tests
    pub fn usd(cents: i64) -> Money {
        Money::from_minor(cents, Currency::USD)
    }
}

/// Fixture for billing periods and booking dates
pub struct PeriodFixtures;

impl PeriodFixtures {
    /// Panics on an invalid month; test input only
    pub fn period(year: i32, month: u32) -> BillingPeriod {
        BillingPeriod::new(year, month).expect("valid test period")
    }

    pub fn january_2024() -> BillingPeriod {
        Self::period(2024, 1)
    }

    pub fn march_2024() -> BillingPeriod {
        Self::period(2024, 3)
    }

    pub fn booking_date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
    }
}

/// IBANs with valid check digits
pub struct IbanFixtures;

impl IbanFixtures {
    pub const GERMAN: &'static str = "DE89370400440532013000";
    pub const BRITISH: &'static str = "GB82WEST12345698765432";
    pub const DUTCH: &'static str = "NL91ABNA0417164300";
    pub const PORTUGUESE: &'static str = "PT50000201231234567890154";

    /// The German IBAN, as printed on a statement
    pub fn german_formatted() -> &'static str {
        "DE89 3704 0044 0532 0130 00"
    }

    pub fn parse(raw: &str) -> Iban {
        Iban::parse(raw).expect("valid test IBAN")
    }
}

/// Every fixture IBAN, parsed
pub static ALL_IBANS: Lazy<Vec<Iban>> = Lazy::new(|| {
    [
        IbanFixtures::GERMAN,
        IbanFixtures::BRITISH,
        IbanFixtures::DUTCH,
        IbanFixtures::PORTUGUESE,
    ]
    .iter()
    .map(|raw| IbanFixtures::parse(raw))
    .collect()
});

/// Permillage splits that total 1000
pub struct PermillageFixtures;

impl PermillageFixtures {
    pub fn of(value: u32) -> Permillage {
        Permillage::new(value).expect("valid test permillage")
    }

    /// Two apartments, 600 and 400
    pub fn two_units() -> Vec<(&'static str, u32)> {
        vec![("1A", 600), ("1B", 400)]
    }

    /// Three apartments whose shares do not divide evenly
    pub fn three_units() -> Vec<(&'static str, u32)> {
        vec![("1A", 333), ("1B", 333), ("2A", 334)]
    }
}
