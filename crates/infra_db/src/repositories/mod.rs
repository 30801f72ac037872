//! Postgres repositories
//!
//! One repository per domain port. Queries are runtime-checked
//! (`sqlx::query` / `query_as` with `FromRow` rows) and every write that a
//! port documents as conditional is a single statement, or a transaction
//! holding a row lock, so concurrent callers cannot interleave a check and
//! a write.

pub mod building;
pub mod payments;
pub mod projects;
pub mod banking;

pub use building::PgBuildingRepository;
pub use payments::PgPaymentLedgerRepository;
pub use projects::PgProjectRepository;
pub use banking::PgBankingRepository;

use std::str::FromStr;

use core_kernel::{BillingPeriod, Currency, Money};

use crate::error::DatabaseError;

pub(crate) fn money(cents: i64, currency: &str) -> Result<Money, DatabaseError> {
    let currency = Currency::from_code(currency.trim())
        .ok_or_else(|| DatabaseError::corrupt(format!("unknown currency '{}'", currency)))?;
    Ok(Money::from_minor(cents, currency))
}

pub(crate) fn period(year: i32, month: i32) -> Result<BillingPeriod, DatabaseError> {
    let month = u32::try_from(month)
        .map_err(|_| DatabaseError::corrupt(format!("negative month {}", month)))?;
    BillingPeriod::new(year, month).map_err(|e| DatabaseError::corrupt(e.to_string()))
}

pub(crate) fn parse<T: FromStr<Err = String>>(value: &str) -> Result<T, DatabaseError> {
    value.parse().map_err(DatabaseError::corrupt)
}

/// Text array of status names for `= ANY($n)` filters
pub(crate) fn names<T, F: Fn(&T) -> &'static str>(values: &[T], name: F) -> Vec<String> {
    values.iter().map(|v| name(v).to_string()).collect()
}
