//! Money types with exact integer arithmetic
//!
//! Amounts are held in minor units (cents) so that every allocation can be
//! checked for exact conservation. Ownership weights are expressed in
//! permillage (parts per thousand of a building).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    EUR,
    USD,
    GBP,
    CHF,
    BRL,
    JPY,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::EUR => "€",
            Currency::USD => "$",
            Currency::GBP => "£",
            Currency::CHF => "CHF",
            Currency::BRL => "R$",
            Currency::JPY => "¥",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::EUR => "EUR",
            Currency::USD => "USD",
            Currency::GBP => "GBP",
            Currency::CHF => "CHF",
            Currency::BRL => "BRL",
            Currency::JPY => "JPY",
        }
    }

    /// Parses an ISO 4217 code (case-insensitive)
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "EUR" => Some(Currency::EUR),
            "USD" => Some(Currency::USD),
            "GBP" => Some(Currency::GBP),
            "CHF" => Some(Currency::CHF),
            "BRL" => Some(Currency::BRL),
            "JPY" => Some(Currency::JPY),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid allocation input: {0}")]
    InvalidAllocationInput(String),

    #[error("Overflow during calculation")]
    Overflow,
}

/// A monetary amount in minor units with associated currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money {
    #[serde(rename = "cents")]
    minor: i64,
    currency: Currency,
}

impl Money {
    /// Creates Money from an integer amount in minor units (e.g., cents)
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self {
            minor: minor_units,
            currency,
        }
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Returns the amount in minor units
    pub fn minor(&self) -> i64 {
        self.minor
    }

    /// Returns the amount as a decimal in major units (e.g., 12.34)
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.minor, self.currency.decimal_places())
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Returns true if the amount is positive
    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    /// Returns true if the amount is negative
    pub fn is_negative(&self) -> bool {
        self.minor < 0
    }

    /// Clamps negative amounts to zero
    pub fn non_negative(&self) -> Self {
        Self::from_minor(self.minor.max(0), self.currency)
    }

    /// Checked addition that returns an error on currency mismatch or overflow
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let minor = self.minor.checked_add(other.minor).ok_or(MoneyError::Overflow)?;
        Ok(Self::from_minor(minor, self.currency))
    }

    /// Checked subtraction that returns an error on currency mismatch or overflow
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let minor = self.minor.checked_sub(other.minor).ok_or(MoneyError::Overflow)?;
        Ok(Self::from_minor(minor, self.currency))
    }

    /// Multiplies by an integer count (e.g., twelve monthly quotas)
    pub fn times(&self, count: i64) -> Result<Money, MoneyError> {
        let minor = self.minor.checked_mul(count).ok_or(MoneyError::Overflow)?;
        Ok(Self::from_minor(minor, self.currency))
    }

    /// Sums an iterator of amounts, all in `currency`
    pub fn sum<'a, I>(currency: Currency, items: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        items
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    /// Allocates the money into n equal parts, handling remainders
    ///
    /// The remainder is distributed one unit at a time to the first parts,
    /// which is the largest-remainder method for equal weights.
    pub fn allocate(&self, n: u32) -> Result<Vec<Money>, MoneyError> {
        if n == 0 {
            return Err(MoneyError::InvalidAllocationInput(
                "Cannot allocate to zero parts".to_string(),
            ));
        }
        let weights: Vec<(usize, u32)> = (0..n as usize).map(|i| (i, 1)).collect();
        self.allocate_weighted(&weights)
    }

    /// Allocates money proportionally to integer weights (e.g., permillage)
    ///
    /// Returns allocations in the same order as the weights.
    pub fn allocate_by_weights(&self, weights: &[u32]) -> Result<Vec<Money>, MoneyError> {
        let keyed: Vec<(usize, u32)> = weights.iter().copied().enumerate().collect();
        self.allocate_weighted(&keyed)
    }

    fn allocate_weighted(&self, weights: &[(usize, u32)]) -> Result<Vec<Money>, MoneyError> {
        Ok(allocate_shares(self.minor, weights)?
            .into_iter()
            .map(|(_, minor)| Money::from_minor(minor, self.currency))
            .collect())
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places();
        write!(
            f,
            "{} {:.dp$}",
            self.currency.symbol(),
            self.amount(),
            dp = dp as usize
        )
    }
}

/// Splits `total_cents` across weighted entries using the largest-remainder method
///
/// Every entry first receives `floor(total * weight / sum(weights))`. The cents
/// lost to flooring are then handed out one at a time to the entries with the
/// largest fractional remainder, ties going to the earlier entry. The result
/// always sums to exactly `total_cents` and is a pure function of its input.
///
/// # Errors
///
/// - `InvalidAllocationInput` if the weights sum to zero (or the list is empty)
/// - `InvalidAmount` if `total_cents` is negative
///
/// # Example
///
/// ```rust
/// use core_kernel::allocate_shares;
///
/// let shares = allocate_shares(100, &[("a", 1), ("b", 1), ("c", 1)]).unwrap();
/// assert_eq!(shares, vec![("a", 34), ("b", 33), ("c", 33)]);
/// ```
pub fn allocate_shares<K: Clone>(
    total_cents: i64,
    weights: &[(K, u32)],
) -> Result<Vec<(K, i64)>, MoneyError> {
    if total_cents < 0 {
        return Err(MoneyError::InvalidAmount(format!(
            "Cannot allocate a negative total: {}",
            total_cents
        )));
    }

    let weight_sum: i128 = weights.iter().map(|(_, w)| *w as i128).sum();
    if weight_sum == 0 {
        return Err(MoneyError::InvalidAllocationInput(
            "Weights sum to zero, nothing to allocate to".to_string(),
        ));
    }

    let total = total_cents as i128;
    let mut floors = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (_, weight) in weights {
        let scaled = total * (*weight as i128);
        floors.push(scaled / weight_sum);
        remainders.push(scaled % weight_sum);
    }

    let allocated: i128 = floors.iter().sum();
    let leftover = (total - allocated) as usize;

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| remainders[b].cmp(&remainders[a]).then(a.cmp(&b)));
    for &idx in order.iter().take(leftover) {
        floors[idx] += 1;
    }

    weights
        .iter()
        .zip(floors)
        .map(|((key, _), share)| {
            i64::try_from(share)
                .map(|cents| (key.clone(), cents))
                .map_err(|_| MoneyError::Overflow)
        })
        .collect()
}

/// Ownership weight of an apartment, in parts per thousand of the building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permillage(u32);

impl Permillage {
    /// The permillage a complete building sums to
    pub const WHOLE: u32 = 1000;

    /// Creates a permillage, rejecting values above the whole building
    pub fn new(value: u32) -> Result<Self, MoneyError> {
        if value > Self::WHOLE {
            return Err(MoneyError::InvalidAmount(format!(
                "Permillage {} exceeds {}",
                value,
                Self::WHOLE
            )));
        }
        Ok(Self(value))
    }

    /// Returns the raw parts-per-thousand value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Permillage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}‰", self.0)
    }
}

/// An integer percentage in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(u8);

impl Percentage {
    /// Computes `round(100 * part / whole)`, clamped to [0, 100]
    ///
    /// Midpoints round away from zero. A non-positive `whole` yields 0.
    pub fn of(part: &Money, whole: &Money) -> Self {
        if whole.minor() <= 0 {
            return Self(0);
        }
        let ratio = Decimal::from(part.minor()) * dec!(100) / Decimal::from(whole.minor());
        let rounded = ratio.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let clamped = rounded.clamp(Decimal::ZERO, dec!(100));
        Self(clamped.to_u8().unwrap_or(0))
    }

    /// Returns the percentage value
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_minor() {
        let m = Money::from_minor(10050, Currency::EUR);
        assert_eq!(m.minor(), 10050);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_currency_mismatch() {
        let eur = Money::from_minor(100, Currency::EUR);
        let usd = Money::from_minor(100, Currency::USD);

        let result = eur.checked_add(&usd);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_allocate_shares_largest_remainder() {
        // 1000 cents over 333/333/334: floors 333/333/334, nothing left over
        let shares = allocate_shares(1000, &[(1, 333), (2, 333), (3, 334)]).unwrap();
        assert_eq!(shares, vec![(1, 333), (2, 333), (3, 334)]);

        // 10 cents over 3 equal weights: 3/3/3 + 1 cent to the first
        let shares = allocate_shares(10, &[('a', 1), ('b', 1), ('c', 1)]).unwrap();
        assert_eq!(shares, vec![('a', 4), ('b', 3), ('c', 3)]);
    }

    #[test]
    fn test_allocate_shares_prefers_largest_fraction() {
        // 100 cents over 125/875 permillage of a 1000 sum = 12.5 / 87.5
        // both fractions are .5, the tie goes to input order
        let shares = allocate_shares(100, &[("x", 125), ("y", 875)]).unwrap();
        assert_eq!(shares, vec![("x", 13), ("y", 87)]);

        // 7 cents over 100/200/700: 0.7 / 1.4 / 4.9 -> floors 0/1/4, two cents left
        // largest fractions are .9 (z) then .7 (x)
        let shares = allocate_shares(7, &[("x", 100), ("y", 200), ("z", 700)]).unwrap();
        assert_eq!(shares, vec![("x", 1), ("y", 1), ("z", 5)]);
    }

    #[test]
    fn test_allocate_shares_zero_weights() {
        let result = allocate_shares::<u8>(100, &[(1, 0), (2, 0)]);
        assert!(matches!(result, Err(MoneyError::InvalidAllocationInput(_))));

        let result = allocate_shares::<u8>(100, &[]);
        assert!(matches!(result, Err(MoneyError::InvalidAllocationInput(_))));
    }

    #[test]
    fn test_percentage_clamps() {
        let budget = Money::from_minor(1000, Currency::EUR);
        assert_eq!(Percentage::of(&Money::from_minor(1500, Currency::EUR), &budget).value(), 100);
        assert_eq!(Percentage::of(&Money::from_minor(5, Currency::EUR), &budget).value(), 1);
        assert_eq!(Percentage::of(&Money::from_minor(4, Currency::EUR), &budget).value(), 0);
    }
}
