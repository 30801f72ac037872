//! Property-Based Test Generators
//!
//! Proptest strategies that produce data respecting domain invariants.

use core_kernel::{BillingPeriod, Currency, Money, Permillage};
use proptest::prelude::*;

/// Strategy for supported currencies
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::EUR),
        Just(Currency::USD),
        Just(Currency::GBP),
        Just(Currency::CHF),
        Just(Currency::BRL),
        Just(Currency::JPY),
    ]
}

/// Strategy for positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

/// Strategy for positive EUR amounts
pub fn eur_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|cents| Money::from_minor(cents, Currency::EUR))
}

/// Strategy for positive amounts in any currency
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(cents, currency)| Money::from_minor(cents, currency))
}

/// Strategy for billing periods between 2000 and 2099
pub fn period_strategy() -> impl Strategy<Value = BillingPeriod> {
    (2000i32..2100, 1u32..=12).prop_map(|(year, month)| {
        BillingPeriod::new(year, month).expect("generated month is in range")
    })
}

/// Strategy for `count` permillage shares that total exactly 1000
///
/// Shares may be zero, which a building allows for storage units.
pub fn permillage_split_strategy(count: usize) -> impl Strategy<Value = Vec<Permillage>> {
    proptest::collection::vec(0u32..=Permillage::WHOLE, count.saturating_sub(1))
        .prop_map(|mut cuts| {
            cuts.sort_unstable();
            let mut shares = Vec::with_capacity(cuts.len() + 1);
            let mut previous = 0;
            for cut in cuts {
                shares.push(cut - previous);
                previous = cut;
            }
            shares.push(Permillage::WHOLE - previous);
            shares
                .into_iter()
                .map(|share| Permillage::new(share).expect("share is at most 1000"))
                .collect()
        })
}

/// Strategy for installment counts accepted by project creation
pub fn installment_count_strategy() -> impl Strategy<Value = u32> {
    1u32..=60
}
