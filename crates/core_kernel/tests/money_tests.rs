//! Unit tests for the Money module
//!
//! Tests cover creation from minor units, checked arithmetic, share
//! allocation by permillage, and percentage rounding.

use core_kernel::{allocate_shares, Currency, Money, MoneyError, Percentage, Permillage};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_from_minor_converts_cents_correctly() {
        let m = Money::from_minor(10050, Currency::EUR);
        assert_eq!(m.minor(), 10050);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_from_minor_handles_jpy_no_decimals() {
        let m = Money::from_minor(10000, Currency::JPY);
        assert_eq!(m.amount(), dec!(10000));
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::EUR);
        assert!(m.is_zero());
        assert_eq!(m.currency(), Currency::EUR);
    }

    #[test]
    fn test_currency_from_code_is_case_insensitive() {
        assert_eq!(Currency::from_code("eur"), Some(Currency::EUR));
        assert_eq!(Currency::from_code(" BRL "), Some(Currency::BRL));
        assert_eq!(Currency::from_code("XYZ"), None);
    }

    #[test]
    fn test_serializes_cents_field() {
        let m = Money::from_minor(2500, Currency::EUR);
        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json["cents"], 2500);
        assert_eq!(json["currency"], "EUR");
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::from_minor(1000, Currency::EUR);
        let b = Money::from_minor(250, Currency::EUR);
        assert_eq!(a.checked_add(&b).unwrap().minor(), 1250);
    }

    #[test]
    fn test_checked_sub_may_go_negative() {
        let a = Money::from_minor(1000, Currency::EUR);
        let b = Money::from_minor(1250, Currency::EUR);
        let diff = a.checked_sub(&b).unwrap();
        assert!(diff.is_negative());
        assert_eq!(diff.non_negative(), Money::zero(Currency::EUR));
    }

    #[test]
    fn test_checked_add_currency_mismatch() {
        let eur = Money::from_minor(100, Currency::EUR);
        let usd = Money::from_minor(100, Currency::USD);
        assert!(matches!(
            eur.checked_add(&usd),
            Err(MoneyError::CurrencyMismatch(_, _))
        ));
    }

    #[test]
    fn test_checked_add_overflow() {
        let max = Money::from_minor(i64::MAX, Currency::EUR);
        let one = Money::from_minor(1, Currency::EUR);
        assert_eq!(max.checked_add(&one), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_times_twelve_months() {
        let quota = Money::from_minor(5000, Currency::EUR);
        assert_eq!(quota.times(12).unwrap().minor(), 60000);
    }

    #[test]
    fn test_sum_of_amounts() {
        let items = vec![
            Money::from_minor(100, Currency::EUR),
            Money::from_minor(200, Currency::EUR),
            Money::from_minor(300, Currency::EUR),
        ];
        assert_eq!(Money::sum(Currency::EUR, &items).unwrap().minor(), 600);
        assert!(Money::sum(Currency::EUR, &[]).unwrap().is_zero());
    }

    #[test]
    fn test_display_formats_major_units() {
        assert_eq!(Money::from_minor(123456, Currency::EUR).to_string(), "€ 1234.56");
    }
}

mod allocation {
    use super::*;

    #[test]
    fn test_allocate_equal_parts_distributes_remainder_first() {
        let m = Money::from_minor(100000, Currency::EUR);
        let parts = m.allocate(3).unwrap();
        let cents: Vec<i64> = parts.iter().map(|p| p.minor()).collect();
        assert_eq!(cents, vec![33334, 33333, 33333]);
    }

    #[test]
    fn test_allocate_zero_parts_fails() {
        let m = Money::from_minor(100, Currency::EUR);
        assert!(matches!(
            m.allocate(0),
            Err(MoneyError::InvalidAllocationInput(_))
        ));
    }

    #[test]
    fn test_allocate_by_permillage_weights() {
        let installment = Money::from_minor(50000, Currency::EUR);
        let parts = installment.allocate_by_weights(&[600, 400]).unwrap();
        assert_eq!(parts[0].minor(), 30000);
        assert_eq!(parts[1].minor(), 20000);
    }

    #[test]
    fn test_allocate_shares_keeps_keys_in_input_order() {
        let shares = allocate_shares(1001, &[("3B", 500), ("1A", 500)]).unwrap();
        assert_eq!(shares, vec![("3B", 501), ("1A", 500)]);
    }

    #[test]
    fn test_allocate_shares_with_partial_building() {
        // weights that do not reach 1000 still conserve the total
        let shares = allocate_shares(999, &[(1, 300), (2, 300)]).unwrap();
        let total: i64 = shares.iter().map(|(_, c)| c).sum();
        assert_eq!(total, 999);
    }

    #[test]
    fn test_allocate_shares_skips_zero_weight_entries() {
        let shares = allocate_shares(100, &[(1, 0), (2, 1000)]).unwrap();
        assert_eq!(shares, vec![(1, 0), (2, 100)]);
    }

    #[test]
    fn test_allocate_shares_rejects_negative_total() {
        assert!(matches!(
            allocate_shares(-1, &[(1, 1000)]),
            Err(MoneyError::InvalidAmount(_))
        ));
    }
}

mod weights {
    use super::*;

    #[test]
    fn test_permillage_bounds() {
        assert_eq!(Permillage::new(1000).unwrap().value(), 1000);
        assert!(Permillage::new(1001).is_err());
        assert_eq!(Permillage::new(125).unwrap().to_string(), "125‰");
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        let budget = Money::from_minor(200, Currency::EUR);
        assert_eq!(Percentage::of(&Money::from_minor(1, Currency::EUR), &budget).value(), 1);
        assert_eq!(Percentage::of(&Money::from_minor(199, Currency::EUR), &budget).value(), 100);
    }

    #[test]
    fn test_percentage_of_zero_budget() {
        let zero = Money::zero(Currency::EUR);
        assert_eq!(Percentage::of(&Money::from_minor(10, Currency::EUR), &zero).value(), 0);
    }

    #[test]
    fn test_percentage_never_negative() {
        let budget = Money::from_minor(1000, Currency::EUR);
        assert_eq!(Percentage::of(&Money::from_minor(-500, Currency::EUR), &budget).value(), 0);
    }
}
