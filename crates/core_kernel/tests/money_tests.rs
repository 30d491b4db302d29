//! Unit tests for the Money module
//!
//! Tests cover money creation, currency code validation, arithmetic,
//! serialization, and edge cases.

use core_kernel::{Money, CurrencyCode, MoneyError};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::new(dec!(100.123456789), CurrencyCode::USD);
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_from_minor_converts_cents_correctly() {
        let m = Money::from_minor(10050, CurrencyCode::USD);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_from_minor_handles_jpy_no_decimals() {
        let m = Money::from_minor(10000, CurrencyCode::JPY);
        assert_eq!(m.amount(), dec!(10000));
    }

    #[test]
    fn test_parse_from_platform_strings() {
        let m = Money::parse(" 19.99 ", "pln").unwrap();
        assert_eq!(m.amount(), dec!(19.99));
        assert_eq!(m.currency(), CurrencyCode::PLN);
    }

    #[test]
    fn test_parse_rejects_bad_amount() {
        let result = Money::parse("nineteen", "USD");
        assert!(matches!(result, Err(MoneyError::InvalidAmount(_))));
    }

    #[test]
    fn test_parse_rejects_bad_currency() {
        let result = Money::parse("1.00", "DOLLARS");
        assert!(matches!(result, Err(MoneyError::InvalidCurrency(_))));
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(CurrencyCode::EUR);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::new(dec!(10.00), CurrencyCode::USD);
        let b = Money::new(dec!(5.25), CurrencyCode::USD);
        assert_eq!(a.checked_add(&b).unwrap().amount(), dec!(15.25));
    }

    #[test]
    fn test_checked_sub_goes_negative() {
        let a = Money::new(dec!(10.00), CurrencyCode::USD);
        let b = Money::new(dec!(15.00), CurrencyCode::USD);
        let result = a.checked_sub(&b).unwrap();
        assert!(result.is_negative());
        assert_eq!(result.amount(), dec!(-5.00));
    }

    #[test]
    fn test_multiply_by_quantity() {
        let unit = Money::new(dec!(2.50), CurrencyCode::EUR);
        assert_eq!(unit.multiply(dec!(3)).amount(), dec!(7.50));
    }

    #[test]
    fn test_sum_of_line_prices() {
        let prices = vec![
            Money::new(dec!(1.10), CurrencyCode::GBP),
            Money::new(dec!(2.20), CurrencyCode::GBP),
            Money::new(dec!(3.30), CurrencyCode::GBP),
        ];
        let total = Money::sum(CurrencyCode::GBP, &prices).unwrap();
        assert_eq!(total.amount(), dec!(6.60));
    }

    #[test]
    fn test_sum_rejects_mixed_currencies() {
        let prices = vec![
            Money::new(dec!(1.10), CurrencyCode::GBP),
            Money::new(dec!(2.20), CurrencyCode::EUR),
        ];
        let result = Money::sum(CurrencyCode::GBP, &prices);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_negation() {
        let m = Money::new(dec!(4.00), CurrencyCode::USD);
        assert_eq!((-m).amount(), dec!(-4.00));
    }

    #[test]
    fn test_round_to_currency() {
        let m = Money::new(dec!(10.126), CurrencyCode::USD);
        assert_eq!(m.round_to_currency().amount(), dec!(10.13));

        let yen = Money::new(dec!(1000.6), CurrencyCode::JPY);
        assert_eq!(yen.round_to_currency().amount(), dec!(1001));
    }
}

mod formatting {
    use super::*;

    #[test]
    fn test_display_uses_currency_decimal_places() {
        assert_eq!(Money::new(dec!(5), CurrencyCode::USD).to_string(), "USD 5.00");
        assert_eq!(Money::new(dec!(500), CurrencyCode::JPY).to_string(), "JPY 500");
    }

    #[test]
    fn test_json_serialization() {
        let m = Money::new(dec!(12.34), CurrencyCode::EUR);
        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json["currency"], "EUR");

        let back: Money = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_json_rejects_invalid_currency() {
        let json = serde_json::json!({ "amount": "1.00", "currency": "EURO" });
        let result = serde_json::from_value::<Money>(json);
        assert!(result.is_err());
    }
}
