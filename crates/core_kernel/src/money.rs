//! Money types with precise decimal arithmetic
//!
//! Commerce platforms report prices in many currencies, so the currency is an
//! ISO 4217 alpha-3 code validated on construction rather than a closed enum.
//! Amounts use rust_decimal to avoid floating-point drift when prices travel
//! between systems.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use thiserror::Error;

/// Currencies whose minor unit has zero decimal places
const ZERO_DECIMAL_CURRENCIES: &[&str] = &["JPY", "KRW", "VND", "CLP", "ISK", "UGX", "XAF", "XOF"];

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// ISO 4217 alpha-3 currency code (e.g. "USD")
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub const USD: CurrencyCode = CurrencyCode(*b"USD");
    pub const EUR: CurrencyCode = CurrencyCode(*b"EUR");
    pub const GBP: CurrencyCode = CurrencyCode(*b"GBP");
    pub const PLN: CurrencyCode = CurrencyCode(*b"PLN");
    pub const JPY: CurrencyCode = CurrencyCode(*b"JPY");

    /// Parses a currency code, accepting lowercase input
    pub fn parse(code: &str) -> Result<Self, MoneyError> {
        let upper = code.trim().to_ascii_uppercase();
        let bytes = upper.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(MoneyError::InvalidCurrency(code.to_string()));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &str {
        // Only ASCII uppercase letters are ever stored
        std::str::from_utf8(&self.0).unwrap_or("XXX")
    }

    /// Returns the number of decimal places of the minor unit
    pub fn decimal_places(&self) -> u32 {
        if ZERO_DECIMAL_CURRENCIES.contains(&self.code()) {
            0
        } else {
            2
        }
    }
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyCode({})", self.code())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> String {
        code.code().to_string()
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A monetary amount with associated currency
///
/// Amounts are stored with 4 decimal places internally so that unit prices
/// reported with sub-cent precision survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: CurrencyCode,
}

impl Money {
    /// Creates a new Money value
    pub fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self {
            amount: amount.round_dp(4),
            currency,
        }
    }

    /// Creates Money from an amount string and currency code, as platforms usually report them
    pub fn parse(amount: &str, currency: &str) -> Result<Self, MoneyError> {
        let currency = CurrencyCode::parse(currency)?;
        let amount = Decimal::from_str(amount.trim())
            .map_err(|_| MoneyError::InvalidAmount(amount.to_string()))?;
        Ok(Self::new(amount, currency))
    }

    /// Creates Money from an integer amount in minor units (e.g., cents)
    pub fn from_minor(minor_units: i64, currency: CurrencyCode) -> Self {
        let divisor = Decimal::new(10_i64.pow(currency.decimal_places()), 0);
        Self::new(Decimal::new(minor_units, 0) / divisor, currency)
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: CurrencyCode) -> Self {
        Self {
            amount: dec!(0),
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> CurrencyCode {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Rounds to the currency's standard decimal places
    pub fn round_to_currency(&self) -> Self {
        Self {
            amount: self.amount.round_dp(self.currency.decimal_places()),
            currency: self.currency,
        }
    }

    /// Checked addition that returns an error on currency mismatch
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    /// Checked subtraction that returns an error on currency mismatch
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount - other.amount, self.currency))
    }

    /// Multiplies by a quantity (e.g., line item quantity)
    pub fn multiply(&self, factor: Decimal) -> Self {
        Self::new(self.amount * factor, self.currency)
    }

    /// Sums a list of amounts that must all share `currency`
    pub fn sum<'a>(
        currency: CurrencyCode,
        items: impl IntoIterator<Item = &'a Money>,
    ) -> Result<Money, MoneyError> {
        items
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
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
            self.currency,
            self.amount,
            dp = dp as usize
        )
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_creation() {
        let m = Money::new(dec!(100.50), CurrencyCode::USD);
        assert_eq!(m.amount(), dec!(100.50));
        assert_eq!(m.currency(), CurrencyCode::USD);
    }

    #[test]
    fn test_money_from_minor() {
        let m = Money::from_minor(10050, CurrencyCode::USD);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_currency_mismatch() {
        let usd = Money::new(dec!(100.00), CurrencyCode::USD);
        let eur = Money::new(dec!(100.00), CurrencyCode::EUR);

        let result = usd.checked_add(&eur);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_currency_code_rejects_garbage() {
        assert!(CurrencyCode::parse("US").is_err());
        assert!(CurrencyCode::parse("U5D").is_err());
        assert_eq!(CurrencyCode::parse("pln").unwrap(), CurrencyCode::PLN);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn money_addition_is_associative(
            a in -1_000_000i64..1_000_000i64,
            b in -1_000_000i64..1_000_000i64,
            c in -1_000_000i64..1_000_000i64
        ) {
            let ma = Money::from_minor(a, CurrencyCode::USD);
            let mb = Money::from_minor(b, CurrencyCode::USD);
            let mc = Money::from_minor(c, CurrencyCode::USD);

            let left = ma.checked_add(&mb).unwrap().checked_add(&mc).unwrap();
            let right = ma.checked_add(&mb.checked_add(&mc).unwrap()).unwrap();
            prop_assert_eq!(left, right);
        }

        #[test]
        fn currency_code_round_trips_through_string(code in "[A-Z]{3}") {
            let parsed = CurrencyCode::parse(&code).unwrap();
            prop_assert_eq!(parsed.code(), code.as_str());
        }
    }
}
