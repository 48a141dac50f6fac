//! Structured money: integer minor units tagged with a currency.
//!
//! Menu prices arrive as symbol-prefixed labels such as `"₹59"`. They are
//! parsed once into [`Money`] at the edge; everything downstream works on
//! minor units, and [`Money::label`] turns them back into display text.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use utoipa::ToSchema;

use crate::errors::ServiceError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("invalid price label '{0}'")]
    InvalidLabel(String),

    #[error("negative amount")]
    Negative,

    #[error("currency mismatch: {0} vs {1}")]
    CurrencyMismatch(Currency, Currency),

    #[error("amount overflow")]
    Overflow,
}

impl From<MoneyError> for ServiceError {
    fn from(err: MoneyError) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Currency {
    #[default]
    Inr,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Inr => "₹",
        }
    }

    /// Number of decimal places between major and minor units.
    pub fn exponent(&self) -> u32 {
        match self {
            Currency::Inr => 2,
        }
    }

    fn minor_per_major(&self) -> i64 {
        10_i64.pow(self.exponent())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StoredMoney")]
pub struct Money {
    minor: i64,
    currency: Currency,
}

/// Wire shape of [`Money`]; decoding goes through [`Money::from_minor`].
#[derive(Deserialize)]
struct StoredMoney {
    minor: i64,
    currency: Currency,
}

impl TryFrom<StoredMoney> for Money {
    type Error = MoneyError;

    fn try_from(stored: StoredMoney) -> Result<Self, Self::Error> {
        Money::from_minor(stored.minor, stored.currency)
    }
}

impl Money {
    pub fn from_minor(minor: i64, currency: Currency) -> Result<Self, MoneyError> {
        if minor < 0 {
            return Err(MoneyError::Negative);
        }
        Ok(Self { minor, currency })
    }

    pub fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Parses a menu price label such as `"₹59"`, `"₹ 59.50"` or `"59"`.
    pub fn parse_label(label: &str, currency: Currency) -> Result<Self, MoneyError> {
        let invalid = || MoneyError::InvalidLabel(label.to_string());
        let trimmed = label.trim();
        let number = trimmed
            .strip_prefix(currency.symbol())
            .unwrap_or(trimmed)
            .trim()
            .replace(',', "");
        if number.is_empty() {
            return Err(invalid());
        }

        let major = Decimal::from_str(&number).map_err(|_| invalid())?;
        if major.is_sign_negative() && !major.is_zero() {
            return Err(MoneyError::Negative);
        }

        let scaled = major
            .checked_mul(Decimal::from(currency.minor_per_major()))
            .ok_or(MoneyError::Overflow)?;
        if scaled.fract() != Decimal::ZERO {
            return Err(invalid());
        }
        let minor = scaled.to_i64().ok_or(MoneyError::Overflow)?;
        Self::from_minor(minor, currency)
    }

    pub fn minor(&self) -> i64 {
        self.minor
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Major units with the currency's fixed scale (`11800` -> `118.00`).
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.minor, self.currency.exponent())
    }

    /// Display label in the menu's style: `₹59`, or `₹59.50` when there are paise.
    pub fn label(&self) -> String {
        let per_major = self.currency.minor_per_major();
        if self.minor % per_major == 0 {
            format!("{}{}", self.currency.symbol(), self.minor / per_major)
        } else {
            format!("{}{}", self.currency.symbol(), self.to_decimal())
        }
    }

    pub fn checked_add(self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(&other)?;
        let minor = self
            .minor
            .checked_add(other.minor)
            .ok_or(MoneyError::Overflow)?;
        Ok(Money { minor, ..self })
    }

    pub fn checked_sub(self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(&other)?;
        let minor = self
            .minor
            .checked_sub(other.minor)
            .ok_or(MoneyError::Overflow)?;
        Money::from_minor(minor, self.currency)
    }

    pub fn checked_mul(self, quantity: u32) -> Result<Money, MoneyError> {
        let minor = self
            .minor
            .checked_mul(i64::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        Ok(Money { minor, ..self })
    }

    /// Splits into `(advance, remaining)` halves.
    ///
    /// An odd number of minor units rounds the advance up, so
    /// `advance + remaining` always equals `self` exactly.
    pub fn split_advance(self) -> (Money, Money) {
        let advance = self.minor - self.minor / 2;
        let remaining = self.minor - advance;
        (
            Money {
                minor: advance,
                ..self
            },
            Money {
                minor: remaining,
                ..self
            },
        )
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(self.currency, other.currency));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal(), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn inr(minor: i64) -> Money {
        Money::from_minor(minor, Currency::Inr).unwrap()
    }

    #[rstest]
    #[case("₹59", 5_900)]
    #[case("₹ 109", 10_900)]
    #[case("₹59.50", 5_950)]
    #[case("350", 35_000)]
    #[case("₹1,250", 125_000)]
    fn parses_menu_labels(#[case] label: &str, #[case] minor: i64) {
        assert_eq!(Money::parse_label(label, Currency::Inr).unwrap(), inr(minor));
    }

    #[rstest]
    #[case("")]
    #[case("₹")]
    #[case("free")]
    #[case("₹59.505")]
    fn rejects_malformed_labels(#[case] label: &str) {
        assert_matches!(
            Money::parse_label(label, Currency::Inr),
            Err(MoneyError::InvalidLabel(_))
        );
    }

    #[test]
    fn rejects_negative_prices() {
        assert_matches!(
            Money::parse_label("-5", Currency::Inr),
            Err(MoneyError::Negative)
        );
    }

    #[test]
    fn stored_amounts_are_checked_on_decode() {
        let stored: Money =
            serde_json::from_value(serde_json::json!({ "minor": 5_900, "currency": "INR" }))
                .unwrap();
        assert_eq!(stored, inr(5_900));

        let negative = serde_json::from_value::<Money>(
            serde_json::json!({ "minor": -100, "currency": "INR" }),
        );
        assert!(negative.unwrap_err().to_string().contains("negative amount"));
    }

    #[test]
    fn labels_round_trip_for_display() {
        assert_eq!(inr(5_900).label(), "₹59");
        assert_eq!(inr(5_950).label(), "₹59.50");
        assert_eq!(inr(11_800).to_decimal(), dec!(118.00));
    }

    #[test]
    fn advance_split_rounds_up_on_odd_paise() {
        let (advance, remaining) = inr(11_800).split_advance();
        assert_eq!((advance.minor(), remaining.minor()), (5_900, 5_900));

        let (advance, remaining) = inr(5_901).split_advance();
        assert_eq!((advance.minor(), remaining.minor()), (2_951, 2_950));
    }

    #[test]
    fn multiplication_detects_overflow() {
        assert_matches!(inr(i64::MAX / 2).checked_mul(3), Err(MoneyError::Overflow));
    }
}
