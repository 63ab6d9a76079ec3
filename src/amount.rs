//! Transaction amounts in minor currency units.
//!
//! The vendor SDK takes amounts as an integer count of cents; `R$ 1,00` is
//! `100`. Display goes through `rust_decimal` so logs and receipts show the
//! major-unit value with exactly two decimal places.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a string is not a whole number of minor units.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected a whole number of cents, got {0:?}")]
pub struct AmountParseError(pub String);

/// A non-negative amount expressed in minor currency units.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use pos_bridge::Cents;
///
/// let amount = Cents::from_str("1050").unwrap();
/// assert_eq!(amount.minor_units(), 1050);
/// assert_eq!(amount.to_string(), "10.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cents(u64);

impl Cents {
    /// Decimal places of the major unit.
    pub const SCALE: u32 = 2;

    pub const ZERO: Self = Cents(0);

    pub fn new(minor_units: u64) -> Self {
        Cents(minor_units)
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Value in major units, e.g. `1050` cents is `10.50`.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.0), Self::SCALE)
    }
}

impl FromStr for Cents {
    type Err = AmountParseError;

    /// Parses a plain digit string; signs, separators and fractions are rejected.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountParseError(s.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(Cents)
            .map_err(|_| AmountParseError(s.to_string()))
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_decimal())
    }
}

impl Serialize for Cents {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Cents {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Cents::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_accepts_plain_digits() {
        assert_eq!(Cents::from_str("100").unwrap().minor_units(), 100);
        assert_eq!(Cents::from_str("  2500 ").unwrap().minor_units(), 2500);
        assert!(Cents::from_str("0").unwrap().is_zero());
    }

    #[test]
    fn test_from_str_rejects_non_integers() {
        assert!(Cents::from_str("10.50").is_err());
        assert!(Cents::from_str("-100").is_err());
        assert!(Cents::from_str("+100").is_err());
        assert!(Cents::from_str("").is_err());
        assert!(Cents::from_str("1,00").is_err());
    }

    #[test]
    fn test_display_in_major_units() {
        assert_eq!(Cents::new(100).to_string(), "1.00");
        assert_eq!(Cents::new(5).to_string(), "0.05");
        assert_eq!(Cents::new(123456).to_string(), "1234.56");
        assert_eq!(Cents::ZERO.to_string(), "0.00");
    }
}
