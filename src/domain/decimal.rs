//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Provides canonical parsing from strings, exact wei → ETH conversion and
//! formatting without exponent notation.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of wei in one ether, as a decimal scale.
pub const WEI_SCALE: u32 = 18;

/// Lossless decimal numeric type for prices and PnL.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes as a string so CSV exports round-trip exactly.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

impl Decimal {
    /// Create a Decimal from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Convert an integer amount of wei into ether.
    ///
    /// # Errors
    /// Returns an error if the amount does not fit the 96-bit mantissa.
    pub fn from_wei(wei: u128) -> Result<Self, rust_decimal::Error> {
        let mantissa =
            i128::try_from(wei).map_err(|_| rust_decimal::Error::ExceedsMaximumPossibleValue)?;
        RustDecimal::try_from_i128_with_scale(mantissa, WEI_SCALE).map(|d| Decimal(d.normalize()))
    }

    /// Format the Decimal as a canonical string (no exponent, no trailing zeros).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wei_whole_ether() {
        let d = Decimal::from_wei(35_000_000_000_000_000_000).unwrap();
        assert_eq!(d.to_canonical_string(), "35");
    }

    #[test]
    fn test_from_wei_fractional() {
        let d = Decimal::from_wei(35_990_000_000_000_000_000).unwrap();
        assert_eq!(d.to_canonical_string(), "35.99");

        let one_wei = Decimal::from_wei(1).unwrap();
        assert_eq!(one_wei.to_canonical_string(), "0.000000000000000001");
    }

    #[test]
    fn test_from_wei_zero() {
        assert!(Decimal::from_wei(0).unwrap().is_zero());
    }

    #[test]
    fn test_from_wei_overflow_errors() {
        assert!(Decimal::from_wei(u128::MAX).is_err());
    }

    #[test]
    fn test_decimal_canonical_no_exponent() {
        let decimal = Decimal::from_str_canonical("123.4500").expect("parse failed");
        let formatted = decimal.to_canonical_string();
        assert!(!formatted.contains('e'));
        assert_eq!(formatted, "123.45");
    }

    #[test]
    fn test_decimal_subtraction_and_negation() {
        let a = Decimal::from_str_canonical("40").unwrap();
        let b = Decimal::from_str_canonical("35.5").unwrap();
        assert_eq!((a - b).to_canonical_string(), "4.5");
        assert_eq!((b - a).to_canonical_string(), "-4.5");
        assert_eq!((-a).to_canonical_string(), "-40");
    }

    #[test]
    fn test_decimal_ordering() {
        let a = Decimal::from_str_canonical("10").unwrap();
        let b = Decimal::from_str_canonical("200.01").unwrap();
        assert!(a < b);
    }
}
