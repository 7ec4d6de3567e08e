//! # Quantity
//!
//! Fractional item quantities (loose goods sold by weight) stored as
//! thousandths, so `1.250 kg` is `1250`. Stock levels use the same unit,
//! which keeps `stock_after = stock_before - Σ quantity` exact.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use ts_rs::TS;

/// A quantity with three decimal places.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Quantity(i64);

impl Quantity {
    /// Thousandths per unit.
    pub const SCALE: i64 = 1_000;

    /// Smallest positive quantity a cart line may hold.
    pub const EPSILON: Quantity = Quantity(1);

    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * Self::SCALE)
    }

    /// Rounds a decimal quantity to three places.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::quantity::Quantity;
    ///
    /// assert_eq!(Quantity::from_decimal(1.2345).milli(), 1235);
    /// assert_eq!(Quantity::from_decimal(2.0).milli(), 2000);
    /// ```
    pub fn from_decimal(value: f64) -> Self {
        Quantity((value * Self::SCALE as f64).round() as i64)
    }

    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn abs(self) -> Self {
        Quantity(self.0.abs())
    }

    /// Clamps to [`Quantity::EPSILON`] so a cart line never holds zero.
    #[inline]
    pub const fn at_least_epsilon(self) -> Self {
        if self.0 < Self::EPSILON.0 {
            Self::EPSILON
        } else {
            self
        }
    }

    /// Decimal value, for display only.
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:03}", sign, abs / Self::SCALE, abs % Self::SCALE)
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl Sub for Quantity {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl Neg for Quantity {
    type Output = Self;

    fn neg(self) -> Self {
        Quantity(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_to_epsilon() {
        assert_eq!(Quantity::zero().at_least_epsilon(), Quantity::EPSILON);
        assert_eq!(Quantity::from_milli(-500).at_least_epsilon(), Quantity::EPSILON);
        assert_eq!(Quantity::from_units(2).at_least_epsilon().milli(), 2000);
    }

    #[test]
    fn test_decimal_rounding() {
        assert_eq!(Quantity::from_decimal(0.0004).milli(), 0);
        assert_eq!(Quantity::from_decimal(0.0005).milli(), 1);
        assert_eq!(Quantity::from_decimal(3.0).milli(), 3000);
    }

    #[test]
    fn test_display() {
        assert_eq!(Quantity::from_milli(1250).to_string(), "1.250");
        assert_eq!(Quantity::from_milli(-5000).to_string(), "-5.000");
    }
}
