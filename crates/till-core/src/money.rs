//! Signed integer money in minor units (paise/cents).
//!
//! A settled bill is reconciled against its lines, its tenders and its
//! journal voucher, so every amount is an `i64` of minor units and every
//! division goes through [`div_round`]. Refunds, negative cash sums and
//! ledger credits are just negative values of the same type.
//!
//! ```rust
//! use till_core::money::Money;
//!
//! let price = Money::from_cents(11800);
//! assert_eq!((price - Money::from_cents(200)).to_string(), "116.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::quantity::Quantity;

// =============================================================================
// Rounding
// =============================================================================

/// Divides `num` by `den`, rounding half away from zero.
///
/// This is the single rounding rule used for line amounts, taxes and the
/// inclusive back-computation, so a refund line rounds to the exact negative
/// of the matching sale line.
///
/// ## Example
/// ```rust
/// use till_core::money::div_round;
///
/// assert_eq!(div_round(5, 2), 3);
/// assert_eq!(div_round(-5, 2), -3);
/// assert_eq!(div_round(4, 3), 1);
/// ```
pub fn div_round(num: i128, den: i128) -> i64 {
    debug_assert!(den != 0, "div_round by zero");
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    rounded as i64
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Signed: refund lines, negative cash sums and ledger credits all flow
/// through the same type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    ///
    /// Used for the grand total: `max(0, subtotal - discount)`.
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Multiplies a unit price by a fractional quantity.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    /// use till_core::quantity::Quantity;
    ///
    /// let price = Money::from_cents(10000); // 100.00
    /// let qty = Quantity::from_milli(1_500); // 1.5
    /// assert_eq!(price.times(qty).cents(), 15000);
    /// ```
    pub fn times(&self, qty: Quantity) -> Money {
        let num = self.0 as i128 * qty.milli() as i128;
        Money(div_round(num, Quantity::SCALE as i128))
    }

    /// Splits the value into two halves that sum back exactly.
    ///
    /// The first half takes the rounded-down share, the second the remainder.
    pub fn halves(&self) -> (Money, Money) {
        let first = self.0 / 2;
        (Money(first), Money(self.0 - first))
    }
}

/// Debug-style display with two decimals. Currency symbols belong to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minor = self.0.unsigned_abs();
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "{}.{:02}", minor / 100, minor % 100)
    }
}

macro_rules! money_op {
    ($trait:ident, $method:ident, $assign:ident, $assign_method:ident, $op:tt) => {
        impl $trait for Money {
            type Output = Money;

            #[inline]
            fn $method(self, rhs: Money) -> Money {
                Money(self.0 $op rhs.0)
            }
        }

        impl $assign for Money {
            #[inline]
            fn $assign_method(&mut self, rhs: Money) {
                *self = *self $op rhs;
            }
        }
    };
}

money_op!(Add, add, AddAssign, add_assign, +);
money_op!(Sub, sub, SubAssign, sub_assign, -);

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(Money::from_cents(11800).to_string(), "118.00");
        assert_eq!(Money::from_cents(2124).to_string(), "21.24");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_div_round_half_away_from_zero() {
        assert_eq!(div_round(15, 10), 2);
        assert_eq!(div_round(14, 10), 1);
        assert_eq!(div_round(-15, 10), -2);
        assert_eq!(div_round(-14, 10), -1);
        assert_eq!(div_round(7, -2), -4);
    }

    #[test]
    fn test_times_fractional_quantity() {
        let price = Money::from_cents(999);
        // 9.99 × 0.333 = 3.32667 → 3.33
        assert_eq!(price.times(Quantity::from_milli(333)).cents(), 333);
        assert_eq!(price.times(Quantity::from_units(3)).cents(), 2997);
    }

    #[test]
    fn test_halves_sum_back() {
        let (a, b) = Money::from_cents(1801).halves();
        assert_eq!(a.cents(), 900);
        assert_eq!(b.cents(), 901);
        assert_eq!((a + b).cents(), 1801);

        let (a, b) = Money::from_cents(-1801).halves();
        assert_eq!((a + b).cents(), -1801);
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Money::from_cents(-1).floor_zero(), Money::zero());
        assert_eq!(Money::from_cents(5).floor_zero().cents(), 5);
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_cents(100), Money::from_cents(250)]
            .iter()
            .sum();
        assert_eq!(total.cents(), 350);
    }
}
