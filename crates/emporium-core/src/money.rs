//! # Money Module
//!
//! Integer-cent money used for sell prices, buy prices, line totals and
//! discounts.
//!
//! ## Rounding Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DISCOUNTS ROUND HALF UP, ON THE DISCOUNT AMOUNT                        │
//! │                                                                         │
//! │  discount = (amount × bps + 5000) / 10000                               │
//! │  paid     = amount − discount                                           │
//! │                                                                         │
//! │  $0.05 at 10%  → discount 0.5¢  → 1¢   → paid $0.04                     │
//! │  $100  at 10%  → discount $10   → paid $90                              │
//! │                                                                         │
//! │  Rounding the discount (not the paid amount) keeps                      │
//! │  paid + discount == amount for every line.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use emporium_core::money::Money;
//! use emporium_core::types::DiscountRate;
//!
//! let line = Money::from_cents(500).multiply_quantity(10); // $50.00
//! let paid = line.apply_discount(DiscountRate::from_bps(1000));
//! assert_eq!(paid.cents(), 4500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use ts_rs::TS;

use crate::types::DiscountRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// Signed so that discounts and profit (which may be negative when an item
/// sells below its buy price) use the same type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
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
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies a unit price by a line quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// The amount taken off by `rate`, rounded half up to the cent.
    ///
    /// ```rust
    /// use emporium_core::money::Money;
    /// use emporium_core::types::DiscountRate;
    ///
    /// let off = Money::from_cents(1999).discount_amount(DiscountRate::from_bps(500));
    /// assert_eq!(off.cents(), 100); // 99.95¢ → $1.00
    /// ```
    pub fn discount_amount(&self, rate: DiscountRate) -> Money {
        // i128 keeps large order totals from overflowing
        let off = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(off as i64)
    }

    /// Returns `self × (1 − rate)`, rounded to the cent.
    pub fn apply_discount(&self, rate: DiscountRate) -> Money {
        *self - self.discount_amount(rate)
    }

    /// Loyalty points for paying this amount: floor(dollars × `per_dollar`).
    ///
    /// Negative amounts earn nothing.
    pub fn points_at(&self, per_dollar: i64) -> i64 {
        if self.0 <= 0 {
            return 0;
        }
        self.0 * per_dollar / 100
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug/receipt formatting; localized display belongs to the front-end.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::default(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(-5)), "-$0.05");
    }

    #[test]
    fn test_discount_rounds_half_up() {
        // 5¢ at 10% is half a cent off
        let paid = Money::from_cents(5).apply_discount(DiscountRate::from_bps(1000));
        assert_eq!(paid.cents(), 4);
    }

    #[test]
    fn test_discount_and_paid_sum_to_amount() {
        let amount = Money::from_cents(12_345);
        for bps in [0, 500, 1000, 1500] {
            let rate = DiscountRate::from_bps(bps);
            assert_eq!(amount.apply_discount(rate) + amount.discount_amount(rate), amount);
        }
    }

    #[test]
    fn test_zero_rate_is_identity() {
        let amount = Money::from_cents(999);
        assert_eq!(amount.apply_discount(DiscountRate::zero()), amount);
    }

    #[test]
    fn test_points_floor() {
        assert_eq!(Money::from_cents(9_000).points_at(10), 900);
        // $12.34 → 123.4 points → 123
        assert_eq!(Money::from_cents(1_234).points_at(10), 123);
        assert_eq!(Money::from_cents(9).points_at(10), 0);
        assert_eq!(Money::from_cents(-500).points_at(10), 0);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 5].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 355);
    }
}
