//! # Money Module
//!
//! Integer money for every total, payment and drawer amount.
//!
//! ## Why Integers?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The drawer must reconcile to the franc:                                │
//! │                                                                         │
//! │    opening 5000 + sales 3000 = expected 8000                            │
//! │    counted 8200 → variance +200                                         │
//! │                                                                         │
//! │  With floats, 0.1 + 0.2 != 0.3 and a drawer can "lose" money that was   │
//! │  never missing. Amounts are stored in the smallest currency unit        │
//! │  (FCFA has no minor unit, so 1000 is one thousand francs).              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use maquis_core::money::Money;
//!
//! let unit_price = Money::new(1000);
//! let line = unit_price.multiply_quantity(2);
//! assert_eq!((line + Money::new(500)).amount(), 2500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// A monetary value in the smallest currency unit.
///
/// Signed so that variances (shortages) and adjustments can be negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from an amount in the smallest unit.
    #[inline]
    pub const fn new(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the raw amount.
    #[inline]
    pub const fn amount(&self) -> i64 {
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

    /// Multiplies a unit price by a line quantity.
    ///
    /// ```rust
    /// use maquis_core::money::Money;
    ///
    /// assert_eq!(Money::new(1000).multiply_quantity(2).amount(), 2000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Like [`multiply_quantity`](Self::multiply_quantity), `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(amount) => Some(Money(amount)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(amount) => Some(Money(amount)),
            None => None,
        }
    }

    /// Clamps negative values to zero.
    ///
    /// Used for the credit exposure of an order: `max(0, total - paid)`.
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }
}

impl Money {
    /// Space-grouped thousands followed by `symbol`: `-12 500 FCFA`.
    pub fn format_with(&self, symbol: &str) -> String {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(' ');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{} {}", sign, grouped, symbol)
    }
}

/// Renders amounts the way receipts in the franc zone print them: `12 500 FCFA`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_with("FCFA"))
    }
}

impl From<i64> for Money {
    fn from(amount: i64) -> Self {
        Money(amount)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::new(0).to_string(), "0 FCFA");
        assert_eq!(Money::new(500).to_string(), "500 FCFA");
        assert_eq!(Money::new(2500).to_string(), "2 500 FCFA");
        assert_eq!(Money::new(1_250_000).to_string(), "1 250 000 FCFA");
        assert_eq!(Money::new(-200).to_string(), "-200 FCFA");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::new(1000);
        let b = Money::new(500);

        assert_eq!((a + b).amount(), 1500);
        assert_eq!((a - b).amount(), 500);
        assert_eq!((a * 3).amount(), 3000);

        let mut c = a;
        c += b;
        c -= Money::new(100);
        assert_eq!(c.amount(), 1400);
    }

    #[test]
    fn test_checked_arithmetic() {
        let price = Money::new(i64::MAX / 2);
        assert_eq!(Money::new(1000).checked_multiply_quantity(3), Some(Money::new(3000)));
        assert_eq!(price.checked_multiply_quantity(3), None);
        assert_eq!(price.checked_add(price), Some(Money::new(i64::MAX - 1)));
        assert_eq!(price.checked_add(price).and_then(|m| m.checked_add(Money::new(2))), None);
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Money::new(-300).floor_zero(), Money::zero());
        assert_eq!(Money::new(300).floor_zero().amount(), 300);
    }

    #[test]
    fn test_sum() {
        let lines = vec![Money::new(2000), Money::new(500)];
        let total: Money = lines.iter().sum();
        assert_eq!(total.amount(), 2500);

        let empty: Vec<Money> = Vec::new();
        assert!(empty.into_iter().sum::<Money>().is_zero());
    }

    #[test]
    fn test_sign_checks() {
        assert!(Money::new(1).is_positive());
        assert!(Money::new(-1).is_negative());
        assert!(!Money::zero().is_positive());
    }
}
