//! Rupee amounts using decimal arithmetic.
//!
//! The store trades in a single currency (INR). Amounts are kept as
//! [`Decimal`] rupees rounded to paise; the payment gateway receives integer
//! minor units via [`Money::to_minor_units`].

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, Sub};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount of money in rupees, always held at two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero rupees.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, rounding to paise (half away from zero).
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(round2(amount))
    }

    /// Create an amount from whole rupees.
    #[must_use]
    pub fn from_rupees(rupees: i64) -> Self {
        Self(Decimal::new(rupees, 0))
    }

    /// Create an amount from paise.
    #[must_use]
    pub fn from_minor_units(paise: i64) -> Self {
        Self(Decimal::new(paise, 2))
    }

    /// The decimal rupee amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Amount in paise, as expected by the payment gateway.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        (self.0 * Decimal::ONE_HUNDRED).round().to_i64()
    }

    /// `true` if the amount is below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// `true` if the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply by a fraction (e.g. `0.18` for 18%), rounding to paise.
    #[must_use]
    pub fn times_rate(&self, rate: Decimal) -> Self {
        Self::new(self.0 * rate)
    }

    /// Take `percent` percent of this amount, rounding to paise.
    #[must_use]
    pub fn percent(&self, percent: Decimal) -> Self {
        Self::new(self.0 * percent / Decimal::ONE_HUNDRED)
    }

    /// Subtract, stopping at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other >= self {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }

    /// Clamp negative amounts to zero.
    #[must_use]
    pub fn non_negative(self) -> Self {
        if self.is_negative() { Self::ZERO } else { self }
    }
}

fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-₹{:.2}", -self.0)
        } else {
            write!(f, "₹{:.2}", self.0)
        }
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        assert_eq!(Money::new(dec("10.005")).amount(), dec("10.01"));
        assert_eq!(Money::new(dec("10.004")).amount(), dec("10.00"));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(Money::new(dec("497.00")).to_minor_units(), Some(49_700));
        assert_eq!(Money::from_minor_units(12_345).amount(), dec("123.45"));
    }

    #[test]
    fn test_percent_and_rate() {
        let amount = Money::from_rupees(400);
        assert_eq!(amount.times_rate(dec("0.18")), Money::from_rupees(72));
        assert_eq!(amount.percent(dec("10")), Money::from_rupees(40));
    }

    #[test]
    fn test_saturating_sub() {
        let a = Money::from_rupees(10);
        assert_eq!(a.saturating_sub(Money::from_rupees(25)), Money::ZERO);
        assert_eq!(a.saturating_sub(Money::from_rupees(4)), Money::from_rupees(6));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_rupees(457).to_string(), "₹457.00");
        assert_eq!((Money::ZERO - Money::from_rupees(5)).to_string(), "-₹5.00");
    }

    #[test]
    fn test_sum_and_mul() {
        let total: Money = [Money::from_rupees(100) * 3, Money::from_rupees(50)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_rupees(350));
    }

    #[test]
    fn test_deserializes_from_number_or_string() {
        let a: Money = serde_json::from_str("499.5").unwrap();
        let b: Money = serde_json::from_str("\"499.50\"").unwrap();
        assert_eq!(a, b);
    }
}
