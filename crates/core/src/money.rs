//! Monetary amounts held as whole US cents.
//!
//! Every price, reservation and budget figure in the pipeline is a [`Money`]
//! so that ledger arithmetic is exact. Conversions from fractional dollars
//! round half-up to two decimal places.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A non-negative-by-convention amount of money in cents.
///
/// Serializes as a decimal dollar amount (`0.5`), which is what API clients
/// and the pricing sheet use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Convert a dollar amount, rounding half-up to the nearest cent.
    pub fn from_dollars(dollars: f64) -> Self {
        Self(round_half_up(dollars * 100.0))
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Subtraction that never goes below zero.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Multiply by a whole quantity.
    pub fn times(self, quantity: u32) -> Money {
        Money(self.0 * i64::from(quantity))
    }

    /// Take `percent` of this amount, rounding half-up to the cent.
    pub fn percent(self, percent: u32) -> Money {
        let scaled = self.0 * i64::from(percent);
        // Half-up on a non-negative numerator; amounts are never negative here.
        Money((scaled + 50).div_euclid(100))
    }
}

/// Round half away from zero on the absolute value (half-up for positives).
fn round_half_up(value: f64) -> i64 {
    // Nudge by a tiny epsilon so 0.125 * 100 = 12.4999999 still rounds up.
    let nudged = value.abs() + 1e-9;
    let rounded = (nudged + 0.5).floor() as i64;
    if value < 0.0 {
        -rounded
    } else {
        rounded
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
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_dollars())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let dollars = f64::deserialize(deserializer)?;
        if !dollars.is_finite() {
            return Err(serde::de::Error::custom("amount must be a finite number"));
        }
        Ok(Money::from_dollars(dollars))
    }
}
