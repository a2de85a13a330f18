//! Fixed-precision monetary values.
//!
//! Amounts are held as a signed count of minor units (cents) so that folding
//! many expenses never drifts. Conversion from and to decimal numbers happens
//! only at the serialization boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use thiserror::Error;

const MINOR_UNITS: i64 = 100;

/// Largest magnitude accepted from decimal input: one billion major units.
/// Sums of tens of millions of such amounts still fit in an `i64`, and every
/// value stays exactly representable as an `f64` on the way out.
pub const MAX_CENTS: i64 = 1_000_000_000 * MINOR_UNITS;

/// The smallest monetary difference treated as zero (one cent).
pub const EPSILON: Money = Money(1);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MoneyError {
    #[error("amount is not a finite number: {0}")]
    NotFinite(f64),
    #[error("amount is out of range: {0}")]
    OutOfRange(f64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Converts a decimal amount (e.g. `10.006`) to cents, rounding half away
    /// from zero. Magnitudes above [`MAX_CENTS`] are rejected.
    pub fn from_major(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NotFinite(value));
        }
        let scaled = (value * MINOR_UNITS as f64).round();
        if scaled.abs() > MAX_CENTS as f64 {
            return Err(MoneyError::OutOfRange(value));
        }
        Ok(Self(scaled as i64))
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / MINOR_UNITS as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// `|self - other| <= EPSILON`
    pub fn approx_eq(self, other: Self) -> bool {
        (self - other).abs() <= EPSILON
    }

    /// Splits the amount into `parts` shares that sum to exactly `self`.
    ///
    /// Every share is the amount divided by `parts`, truncated to the cent;
    /// the undistributed remainder goes to the last share. Returns an empty
    /// vector when `parts` is zero.
    pub fn split_evenly(self, parts: usize) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }
        let count = parts as i64;
        let base = self.0 / count;
        let remainder = self.0 - base * count;

        let mut shares = vec![Money(base); parts];
        if let Some(last) = shares.last_mut() {
            last.0 += remainder;
        }
        shares
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{}{}.{:02}",
            sign,
            abs / MINOR_UNITS as u64,
            abs % MINOR_UNITS as u64
        )
    }
}

impl TryFrom<f64> for Money {
    type Error = MoneyError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_major(value)
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> Self {
        money.as_f64()
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

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}
