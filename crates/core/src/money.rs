use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

use super::transaction::LedgerError;

/// A currency value held exactly to the cent.
///
/// Every constructor rounds to two decimal places (half away from zero), so a
/// sum of `Money` values is exact and independent of summation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money::from_decimal(Decimal::new(cents, 2))
    }

    /// Saturates at the `i64` bounds.
    pub fn to_cents(self) -> i64 {
        let cents = self.0 * Decimal::ONE_HUNDRED;
        cents.to_i64().unwrap_or(if cents.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        })
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        let mut rounded = decimal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        Money(rounded)
    }

    pub fn zero() -> Self {
        Money::from_cents(0)
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    /// `self` as a percentage of `base`, to four decimal places. Zero when `base` is zero.
    pub fn percent_of(self, base: Money) -> Decimal {
        self.exact_percent_of(base)
            .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Unrounded form of [`Money::percent_of`], for threshold comparisons.
    pub fn exact_percent_of(self, base: Money) -> Decimal {
        if base.is_zero() {
            return Decimal::ZERO;
        }
        self.0 / base.0 * Decimal::ONE_HUNDRED
    }

    /// Rounds each amount to the cent before adding it.
    pub fn round_and_sum<I>(amounts: I) -> Money
    where
        I: IntoIterator<Item = Decimal>,
    {
        amounts.into_iter().map(Money::from_decimal).sum()
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-${:.2}", self.0.abs())
        } else {
            write!(f, "${:.2}", self.0)
        }
    }
}

/// Accepts statement notation: `1,234.56`, `$99.99`, `-50.00`, `(75.25)`.
impl FromStr for Money {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, body) = match trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
        {
            Some(inner) => (true, inner),
            None => (false, trimmed),
        };
        let cleaned = body.replace(['$', ',', ' '], "");
        if cleaned.is_empty() {
            return Err(LedgerError::InvalidMoney(s.to_string()));
        }
        let decimal =
            Decimal::from_str(&cleaned).map_err(|_| LedgerError::InvalidMoney(s.to_string()))?;
        let money = Money::from_decimal(decimal);
        Ok(if negative { -money.abs() } else { money })
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        <Decimal as Deserialize>::deserialize(deserializer).map(Money::from_decimal)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
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
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
