use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// The number of minor units in one whole currency unit. Amounts carry three decimal places.
pub const MONEY_SCALE: i64 = 1_000;

//--------------------------------------        Money        ---------------------------------------------------------
/// A fixed-point monetary amount, counted in thousandths of the store currency.
///
/// `Money::from(10_000)` is `10.000`. Amounts are never represented as floating point values in the pipeline.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = MONEY_SCALE.unsigned_abs();
        write!(f, "{sign}{}.{:03}", abs / scale, abs % scale)
    }
}

/// Parses decimal strings such as `"7.5"`, `"10.000"` or `"12"`. At most three decimal places are accepted.
impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() || frac.len() > 3 || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(MoneyConversionError(s.to_string()));
        }
        let whole = whole.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
        let frac = format!("{frac:0<3}").parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
        let value = whole
            .checked_mul(MONEY_SCALE)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(|| MoneyConversionError(format!("{s} overflows")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_units(units: i64) -> Self {
        Self(units * MONEY_SCALE)
    }

    /// The whole-unit part of the amount, rounded toward zero.
    pub fn whole_units(&self) -> i64 {
        self.0 / MONEY_SCALE
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `self * rhs`, or `None` on overflow.
    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    /// `self + rhs`, or `None` on overflow.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// `self - rhs`, or zero if that would be negative.
    pub fn saturating_sub_to_zero(self, rhs: Self) -> Self {
        Self((self.0 - rhs.0).max(0))
    }
}
