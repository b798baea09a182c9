//! Exact decimal money type.
//!
//! Order totals and item prices are compared with exact equality, so they are
//! held as `rust_decimal` values rather than binary floats. Values keep the
//! precision they were parsed with; 4 decimal places is only the output format.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

/// A monetary amount with exact decimal arithmetic.
///
/// Parsing accepts either `.` or `,` as the decimal separator, since the
/// order exports use decimal commas. Arithmetic is checked: quantity
/// outliers can push a product or sum past the decimal range, and the
/// caller decides what an overflowed value means.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use order_recon::Amount;
///
/// let paid = Amount::from_str("1137,99").unwrap();
/// assert_eq!(paid.to_string(), "1137.9900");
/// assert_ne!(Amount::from_str("100,00004").unwrap(), Amount::from_str("100").unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// Decimal places used when formatting.
    pub const SCALE: u32 = 4;

    /// Zero value.
    pub const ZERO: Self = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Amount(value)
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` if this value is strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Amount(self.0.abs())
    }

    /// `self + rhs`, or `None` on overflow.
    pub fn checked_add(self, rhs: Amount) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// `self - rhs`, or `None` on overflow.
    pub fn checked_sub(self, rhs: Amount) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Unit price times quantity, or `None` on overflow.
    pub fn checked_mul(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Amount)
    }

    /// Divides by a row count. Returns `None` for a zero count.
    pub fn div_count(&self, count: usize) -> Option<Self> {
        if count == 0 {
            return None;
        }
        self.0.checked_div(Decimal::from(count as u64)).map(Amount)
    }

    /// Ratio `self / whole` as a percentage, or `None` if `whole` is zero.
    pub fn percent_of(&self, whole: Amount) -> Option<f64> {
        if whole.is_zero() {
            return None;
        }
        let ratio = self.0.checked_div(whole.0)?;
        ratio.checked_mul(Decimal::ONE_HUNDRED)?.to_f64()
    }

    /// The underlying decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

/// Sums amounts, returning `None` if the running total overflows.
pub fn checked_sum<I: IntoIterator<Item = Amount>>(values: I) -> Option<Amount> {
    values
        .into_iter()
        .try_fold(Amount::ZERO, |acc, value| acc.checked_add(value))
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = if trimmed.contains(',') && !trimmed.contains('.') {
            Decimal::from_str(&trimmed.replace(',', "."))?
        } else {
            Decimal::from_str(trimmed)?
        };
        Ok(Amount(decimal))
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount(Decimal::from(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0.round_dp(Self::SCALE))
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Amount(-self.0)
    }
}

/// Median of a set of amounts, averaging the two middle values for even counts.
pub fn median(values: &[Amount]) -> Option<Amount> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        sorted[mid - 1].checked_add(sorted[mid])?.div_count(2)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}
