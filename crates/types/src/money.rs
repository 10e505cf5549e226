//! Fixed-point money type for the cash-flow simulation.
//!
//! All balances use fixed-point arithmetic with 4 decimal places to avoid
//! floating-point drift across long horizons. Arithmetic is checked: callers
//! receive `None` on overflow and decide how to surface it.

use crate::ids::MONEY_SCALE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point cash amount with 4 decimal places.
///
/// # Examples
/// - `Cash(10000)` = 1.00
/// - `Cash(15000)` = 1.50
/// - `Cash(1)` = 0.0001
///
/// Serializes as a floating-point number so configuration files and JSON
/// output read naturally.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct Cash(pub i64);

impl Cash {
    pub const ZERO: Cash = Cash(0);
    pub const MAX: Cash = Cash(i64::MAX);
    pub const MIN: Cash = Cash(i64::MIN);

    /// Create Cash from a floating-point value, rounding to the nearest unit.
    ///
    /// Non-finite or out-of-range inputs saturate; use [`Cash::try_from_float`]
    /// where that must be detected.
    #[inline]
    pub fn from_float(v: f64) -> Self {
        Self((v * MONEY_SCALE as f64).round() as i64)
    }

    /// Create Cash from a floating-point value, rejecting NaN, infinities and
    /// values outside the representable range.
    pub fn try_from_float(v: f64) -> Option<Self> {
        if !v.is_finite() {
            return None;
        }
        let scaled = (v * MONEY_SCALE as f64).round();
        // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
        if scaled >= i64::MAX as f64 || scaled < i64::MIN as f64 {
            return None;
        }
        Some(Self(scaled as i64))
    }

    /// Convert to floating-point for display/calculations.
    #[inline]
    pub fn to_float(self) -> f64 {
        self.0 as f64 / MONEY_SCALE as f64
    }

    /// Raw internal value.
    #[inline]
    pub fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    #[inline]
    pub fn checked_neg(self) -> Option<Self> {
        self.0.checked_neg().map(Self)
    }

    /// Multiply by a floating-point rate (e.g. an interest rate), rounding
    /// to the nearest unit. `None` when the product is not representable.
    pub fn checked_scale(self, rate: f64) -> Option<Self> {
        if !rate.is_finite() {
            return None;
        }
        let product = (self.0 as f64 * rate).round();
        if product >= i64::MAX as f64 || product < i64::MIN as f64 {
            return None;
        }
        Some(Self(product as i64))
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    #[inline]
    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }
}

impl From<Cash> for f64 {
    fn from(cash: Cash) -> f64 {
        cash.to_float()
    }
}

impl TryFrom<f64> for Cash {
    type Error = String;

    fn try_from(v: f64) -> Result<Self, Self::Error> {
        Cash::try_from_float(v).ok_or_else(|| format!("{v} is not a representable cash amount"))
    }
}

impl fmt::Debug for Cash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cash({:.4})", self.to_float())
    }
}

impl fmt::Display for Cash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.to_float())
    }
}

// Allow `cash == 100.0` comparisons in tests and assertions.
impl PartialEq<f64> for Cash {
    fn eq(&self, other: &f64) -> bool {
        Cash::try_from_float(*other) == Some(*self)
    }
}
