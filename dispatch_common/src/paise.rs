use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "INR";

//--------------------------------------        Paise          ---------------------------------------------------------
/// An amount of money in paise (1/100 of a rupee). Serialises as a plain integer.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Paise(i64);

op!(binary Paise, Add, add);
op!(binary Paise, Sub, sub);
op!(inplace Paise, AddAssign, add_assign);
op!(inplace Paise, SubAssign, sub_assign);
op!(unary Paise, Neg, neg);

impl Mul<i64> for Paise {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Paise {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in paise: {0}")]
pub struct PaiseConversionError(String);

impl From<i64> for Paise {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Paise {
    type Error = PaiseConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(PaiseConversionError(format!("Value {value} is too large to convert to Paise")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Paise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}₹{}.{:02}", abs / 100, abs % 100)
    }
}

impl Paise {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `None` if the sum overflows.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// `None` if the product overflows.
    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    /// Totals the amounts, or `None` if the total overflows.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts.into_iter().try_fold(Self::default(), Self::checked_add)
    }
}
