//! Fixed-point monetary amounts.
//!
//! Amounts are held in the smallest currency unit (e.g. cents) so that sums and
//! products never drift the way binary floating point does.

use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// Number of fractional digits carried by [`Money`].
pub const MINOR_DIGITS: u32 = 2;

const MINOR_PER_MAJOR: u64 = 10u64.pow(MINOR_DIGITS);

/// Non-negative amount in minor units (two decimal places).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    pub fn minor(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiply by a positive quantity (line amount = quantity × unit price).
    pub fn checked_mul_qty(self, quantity: i64) -> Option<Money> {
        let qty = u64::try_from(quantity).ok()?;
        self.0.checked_mul(qty).map(Money)
    }

    /// Sum a sequence of amounts, failing on overflow.
    pub fn checked_sum<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

impl Money {
    fn as_decimal(self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.0), MINOR_DIGITS)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.as_decimal(), f)
    }
}

/// Parses decimal strings such as `"25"`, `"25.5"`, `"25.00"` or `"10.000"`.
///
/// Negative amounts and amounts finer than a minor unit are rejected.
impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::invalid_argument(format!("invalid amount: {s:?}"));

        let amount = Decimal::from_str(s.trim()).map_err(|_| invalid())?.normalize();
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(invalid());
        }
        if amount.scale() > MINOR_DIGITS {
            return Err(invalid());
        }

        amount
            .checked_mul(Decimal::from(MINOR_PER_MAJOR))
            .and_then(|minor| minor.to_u64())
            .map(Money)
            .ok_or_else(invalid)
    }
}
