//! Money value object (integer minor units).

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// An amount of money in the smallest currency unit (e.g. cents).
///
/// Amounts are signed: totals computed by the cart arithmetic can be negative
/// when a discount exceeds the subtotal, and that has to be representable so
/// callers can reject it explicitly. All arithmetic that can overflow goes
/// through the `checked_*` helpers.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn new(minor_units: i64) -> Self {
        Self(minor_units)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Multiply a unit amount by a quantity.
    pub fn checked_mul(self, quantity: i64) -> DomainResult<Money> {
        self.0
            .checked_mul(quantity)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Sum an iterator of amounts, failing on overflow.
    pub fn checked_sum<I>(amounts: I) -> DomainResult<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Money(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(Money::new(7000).to_string(), "70.00");
        assert_eq!(Money::new(-305).to_string(), "-3.05");
        assert_eq!(Money::new(9).to_string(), "0.09");
    }

    #[test]
    fn checked_mul_reports_overflow() {
        let err = Money::new(i64::MAX).checked_mul(2).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        #[test]
        fn checked_sum_matches_integer_sum(values in proptest::collection::vec(-1_000_000i64..1_000_000, 0..50)) {
            let expected: i64 = values.iter().sum();
            let sum = Money::checked_sum(values.iter().copied().map(Money::new)).unwrap();
            prop_assert_eq!(sum.minor_units(), expected);
        }
    }
}
