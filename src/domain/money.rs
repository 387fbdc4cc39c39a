use crate::error::EscrowError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An accumulated ledger balance.
///
/// Wraps `rust_decimal::Decimal`. Ledger arithmetic never lets it drop below
/// zero; see [`crate::domain::ledger::LedgerAccount::debit`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A strictly positive amount of value: a price, a payout or a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, EscrowError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EscrowError::ValidationError(format!(
                "Amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EscrowError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// `self + amount`, or `Overflow` when the sum leaves the `Decimal` range.
    pub fn checked_add(self, amount: Amount) -> Result<Self, EscrowError> {
        self.0
            .checked_add(amount.0)
            .map(Self)
            .ok_or_else(|| EscrowError::Overflow(format!("{self} + {amount}")))
    }

    /// `self - amount`, or `InsufficientBalance` when it would go negative.
    pub fn checked_sub(self, amount: Amount) -> Result<Self, EscrowError> {
        if self.0 < amount.0 {
            return Err(EscrowError::InsufficientBalance {
                requested: amount.0,
                available: self.0,
            });
        }
        Ok(Self(self.0 - amount.0))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
