use super::money::{Amount, Balance};
use super::party::Address;
use crate::error::EscrowError;
use serde::{Deserialize, Serialize};

/// A party's withdrawable pull-payment balance.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerAccount {
    pub account: Address,
    pub balance: Balance,
}

/// Before/after view of a single ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceChange {
    pub account: Address,
    pub previous: Balance,
    pub current: Balance,
}

impl LedgerAccount {
    pub fn new(account: Address) -> Self {
        Self {
            account,
            balance: Balance::ZERO,
        }
    }

    /// Credits the balance; leaves it untouched if the sum would overflow.
    pub fn credit(&mut self, amount: Amount) -> Result<BalanceChange, EscrowError> {
        let previous = self.balance;
        self.balance = previous.checked_add(amount)?;
        Ok(BalanceChange {
            account: self.account,
            previous,
            current: self.balance,
        })
    }

    /// Debits the balance if it covers `amount`; leaves it untouched otherwise.
    pub fn debit(&mut self, amount: Amount) -> Result<BalanceChange, EscrowError> {
        let previous = self.balance;
        self.balance = previous.checked_sub(amount)?;
        Ok(BalanceChange {
            account: self.account,
            previous,
            current: self.balance,
        })
    }
}
