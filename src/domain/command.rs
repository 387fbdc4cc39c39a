use super::money::Amount;
use super::party::Address;
use super::transaction::{Operation, TransactionId};
use rust_decimal::Decimal;

/// A request a party submits to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open a transaction with `seller` at `price`, attaching `paid`.
    Open {
        seller: Address,
        price: Amount,
        paid: Decimal,
    },
    Transition {
        operation: Operation,
        transaction_id: TransactionId,
    },
    SetAutoWithdraw(bool),
    Withdraw(Amount),
}

impl Command {
    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            Self::Transition { transaction_id, .. } => Some(*transaction_id),
            _ => None,
        }
    }
}
