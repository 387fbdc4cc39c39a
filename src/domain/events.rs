use super::money::{Amount, Balance};
use super::party::Address;
use super::transaction::{Transaction, TransactionId};
use rust_decimal::Decimal;
use serde::Serialize;

/// Domain events produced by a successful engine call, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum EscrowEvent {
    NewTransaction {
        transaction_id: TransactionId,
        buyer: Address,
        seller: Address,
        amount: Amount,
    },
    SurplusRefund {
        buyer: Address,
        paid: Decimal,
        price: Amount,
        surplus: Amount,
    },
    Delivered {
        buyer: Address,
        seller: Address,
        amount: Amount,
        transaction_id: TransactionId,
    },
    TransactionConfirmed {
        buyer: Address,
        seller: Address,
        amount: Amount,
        transaction_id: TransactionId,
    },
    SellerClaimed {
        buyer: Address,
        seller: Address,
        transaction_id: TransactionId,
    },
    BuyerDisputed {
        buyer: Address,
        seller: Address,
        transaction_id: TransactionId,
    },
    /// The seller acknowledged the returned goods; the dispute is resolved.
    SellerConfirmed {
        buyer: Address,
        seller: Address,
        transaction_id: TransactionId,
    },
    PayoutSent {
        recipient: Address,
        amount: Amount,
    },
    BalanceUpdated {
        account: Address,
        previous: Balance,
        current: Balance,
    },
    WithdrawalSuccessful {
        account: Address,
        amount: Amount,
        new_balance: Balance,
    },
    AutoWithdrawSet {
        account: Address,
        enabled: bool,
    },
}

impl EscrowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewTransaction { .. } => "NewTransaction",
            Self::SurplusRefund { .. } => "SurplusRefund",
            Self::Delivered { .. } => "Delivered",
            Self::TransactionConfirmed { .. } => "TransactionConfirmed",
            Self::SellerClaimed { .. } => "SellerClaimed",
            Self::BuyerDisputed { .. } => "BuyerDisputed",
            Self::SellerConfirmed { .. } => "SellerConfirmed",
            Self::PayoutSent { .. } => "PayoutSent",
            Self::BalanceUpdated { .. } => "BalanceUpdated",
            Self::WithdrawalSuccessful { .. } => "WithdrawalSuccessful",
            Self::AutoWithdrawSet { .. } => "AutoWithdrawSet",
        }
    }
}

/// Result of a committed engine call: the affected transaction, if any, and
/// the events it produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Receipt {
    pub transaction: Option<Transaction>,
    pub events: Vec<EscrowEvent>,
}

impl Receipt {
    pub fn find(&self, name: &str) -> Option<&EscrowEvent> {
        self.events.iter().find(|event| event.name() == name)
    }
}
