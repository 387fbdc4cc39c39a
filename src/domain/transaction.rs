use super::events::EscrowEvent;
use super::money::Amount;
use super::party::{Address, Role};
use crate::error::{EscrowError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub type TransactionId = u64;

/// Lifecycle status of an escrow transaction.
///
/// The numeric codes are a wire contract shared with the status mirror and
/// the storefront; do not reorder.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TransactionStatus {
    Pending,
    Delivered,
    Confirmed,
    Disputed,
    Cancelled,
    Finalized,
}

impl TransactionStatus {
    pub const fn code(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Delivered => 1,
            Self::Confirmed => 2,
            Self::Disputed => 3,
            Self::Cancelled => 4,
            Self::Finalized => 5,
        }
    }

    /// `Cancelled` and `Finalized` admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Finalized)
    }
}

impl TryFrom<u8> for TransactionStatus {
    type Error = EscrowError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Delivered),
            2 => Ok(Self::Confirmed),
            3 => Ok(Self::Disputed),
            4 => Ok(Self::Cancelled),
            5 => Ok(Self::Finalized),
            other => Err(EscrowError::ValidationError(format!(
                "unknown transaction status code {other}"
            ))),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Delivered => "Delivered",
            Self::Confirmed => "Confirmed",
            Self::Disputed => "Disputed",
            Self::Cancelled => "Cancelled",
            Self::Finalized => "Finalized",
        };
        f.write_str(name)
    }
}

impl Serialize for TransactionStatus {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for TransactionStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = u8::deserialize(deserializer)?;
        Self::try_from(code).map_err(serde::de::Error::custom)
    }
}

/// The five status transitions a party can request on an open transaction.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operation {
    Deliver,
    Confirm,
    Claim,
    Dispute,
    ResolveDispute,
}

impl Operation {
    pub fn required_role(self) -> Role {
        match self {
            Self::Deliver | Self::Claim | Self::ResolveDispute => Role::Seller,
            Self::Confirm | Self::Dispute => Role::Buyer,
        }
    }

    /// The only status this operation may be applied from.
    pub fn source(self) -> TransactionStatus {
        match self {
            Self::Deliver => TransactionStatus::Pending,
            Self::Confirm => TransactionStatus::Delivered,
            Self::Claim | Self::Dispute => TransactionStatus::Confirmed,
            Self::ResolveDispute => TransactionStatus::Disputed,
        }
    }

    pub fn target(self) -> TransactionStatus {
        match self {
            Self::Deliver => TransactionStatus::Delivered,
            Self::Confirm => TransactionStatus::Confirmed,
            Self::Claim => TransactionStatus::Finalized,
            Self::Dispute => TransactionStatus::Disputed,
            Self::ResolveDispute => TransactionStatus::Cancelled,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deliver => "deliver",
            Self::Confirm => "confirm",
            Self::Claim => "claim",
            Self::Dispute => "dispute",
            Self::ResolveDispute => "resolve",
        };
        f.write_str(name)
    }
}

/// An escrowed purchase between a buyer and a seller.
///
/// Records are never deleted; a transaction in a terminal status is the
/// permanent audit record of where its funds went.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub buyer: Address,
    pub seller: Address,
    pub amount: Amount,
    pub status: TransactionStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn open(
        id: TransactionId,
        buyer: Address,
        seller: Address,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            buyer,
            seller,
            amount,
            status: TransactionStatus::Pending,
            confirmed_at: None,
            created_at: now,
        }
    }

    pub fn party(&self, role: Role) -> Address {
        match role {
            Role::Buyer => self.buyer,
            Role::Seller => self.seller,
        }
    }

    /// The instant the dispute window closes and the claim window opens.
    pub fn window_boundary(&self, window: TimeDelta) -> Result<DateTime<Utc>> {
        let confirmed_at = self.confirmed_at.ok_or_else(|| {
            EscrowError::internal(format!("transaction {} has no confirmation time", self.id))
        })?;
        confirmed_at.checked_add_signed(window).ok_or_else(|| {
            EscrowError::internal(format!("dispute window overflows for transaction {}", self.id))
        })
    }

    /// Validates `operation` for `caller` at `now` without mutating anything.
    ///
    /// Checks run in a fixed order: caller role, then status, then the time
    /// window, so the reported error is deterministic.
    pub fn check(
        &self,
        operation: Operation,
        caller: &Address,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> Result<()> {
        let role = operation.required_role();
        if self.party(role) != *caller {
            return Err(EscrowError::Unauthorized {
                role,
                caller: *caller,
            });
        }

        if self.status != operation.source() {
            return Err(EscrowError::InvalidState {
                operation,
                expected: operation.source(),
                actual: self.status,
            });
        }

        match operation {
            Operation::Claim => {
                let ready_at = self.window_boundary(window)?;
                if now < ready_at {
                    return Err(EscrowError::WindowNotElapsed { ready_at, now });
                }
            }
            Operation::Dispute => {
                let closed_at = self.window_boundary(window)?;
                if now >= closed_at {
                    return Err(EscrowError::WindowElapsed { closed_at, now });
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Moves the transaction to `operation`'s target status.
    ///
    /// Callers must have run [`Transaction::check`] first.
    pub fn apply(&mut self, operation: Operation, now: DateTime<Utc>) -> EscrowEvent {
        self.status = operation.target();
        if operation == Operation::Confirm {
            self.confirmed_at = Some(now);
        }

        let (buyer, seller, transaction_id) = (self.buyer, self.seller, self.id);
        match operation {
            Operation::Deliver => EscrowEvent::Delivered {
                buyer,
                seller,
                amount: self.amount,
                transaction_id,
            },
            Operation::Confirm => EscrowEvent::TransactionConfirmed {
                buyer,
                seller,
                amount: self.amount,
                transaction_id,
            },
            Operation::Claim => EscrowEvent::SellerClaimed {
                buyer,
                seller,
                transaction_id,
            },
            Operation::Dispute => EscrowEvent::BuyerDisputed {
                buyer,
                seller,
                transaction_id,
            },
            Operation::ResolveDispute => EscrowEvent::SellerConfirmed {
                buyer,
                seller,
                transaction_id,
            },
        }
    }
}

/// Denormalized row kept by the external status mirror.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct MirrorRecord {
    pub transaction_id: TransactionId,
    pub buyer: Address,
    pub seller: Address,
    pub amount: Amount,
    pub status: TransactionStatus,
}

impl From<&Transaction> for MirrorRecord {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            buyer: tx.buyer,
            seller: tx.seller,
            amount: tx.amount,
            status: tx.status,
        }
    }
}
