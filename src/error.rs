use crate::domain::party::{Address, Role};
use crate::domain::transaction::{Operation, TransactionId, TransactionStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EscrowError>;

#[derive(Error, Debug)]
pub enum EscrowError {
    #[error("Transaction {0} not found")]
    NotFound(TransactionId),
    #[error("Caller {caller} is not the {role} of this transaction")]
    Unauthorized { role: Role, caller: Address },
    #[error("Cannot {operation} a transaction that is {actual} (expected {expected})")]
    InvalidState {
        operation: Operation,
        expected: TransactionStatus,
        actual: TransactionStatus,
    },
    #[error("Insufficient amount: required {required}, provided {provided}")]
    InsufficientFunds { required: Decimal, provided: Decimal },
    #[error("Wait period not passed: claimable at {ready_at}, now {now}")]
    WindowNotElapsed {
        ready_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("Wait period has passed: dispute window closed at {closed_at}, now {now}")]
    WindowElapsed {
        closed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
    #[error("Transfer failed: {0}")]
    TransferFailed(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse classification of an [`EscrowError`].
///
/// Everything except `Infrastructure` is a protocol-level rejection: the engine
/// refused the call before mutating any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    InvalidState,
    InsufficientFunds,
    WindowNotElapsed,
    WindowElapsed,
    InsufficientBalance,
    Validation,
    Transfer,
    Infrastructure,
}

impl EscrowError {
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into().into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::WindowNotElapsed { .. } => ErrorKind::WindowNotElapsed,
            Self::WindowElapsed { .. } => ErrorKind::WindowElapsed,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::ValidationError(_) | Self::Overflow(_) => ErrorKind::Validation,
            Self::TransferFailed(_) => ErrorKind::Transfer,
            _ => ErrorKind::Infrastructure,
        }
    }

    /// Whether the engine rejected the call on protocol grounds.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Transfer | ErrorKind::Infrastructure
        )
    }

    /// Stable condition code for a rejection, as surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Transaction404",
            Self::Unauthorized { role, .. } => match role {
                Role::Buyer => "NotBuyer",
                Role::Seller => "NotSeller",
            },
            Self::InvalidState {
                operation, actual, ..
            } => match (operation, actual) {
                (Operation::Deliver, _) => "TransactionNotPending",
                (Operation::Confirm, TransactionStatus::Pending) => "TransactionPending",
                (Operation::Confirm, TransactionStatus::Confirmed) => {
                    "TransactionAlreadyConfirmed"
                }
                (Operation::Confirm, _) => "TransactionNotDelivered",
                (Operation::Claim, TransactionStatus::Delivered) => "TransactionDelivered",
                (Operation::Claim | Operation::Dispute, _) => "TransactionNotConfirmed",
                (Operation::ResolveDispute, _) => "TransactionNotDisputed",
            },
            Self::InsufficientFunds { .. } => "InsufficientAmount",
            Self::WindowNotElapsed { .. } => "WaitPeriodNotPassed",
            Self::WindowElapsed { .. } => "WaitPeriodHasPassed",
            Self::InsufficientBalance { .. } => "InsufficientBalance",
            Self::ValidationError(_) => "InvalidArgument",
            Self::Overflow(_) => "Overflow",
            Self::TransferFailed(_) => "TransferFailed",
            _ => "InternalError",
        }
    }
}
