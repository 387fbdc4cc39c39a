use super::ledger::{BalanceChange, LedgerAccount};
use super::money::Amount;
use super::party::Address;
use super::transaction::{MirrorRecord, Transaction, TransactionId, TransactionStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn store(&self, tx: Transaction) -> Result<()>;
    async fn get(&self, tx_id: TransactionId) -> Result<Option<Transaction>>;
    /// The id the next opened transaction will receive.
    async fn next_id(&self) -> Result<TransactionId>;
    async fn get_all(&self) -> Result<Vec<Transaction>>;
    /// Drops a transaction whose opening was rolled back. Unknown ids are a no-op.
    async fn remove(&self, tx_id: TransactionId) -> Result<()>;
}

/// Pull-payment balances.
///
/// `credit` and `debit` are atomic read-modify-write operations: two
/// concurrent debits can never both spend the same balance.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get(&self, account: &Address) -> Result<LedgerAccount>;
    async fn credit(&self, account: &Address, amount: Amount) -> Result<BalanceChange>;
    async fn debit(&self, account: &Address, amount: Amount) -> Result<BalanceChange>;
    async fn get_all(&self) -> Result<Vec<LedgerAccount>>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Unset parties have auto-withdraw off.
    async fn auto_withdraw(&self, account: &Address) -> Result<bool>;
    async fn set_auto_withdraw(&self, account: &Address, enabled: bool) -> Result<()>;
}

/// Outbound value rail used to push funds to a party directly.
#[async_trait]
pub trait ValueTransfer: Send + Sync {
    async fn transfer(&self, recipient: &Address, amount: Amount) -> Result<()>;
}

/// External, read-optimized copy of transaction statuses.
#[async_trait]
pub trait StatusMirror: Send + Sync {
    async fn record_transaction(&self, record: MirrorRecord) -> Result<()>;
    async fn update_status(&self, tx_id: TransactionId, status: TransactionStatus) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type TransactionStoreBox = Box<dyn TransactionStore>;
pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type PreferenceStoreBox = Box<dyn PreferenceStore>;
pub type ValueTransferBox = Box<dyn ValueTransfer>;
pub type StatusMirrorBox = Box<dyn StatusMirror>;
pub type ClockBox = Box<dyn Clock>;
