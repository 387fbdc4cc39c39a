use crate::domain::ledger::{BalanceChange, LedgerAccount};
use crate::domain::money::{Amount, Balance};
use crate::domain::party::Address;
use crate::domain::ports::{
    LedgerStore, PreferenceStore, StatusMirror, TransactionStore, ValueTransfer,
};
use crate::domain::transaction::{MirrorRecord, Transaction, TransactionId, TransactionStatus};
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for escrow transactions.
///
/// Uses `Arc<RwLock<BTreeMap<TransactionId, Transaction>>>` so ids iterate in
/// order. Ideal for testing or for replaying a script without persistence.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<BTreeMap<TransactionId, Transaction>>>,
}

impl InMemoryTransactionStore {
    /// Creates a new, empty in-memory transaction store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn store(&self, tx: Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        transactions.insert(tx.id, tx);
        Ok(())
    }

    async fn get(&self, tx_id: TransactionId) -> Result<Option<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(&tx_id).cloned())
    }

    async fn next_id(&self) -> Result<TransactionId> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .last_key_value()
            .map_or(0, |(id, _)| id + 1))
    }

    async fn get_all(&self) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.values().cloned().collect())
    }

    async fn remove(&self, tx_id: TransactionId) -> Result<()> {
        self.transactions.write().await.remove(&tx_id);
        Ok(())
    }
}

/// A thread-safe in-memory pull-payment ledger.
///
/// Credit and debit take the write lock for the whole read-modify-write.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    accounts: Arc<RwLock<HashMap<Address, LedgerAccount>>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get(&self, account: &Address) -> Result<LedgerAccount> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(account)
            .cloned()
            .unwrap_or_else(|| LedgerAccount::new(*account)))
    }

    async fn credit(&self, account: &Address, amount: Amount) -> Result<BalanceChange> {
        let mut accounts = self.accounts.write().await;
        let entry = accounts
            .entry(*account)
            .or_insert_with(|| LedgerAccount::new(*account));
        entry.credit(amount)
    }

    async fn debit(&self, account: &Address, amount: Amount) -> Result<BalanceChange> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(account) {
            Some(entry) => entry.debit(amount),
            None => Err(EscrowError::InsufficientBalance {
                requested: amount.value(),
                available: Balance::ZERO.value(),
            }),
        }
    }

    async fn get_all(&self) -> Result<Vec<LedgerAccount>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().cloned().collect())
    }
}

/// A thread-safe in-memory auto-withdraw registry.
#[derive(Default, Clone)]
pub struct InMemoryPreferenceStore {
    auto_withdraw: Arc<RwLock<HashMap<Address, bool>>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn auto_withdraw(&self, account: &Address) -> Result<bool> {
        let flags = self.auto_withdraw.read().await;
        Ok(flags.get(account).copied().unwrap_or(false))
    }

    async fn set_auto_withdraw(&self, account: &Address, enabled: bool) -> Result<()> {
        let mut flags = self.auto_withdraw.write().await;
        flags.insert(*account, enabled);
        Ok(())
    }
}

/// Stand-in for the outbound payment rail.
///
/// Records what each external wallet has received. Addresses marked with
/// [`InMemoryWallet::reject`] refuse direct transfers, like a contract account
/// without a payable fallback.
#[derive(Default, Clone)]
pub struct InMemoryWallet {
    received: Arc<RwLock<HashMap<Address, Balance>>>,
    rejecting: Arc<RwLock<HashSet<Address>>>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reject(&self, address: Address) {
        self.rejecting.write().await.insert(address);
    }

    pub async fn accept(&self, address: &Address) {
        self.rejecting.write().await.remove(address);
    }

    /// Total value delivered to `address` outside the engine.
    pub async fn received(&self, address: &Address) -> Balance {
        self.received
            .read()
            .await
            .get(address)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ValueTransfer for InMemoryWallet {
    async fn transfer(&self, recipient: &Address, amount: Amount) -> Result<()> {
        if self.rejecting.read().await.contains(recipient) {
            return Err(EscrowError::TransferFailed(format!(
                "{recipient} does not accept direct transfers"
            )));
        }
        let mut received = self.received.write().await;
        let total = received.entry(*recipient).or_default();
        *total = total
            .checked_add(amount)
            .map_err(|e| EscrowError::TransferFailed(e.to_string()))?;
        Ok(())
    }
}

/// In-memory copy of the storefront's transaction table.
#[derive(Default, Clone)]
pub struct InMemoryStatusMirror {
    records: Arc<RwLock<BTreeMap<TransactionId, MirrorRecord>>>,
}

impl InMemoryStatusMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, tx_id: TransactionId) -> Option<MirrorRecord> {
        self.records.read().await.get(&tx_id).cloned()
    }

    /// All mirrored rows, ordered by transaction id.
    pub async fn get_all(&self) -> Vec<MirrorRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl StatusMirror for InMemoryStatusMirror {
    async fn record_transaction(&self, record: MirrorRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.transaction_id, record);
        Ok(())
    }

    async fn update_status(&self, tx_id: TransactionId, status: TransactionStatus) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&tx_id).ok_or(EscrowError::NotFound(tx_id))?;
        record.status = status;
        Ok(())
    }
}
