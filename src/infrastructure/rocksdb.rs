use crate::domain::ledger::{BalanceChange, LedgerAccount};
use crate::domain::money::Amount;
use crate::domain::party::Address;
use crate::domain::ports::{LedgerStore, PreferenceStore, TransactionStore};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Column Family for escrow transactions, keyed by big-endian id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for ledger balances, keyed by address bytes.
pub const CF_LEDGER: &str = "ledger";
/// Column Family for auto-withdraw flags, keyed by address bytes.
pub const CF_PREFERENCES: &str = "preferences";

/// A persistent store implementation using RocksDB.
///
/// Serves transactions, the ledger and the preference registry from separate
/// Column Families of one database. Ledger credits and debits are serialized
/// through `ledger_lock` so each read-modify-write is atomic.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    ledger_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_TRANSACTIONS, CF_LEDGER, CF_PREFERENCES]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            ledger_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| EscrowError::internal(format!("{name} column family not found")))
    }

    fn read<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf: &'static str, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, key, bytes)?;
        Ok(())
    }

    fn read_all<T: DeserializeOwned>(&self, cf: &'static str) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn ledger_account(&self, account: &Address) -> Result<LedgerAccount> {
        Ok(self
            .read(CF_LEDGER, account.as_bytes())?
            .unwrap_or_else(|| LedgerAccount::new(*account)))
    }

    fn update_ledger<F>(&self, account: &Address, mutate: F) -> Result<BalanceChange>
    where
        F: FnOnce(&mut LedgerAccount) -> Result<BalanceChange>,
    {
        let _guard = self.ledger_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entry = self.ledger_account(account)?;
        let change = mutate(&mut entry)?;
        self.write(CF_LEDGER, account.as_bytes(), &entry)?;
        Ok(change)
    }
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn store(&self, tx: Transaction) -> Result<()> {
        self.write(CF_TRANSACTIONS, &tx.id.to_be_bytes(), &tx)
    }

    async fn get(&self, tx_id: TransactionId) -> Result<Option<Transaction>> {
        self.read(CF_TRANSACTIONS, &tx_id.to_be_bytes())
    }

    async fn next_id(&self) -> Result<TransactionId> {
        // Big-endian keys sort numerically, so the last key is the highest id.
        let mut iter = self
            .db
            .iterator_cf(self.cf(CF_TRANSACTIONS)?, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _value) = item?;
                let bytes: [u8; 8] = key.as_ref().try_into().map_err(|_| {
                    EscrowError::internal("transaction key is not 8 bytes long")
                })?;
                Ok(TransactionId::from_be_bytes(bytes) + 1)
            }
            None => Ok(0),
        }
    }

    async fn get_all(&self) -> Result<Vec<Transaction>> {
        self.read_all(CF_TRANSACTIONS)
    }

    async fn remove(&self, tx_id: TransactionId) -> Result<()> {
        self.db
            .delete_cf(self.cf(CF_TRANSACTIONS)?, tx_id.to_be_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn get(&self, account: &Address) -> Result<LedgerAccount> {
        self.ledger_account(account)
    }

    async fn credit(&self, account: &Address, amount: Amount) -> Result<BalanceChange> {
        self.update_ledger(account, |entry| entry.credit(amount))
    }

    async fn debit(&self, account: &Address, amount: Amount) -> Result<BalanceChange> {
        self.update_ledger(account, |entry| entry.debit(amount))
    }

    async fn get_all(&self) -> Result<Vec<LedgerAccount>> {
        self.read_all(CF_LEDGER)
    }
}

#[async_trait]
impl PreferenceStore for RocksDBStore {
    async fn auto_withdraw(&self, account: &Address) -> Result<bool> {
        Ok(self
            .read(CF_PREFERENCES, account.as_bytes())?
            .unwrap_or(false))
    }

    async fn set_auto_withdraw(&self, account: &Address, enabled: bool) -> Result<()> {
        self.write(CF_PREFERENCES, account.as_bytes(), &enabled)
    }
}
