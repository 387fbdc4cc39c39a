use super::payout::PayoutDispatcher;
use crate::config::EscrowConfig;
use crate::domain::command::Command;
use crate::domain::events::{EscrowEvent, Receipt};
use crate::domain::ledger::LedgerAccount;
use crate::domain::money::{Amount, Balance};
use crate::domain::party::Address;
use crate::domain::ports::{ClockBox, TransactionStoreBox};
use crate::domain::transaction::{Operation, Transaction, TransactionId};
use crate::error::{EscrowError, Result};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// The escrow transaction engine.
///
/// `EscrowEngine` owns the transaction store, the payout dispatcher and the
/// clock. Every transition is validated and committed while holding the
/// sequencer lock, so calls never interleave on the same transaction and a
/// rejected call leaves no trace. Value leaves escrow only after the new status
/// has been stored, and outside the lock: a recipient that calls back into the
/// engine while being paid observes the committed state.
///
/// A failed payout has moved no value, so the engine puts the transaction back
/// the way it was before the call and returns the error.
pub struct EscrowEngine {
    config: EscrowConfig,
    transactions: TransactionStoreBox,
    payouts: PayoutDispatcher,
    clock: ClockBox,
    sequencer: Mutex<()>,
}

impl EscrowEngine {
    /// Creates a new `EscrowEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `config` - Dispute window and transfer timeout.
    /// * `transactions` - The store for escrow transactions.
    /// * `payouts` - Ledger, preferences and outbound transfer rail.
    /// * `clock` - Source of `now` for the dispute/claim window.
    pub fn new(
        config: EscrowConfig,
        transactions: TransactionStoreBox,
        payouts: PayoutDispatcher,
        clock: ClockBox,
    ) -> Self {
        Self {
            config,
            transactions,
            payouts,
            clock,
            sequencer: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    /// Runs `command` on behalf of `caller`.
    pub async fn execute(&self, caller: &Address, command: Command) -> Result<Receipt> {
        match command {
            Command::Open {
                seller,
                price,
                paid,
            } => self.open(caller, &seller, price, paid).await,
            Command::Transition {
                operation,
                transaction_id,
            } => self.transition(caller, operation, transaction_id).await,
            Command::SetAutoWithdraw(enabled) => self.set_auto_withdraw(caller, enabled).await,
            Command::Withdraw(amount) => self.withdraw(caller, amount).await,
        }
    }

    /// Dry-runs `command`: performs every validation `execute` would, against
    /// current state, without mutating anything.
    pub async fn preflight(&self, caller: &Address, command: &Command) -> Result<()> {
        debug!(%caller, ?command, "preflight");
        match command {
            Command::Open {
                seller,
                price,
                paid,
            } => validate_open(caller, seller, *price, *paid),
            Command::Transition {
                operation,
                transaction_id,
            } => {
                let tx = self.load(*transaction_id).await?;
                tx.check(
                    *operation,
                    caller,
                    self.clock.now(),
                    self.config.dispute_window,
                )
            }
            Command::SetAutoWithdraw(_) => Ok(()),
            Command::Withdraw(amount) => {
                let available = self.payouts.balance_of(caller).await?;
                if available < Balance::from(*amount) {
                    return Err(EscrowError::InsufficientBalance {
                        requested: amount.value(),
                        available: available.value(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Opens a transaction with `caller` as buyer.
    ///
    /// `paid` is the value attached to the call. Anything above `price` is
    /// refunded to the caller before returning.
    pub async fn open(
        &self,
        caller: &Address,
        seller: &Address,
        price: Amount,
        paid: Decimal,
    ) -> Result<Receipt> {
        validate_open(caller, seller, price, paid)?;

        let tx = {
            let _guard = self.sequencer.lock().await;
            let id = self.transactions.next_id().await?;
            let tx = Transaction::open(id, *caller, *seller, price, self.clock.now());
            self.transactions.store(tx.clone()).await?;
            tx
        };
        info!(id = tx.id, buyer = %tx.buyer, seller = %tx.seller, amount = %tx.amount, "transaction opened");

        let mut events = vec![EscrowEvent::NewTransaction {
            transaction_id: tx.id,
            buyer: tx.buyer,
            seller: tx.seller,
            amount: tx.amount,
        }];

        if paid > price.value() {
            let surplus = Amount::new(paid - price.value())?;
            events.push(EscrowEvent::SurplusRefund {
                buyer: *caller,
                paid,
                price,
                surplus,
            });
            match self.payouts.refund_surplus(caller, surplus).await {
                Ok(refund) => events.extend(refund),
                Err(err) => {
                    self.discard(tx.id, &err).await;
                    return Err(err);
                }
            }
        }

        Ok(Receipt {
            transaction: Some(tx),
            events,
        })
    }

    pub async fn deliver(&self, caller: &Address, tx_id: TransactionId) -> Result<Receipt> {
        self.transition(caller, Operation::Deliver, tx_id).await
    }

    pub async fn confirm(&self, caller: &Address, tx_id: TransactionId) -> Result<Receipt> {
        self.transition(caller, Operation::Confirm, tx_id).await
    }

    pub async fn claim(&self, caller: &Address, tx_id: TransactionId) -> Result<Receipt> {
        self.transition(caller, Operation::Claim, tx_id).await
    }

    pub async fn dispute(&self, caller: &Address, tx_id: TransactionId) -> Result<Receipt> {
        self.transition(caller, Operation::Dispute, tx_id).await
    }

    pub async fn resolve_dispute(&self, caller: &Address, tx_id: TransactionId) -> Result<Receipt> {
        self.transition(caller, Operation::ResolveDispute, tx_id).await
    }

    pub async fn withdraw(&self, caller: &Address, amount: Amount) -> Result<Receipt> {
        let events = self.payouts.withdraw(caller, amount).await?;
        info!(account = %caller, %amount, "withdrawal completed");
        Ok(Receipt {
            transaction: None,
            events,
        })
    }

    pub async fn set_auto_withdraw(&self, caller: &Address, enabled: bool) -> Result<Receipt> {
        let event = self.payouts.set_auto_withdraw(caller, enabled).await?;
        info!(account = %caller, enabled, "auto-withdraw preference set");
        Ok(Receipt {
            transaction: None,
            events: vec![event],
        })
    }

    pub async fn transaction(&self, tx_id: TransactionId) -> Result<Option<Transaction>> {
        self.transactions.get(tx_id).await
    }

    /// All transactions, ordered by id.
    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        let mut all = self.transactions.get_all().await?;
        all.sort_by_key(|tx| tx.id);
        Ok(all)
    }

    pub async fn balance_of(&self, account: &Address) -> Result<Balance> {
        self.payouts.balance_of(account).await
    }

    pub async fn auto_withdraw_of(&self, account: &Address) -> Result<bool> {
        self.payouts.auto_withdraw_of(account).await
    }

    pub async fn ledger_accounts(&self) -> Result<Vec<LedgerAccount>> {
        let mut accounts = self.payouts.ledger_accounts().await?;
        accounts.sort_by_key(|account| account.account);
        Ok(accounts)
    }

    /// Total value currently locked in non-terminal transactions.
    pub async fn held_in_escrow(&self) -> Result<Balance> {
        self
            .transactions
            .get_all()
            .await?
            .iter()
            .filter(|tx| !tx.status.is_terminal())
            .try_fold(Balance::ZERO, |sum, tx| sum.checked_add(tx.amount))
    }

    async fn transition(
        &self,
        caller: &Address,
        operation: Operation,
        tx_id: TransactionId,
    ) -> Result<Receipt> {
        let (previous, tx, event) = {
            let _guard = self.sequencer.lock().await;
            let mut tx = self.load(tx_id).await?;
            let now = self.clock.now();
            tx.check(operation, caller, now, self.config.dispute_window)?;
            let previous = tx.clone();
            let event = tx.apply(operation, now);
            self.transactions.store(tx.clone()).await?;
            (previous, tx, event)
        };
        info!(id = tx.id, %operation, status = %tx.status, "transaction updated");

        let mut events = vec![event];
        let payee = match operation {
            Operation::Claim => Some(tx.seller),
            Operation::ResolveDispute => Some(tx.buyer),
            _ => None,
        };
        if let Some(payee) = payee {
            match self.payouts.pay(&payee, tx.amount).await {
                Ok(payout) => events.extend(payout),
                Err(err) => {
                    self.restore(previous, &err).await;
                    return Err(err);
                }
            }
        }

        Ok(Receipt {
            transaction: Some(tx),
            events,
        })
    }

    /// Puts back the pre-call snapshot of a transaction whose payout failed.
    ///
    /// Terminal statuses accept no further operation, so nothing can have
    /// moved the transaction on between the commit and this restore.
    async fn restore(&self, previous: Transaction, cause: &EscrowError) {
        let _guard = self.sequencer.lock().await;
        warn!(id = previous.id, status = %previous.status, error = %cause, "payout failed, restoring status");
        let id = previous.id;
        if let Err(e) = self.transactions.store(previous).await {
            error!(id, error = %e, "could not restore transaction after failed payout");
        }
    }

    /// Drops a just-opened transaction whose surplus refund failed.
    async fn discard(&self, tx_id: TransactionId, cause: &EscrowError) {
        let _guard = self.sequencer.lock().await;
        warn!(id = tx_id, error = %cause, "surplus refund failed, discarding transaction");
        if let Err(e) = self.transactions.remove(tx_id).await {
            error!(id = tx_id, error = %e, "could not discard transaction after failed refund");
        }
    }

    async fn load(&self, tx_id: TransactionId) -> Result<Transaction> {
        self.transactions
            .get(tx_id)
            .await?
            .ok_or(EscrowError::NotFound(tx_id))
    }
}

fn validate_open(caller: &Address, seller: &Address, price: Amount, paid: Decimal) -> Result<()> {
    if caller == seller {
        return Err(EscrowError::ValidationError(
            "buyer and seller must be different parties".to_string(),
        ));
    }
    if paid < price.value() {
        return Err(EscrowError::InsufficientFunds {
            required: price.value(),
            provided: paid,
        });
    }
    Ok(())
}
