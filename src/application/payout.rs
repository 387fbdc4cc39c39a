use crate::domain::events::EscrowEvent;
use crate::domain::ledger::LedgerAccount;
use crate::domain::money::{Amount, Balance};
use crate::domain::party::Address;
use crate::domain::ports::{LedgerStoreBox, PreferenceStoreBox, ValueTransferBox};
use crate::error::{EscrowError, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Moves value out of escrow.
///
/// A payout first tries a direct, time-bounded transfer; if the recipient has
/// auto-withdraw off, or the transfer errors or times out, the amount is
/// credited to the recipient's ledger balance instead. A payout therefore only
/// fails when the ledger itself refuses the credit, and then no value has moved.
pub struct PayoutDispatcher {
    ledger: LedgerStoreBox,
    preferences: PreferenceStoreBox,
    transfer: ValueTransferBox,
    transfer_timeout: Duration,
}

impl PayoutDispatcher {
    pub fn new(
        ledger: LedgerStoreBox,
        preferences: PreferenceStoreBox,
        transfer: ValueTransferBox,
        transfer_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            preferences,
            transfer,
            transfer_timeout,
        }
    }

    /// Pays `amount` to `recipient`, honouring their auto-withdraw preference.
    pub async fn pay(&self, recipient: &Address, amount: Amount) -> Result<Vec<EscrowEvent>> {
        if !self.preferences.auto_withdraw(recipient).await? {
            debug!(%recipient, %amount, "auto-withdraw off, crediting ledger");
            return Ok(vec![self.credit(recipient, amount).await?]);
        }
        self.send_or_credit(recipient, amount).await
    }

    /// Returns overpayment to the opener. Always tries the direct transfer first.
    pub async fn refund_surplus(
        &self,
        recipient: &Address,
        amount: Amount,
    ) -> Result<Vec<EscrowEvent>> {
        self.send_or_credit(recipient, amount).await
    }

    /// Withdraws from `account`'s own ledger balance.
    ///
    /// The balance is debited before the outbound transfer starts; if the
    /// transfer fails the debit is reversed and the call fails.
    pub async fn withdraw(&self, account: &Address, amount: Amount) -> Result<Vec<EscrowEvent>> {
        let change = self.ledger.debit(account, amount).await?;

        if let Err(e) = self.send(account, amount).await {
            warn!(%account, %amount, error = %e, "withdrawal transfer failed, restoring balance");
            self.ledger.credit(account, amount).await?;
            return Err(match e {
                EscrowError::TransferFailed(_) => e,
                other => EscrowError::TransferFailed(other.to_string()),
            });
        }

        Ok(vec![EscrowEvent::WithdrawalSuccessful {
            account: *account,
            amount,
            new_balance: change.current,
        }])
    }

    pub async fn set_auto_withdraw(&self, account: &Address, enabled: bool) -> Result<EscrowEvent> {
        self.preferences.set_auto_withdraw(account, enabled).await?;
        Ok(EscrowEvent::AutoWithdrawSet {
            account: *account,
            enabled,
        })
    }

    pub async fn auto_withdraw_of(&self, account: &Address) -> Result<bool> {
        self.preferences.auto_withdraw(account).await
    }

    pub async fn balance_of(&self, account: &Address) -> Result<Balance> {
        Ok(self.ledger.get(account).await?.balance)
    }

    pub async fn ledger_accounts(&self) -> Result<Vec<LedgerAccount>> {
        self.ledger.get_all().await
    }

    async fn send_or_credit(&self, recipient: &Address, amount: Amount) -> Result<Vec<EscrowEvent>> {
        match self.send(recipient, amount).await {
            Ok(()) => Ok(vec![EscrowEvent::PayoutSent {
                recipient: *recipient,
                amount,
            }]),
            Err(e) => {
                warn!(%recipient, %amount, error = %e, "direct transfer failed, crediting ledger");
                Ok(vec![self.credit(recipient, amount).await?])
            }
        }
    }

    async fn send(&self, recipient: &Address, amount: Amount) -> Result<()> {
        match tokio::time::timeout(self.transfer_timeout, self.transfer.transfer(recipient, amount))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(EscrowError::TransferFailed(format!(
                "transfer to {recipient} timed out after {:?}",
                self.transfer_timeout
            ))),
        }
    }

    async fn credit(&self, recipient: &Address, amount: Amount) -> Result<EscrowEvent> {
        let change = self.ledger.credit(recipient, amount).await?;
        Ok(EscrowEvent::BalanceUpdated {
            account: change.account,
            previous: change.previous,
            current: change.current,
        })
    }
}
