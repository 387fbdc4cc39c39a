use crate::application::engine::EscrowEngine;
use crate::domain::command::Command;
use crate::domain::events::Receipt;
use crate::domain::party::Address;
use crate::domain::ports::StatusMirrorBox;
use crate::domain::transaction::{MirrorRecord, TransactionId};
use crate::error::{ErrorKind, EscrowError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// What a submitting party is told when a command does not go through.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The engine refused the command; nothing changed.
    #[error("{message}")]
    Rejected {
        kind: ErrorKind,
        code: &'static str,
        message: String,
    },
    #[error("Transaction failed: {0}")]
    Failed(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    /// The command committed but the mirror could not be updated.
    #[error("Transaction {transaction_id} committed but mirror update failed: {reason}")]
    MirrorFailed {
        transaction_id: TransactionId,
        reason: String,
    },
}

impl ClientError {
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<EscrowError> for ClientError {
    fn from(err: EscrowError) -> Self {
        if err.is_rejection() {
            return Self::Rejected {
                kind: err.kind(),
                code: err.code(),
                message: describe(&err),
            };
        }
        match err {
            EscrowError::TransferFailed(reason) => Self::Failed(reason),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

fn describe(err: &EscrowError) -> String {
    match err {
        EscrowError::WindowNotElapsed { ready_at, now } => wait_time_remaining(*ready_at, *now),
        other => format!("{}: {other}", other.code()),
    }
}

fn wait_time_remaining(ready_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = (ready_at - now).num_seconds().max(0);
    let hours = remaining / 3600;
    let minutes = (remaining % 3600) / 60;
    format!("Wait time remaining: {hours}h {minutes}m")
}

/// Submits commands to the engine and keeps the status mirror in step.
///
/// Every command is dry-run first so a rejection is reported without
/// attempting the real call. Only committed commands reach the mirror.
pub struct EscrowClient {
    engine: Arc<EscrowEngine>,
    mirror: StatusMirrorBox,
}

impl EscrowClient {
    pub fn new(engine: Arc<EscrowEngine>, mirror: StatusMirrorBox) -> Self {
        Self { engine, mirror }
    }

    pub fn engine(&self) -> &Arc<EscrowEngine> {
        &self.engine
    }

    pub async fn submit(&self, caller: &Address, command: Command) -> Result<Receipt, ClientError> {
        self.engine.preflight(caller, &command).await?;

        // transitions update an existing mirror row; an open adds one
        let existing = command.transaction_id();
        let receipt = self.engine.execute(caller, command).await?;

        if let Some(tx) = &receipt.transaction {
            let mirrored = match existing {
                Some(tx_id) => self.mirror.update_status(tx_id, tx.status).await,
                None => self.mirror.record_transaction(MirrorRecord::from(tx)).await,
            };
            mirrored.map_err(|err| {
                warn!(id = tx.id, error = %err, "mirror update failed");
                ClientError::MirrorFailed {
                    transaction_id: tx.id,
                    reason: err.to_string(),
                }
            })?;
            debug!(id = tx.id, status = %tx.status, "mirror updated");
        }

        Ok(receipt)
    }

    /// Rewrites the mirror from the engine's own records.
    ///
    /// Used at startup when the engine state outlives the mirror.
    pub async fn resync_mirror(&self) -> Result<usize, ClientError> {
        let transactions = self.engine.transactions().await?;
        let count = transactions.len();
        for tx in &transactions {
            self.mirror
                .record_transaction(MirrorRecord::from(tx))
                .await
                .map_err(|err| ClientError::MirrorFailed {
                    transaction_id: tx.id,
                    reason: err.to_string(),
                })?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::payout::PayoutDispatcher;
    use crate::config::EscrowConfig;
    use crate::domain::money::Amount;
    use crate::domain::transaction::{Operation, TransactionStatus};
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::in_memory::{
        InMemoryLedgerStore, InMemoryPreferenceStore, InMemoryStatusMirror,
        InMemoryTransactionStore, InMemoryWallet,
    };
    use chrono::TimeDelta;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const BUYER: Address = Address::new([0xb0; 20]);
    const SELLER: Address = Address::new([0x5e; 20]);

    fn client() -> (EscrowClient, InMemoryStatusMirror, ManualClock) {
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let payouts = PayoutDispatcher::new(
            Box::new(InMemoryLedgerStore::new()),
            Box::new(InMemoryPreferenceStore::new()),
            Box::new(InMemoryWallet::new()),
            Duration::from_millis(100),
        );
        let engine = EscrowEngine::new(
            EscrowConfig::default(),
            Box::new(InMemoryTransactionStore::new()),
            payouts,
            Box::new(clock.clone()),
        );
        let mirror = InMemoryStatusMirror::new();
        let client = EscrowClient::new(Arc::new(engine), Box::new(mirror.clone()));
        (client, mirror, clock)
    }

    fn open() -> Command {
        Command::Open {
            seller: SELLER,
            price: Amount::new(dec!(200)).unwrap(),
            paid: dec!(200),
        }
    }

    fn transition(operation: Operation) -> Command {
        Command::Transition {
            operation,
            transaction_id: 0,
        }
    }

    #[tokio::test]
    async fn test_submit_mirrors_committed_status() {
        let (client, mirror, _) = client();
        client.submit(&BUYER, open()).await.unwrap();
        assert_eq!(
            mirror.get(0).await.unwrap().status,
            TransactionStatus::Pending
        );

        client
            .submit(&SELLER, transition(Operation::Deliver))
            .await
            .unwrap();
        assert_eq!(
            mirror.get(0).await.unwrap().status,
            TransactionStatus::Delivered
        );
    }

    #[tokio::test]
    async fn test_transition_without_mirror_row_is_reported() {
        let (client, _, _) = client();
        client.submit(&BUYER, open()).await.unwrap();

        let detached = EscrowClient::new(
            client.engine().clone(),
            Box::new(InMemoryStatusMirror::new()),
        );
        let err = detached
            .submit(&SELLER, transition(Operation::Deliver))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::MirrorFailed {
                transaction_id: 0,
                reason: EscrowError::NotFound(0).to_string(),
            }
        );
        let tx = client.engine().transaction(0).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Delivered);
    }

    #[tokio::test]
    async fn test_rejection_leaves_mirror_untouched() {
        let (client, mirror, _) = client();
        client.submit(&BUYER, open()).await.unwrap();

        let err = client
            .submit(&BUYER, transition(Operation::Deliver))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("NotSeller"));
        assert!(matches!(
            err,
            ClientError::Rejected {
                kind: ErrorKind::Unauthorized,
                ..
            }
        ));
        assert_eq!(
            mirror.get(0).await.unwrap().status,
            TransactionStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_wait_time_message() {
        let (client, _, clock) = client();
        client.submit(&BUYER, open()).await.unwrap();
        client
            .submit(&SELLER, transition(Operation::Deliver))
            .await
            .unwrap();
        client
            .submit(&BUYER, transition(Operation::Confirm))
            .await
            .unwrap();

        clock.advance(TimeDelta::hours(20) + TimeDelta::minutes(47) + TimeDelta::seconds(30));
        let err = client
            .submit(&SELLER, transition(Operation::Claim))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Wait time remaining: 3h 12m");
        assert_eq!(err.code(), Some("WaitPeriodNotPassed"));
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_rejected() {
        let (client, _, _) = client();
        let err = client
            .submit(&SELLER, transition(Operation::Deliver))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("Transaction404"));
    }

    #[tokio::test]
    async fn test_resync_mirror_rebuilds_records() {
        let (client, _, _) = client();
        client.submit(&BUYER, open()).await.unwrap();
        client.submit(&BUYER, open()).await.unwrap();

        let fresh = InMemoryStatusMirror::new();
        let resynced = EscrowClient::new(client.engine().clone(), Box::new(fresh.clone()));
        assert_eq!(resynced.resync_mirror().await.unwrap(), 2);
        assert_eq!(fresh.get_all().await.len(), 2);
    }

    #[test]
    fn test_transfer_failure_is_not_a_rejection() {
        let err = ClientError::from(EscrowError::TransferFailed("wallet offline".into()));
        assert_eq!(err.to_string(), "Transaction failed: wallet offline");
        assert_eq!(err.code(), None);

        let err = ClientError::from(EscrowError::internal("disk full"));
        assert!(matches!(err, ClientError::Unavailable(_)));
    }
}
