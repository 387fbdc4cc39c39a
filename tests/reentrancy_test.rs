use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use escrow_engine::application::engine::EscrowEngine;
use escrow_engine::application::payout::PayoutDispatcher;
use escrow_engine::config::EscrowConfig;
use escrow_engine::domain::money::{Amount, Balance};
use escrow_engine::domain::party::Address;
use escrow_engine::domain::ports::ValueTransfer;
use escrow_engine::error::Result;
use escrow_engine::infrastructure::clock::ManualClock;
use escrow_engine::infrastructure::in_memory::{
    InMemoryLedgerStore, InMemoryPreferenceStore, InMemoryTransactionStore,
};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

const BUYER: Address = Address::new([0xb0; 20]);
const SELLER: Address = Address::new([0x5e; 20]);

#[derive(Clone, Copy, Debug, PartialEq)]
enum Reentry {
    Withdraw,
    Claim,
}

/// A recipient that calls back into the engine the first time it is paid.
#[derive(Clone)]
struct ReentrantWallet {
    reentry: Reentry,
    engine: Arc<OnceLock<Weak<EscrowEngine>>>,
    reentered: Arc<AtomicBool>,
    outcomes: Arc<Mutex<Vec<std::result::Result<(), &'static str>>>>,
    transfers: Arc<Mutex<Vec<Amount>>>,
}

impl ReentrantWallet {
    fn new(reentry: Reentry) -> Self {
        Self {
            reentry,
            engine: Arc::new(OnceLock::new()),
            reentered: Arc::new(AtomicBool::new(false)),
            outcomes: Arc::new(Mutex::new(Vec::new())),
            transfers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn outcomes(&self) -> Vec<std::result::Result<(), &'static str>> {
        self.outcomes.lock().unwrap().clone()
    }

    fn transferred(&self) -> Vec<Amount> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ValueTransfer for ReentrantWallet {
    async fn transfer(&self, recipient: &Address, amount: Amount) -> Result<()> {
        if !self.reentered.swap(true, Ordering::SeqCst) {
            let engine = self.engine.get().and_then(Weak::upgrade).unwrap();
            let outcome = match self.reentry {
                Reentry::Withdraw => engine.withdraw(recipient, amount).await.map(|_| ()),
                Reentry::Claim => engine.claim(recipient, 0).await.map(|_| ()),
            };
            self.outcomes
                .lock()
                .unwrap()
                .push(outcome.map_err(|err| err.code()));
        }
        self.transfers.lock().unwrap().push(amount);
        Ok(())
    }
}

struct Harness {
    engine: Arc<EscrowEngine>,
    clock: ManualClock,
}

fn harness(wallet: &ReentrantWallet) -> Harness {
    let clock = ManualClock::new(DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap());
    let payouts = PayoutDispatcher::new(
        Box::new(InMemoryLedgerStore::new()),
        Box::new(InMemoryPreferenceStore::new()),
        Box::new(wallet.clone()),
        Duration::from_secs(1),
    );
    let engine = Arc::new(EscrowEngine::new(
        EscrowConfig::default(),
        Box::new(InMemoryTransactionStore::new()),
        payouts,
        Box::new(clock.clone()),
    ));
    wallet.engine.set(Arc::downgrade(&engine)).unwrap();
    Harness { engine, clock }
}

async fn claimable(h: &Harness) {
    let price = Amount::new(dec!(200)).unwrap();
    h.engine.open(&BUYER, &SELLER, price, dec!(200)).await.unwrap();
    h.engine.deliver(&SELLER, 0).await.unwrap();
    h.engine.confirm(&BUYER, 0).await.unwrap();
    h.clock.advance(TimeDelta::days(1));
}

#[tokio::test]
async fn test_recursive_withdraw_sees_debited_balance() {
    let wallet = ReentrantWallet::new(Reentry::Withdraw);
    let h = harness(&wallet);
    claimable(&h).await;

    // Auto-withdraw is off, so the claim credits the ledger.
    h.engine.claim(&SELLER, 0).await.unwrap();
    assert_eq!(
        h.engine.balance_of(&SELLER).await.unwrap(),
        Balance::new(dec!(200))
    );

    let amount = Amount::new(dec!(200)).unwrap();
    h.engine.withdraw(&SELLER, amount).await.unwrap();

    assert_eq!(wallet.outcomes(), vec![Err("InsufficientBalance")]);
    assert_eq!(wallet.transferred(), vec![amount]);
    assert_eq!(h.engine.balance_of(&SELLER).await.unwrap(), Balance::ZERO);
}

#[tokio::test]
async fn test_recursive_claim_sees_committed_status() {
    let wallet = ReentrantWallet::new(Reentry::Claim);
    let h = harness(&wallet);
    claimable(&h).await;
    h.engine.set_auto_withdraw(&SELLER, true).await.unwrap();

    let receipt = h.engine.claim(&SELLER, 0).await.unwrap();
    assert!(receipt.find("PayoutSent").is_some());

    assert_eq!(wallet.outcomes(), vec![Err("TransactionNotConfirmed")]);
    assert_eq!(wallet.transferred().len(), 1);
    assert_eq!(h.engine.balance_of(&SELLER).await.unwrap(), Balance::ZERO);
}
