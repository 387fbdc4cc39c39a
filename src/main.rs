use chrono::{DateTime, TimeDelta, Utc};
use clap::Parser;
use escrow_engine::application::engine::EscrowEngine;
use escrow_engine::application::payout::PayoutDispatcher;
use escrow_engine::config::EscrowConfig;
use escrow_engine::domain::party::Address;
use escrow_engine::domain::ports::{
    ClockBox, LedgerStoreBox, PreferenceStoreBox, TransactionStoreBox,
};
use escrow_engine::infrastructure::clock::{ManualClock, SystemClock};
use escrow_engine::infrastructure::in_memory::{
    InMemoryLedgerStore, InMemoryPreferenceStore, InMemoryStatusMirror, InMemoryTransactionStore,
    InMemoryWallet,
};
#[cfg(feature = "storage-rocksdb")]
use escrow_engine::infrastructure::rocksdb::RocksDBStore;
use escrow_engine::interfaces::client::EscrowClient;
use escrow_engine::interfaces::csv::command_reader::CommandReader;
use escrow_engine::interfaces::csv::report_writer::ReportWriter;
use miette::{IntoDiagnostic, Result, miette};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input command script CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Dispute window after confirmation, in seconds
    #[arg(long, default_value_t = 86_400)]
    dispute_window_secs: i64,

    /// Upper bound for a single direct transfer, in milliseconds
    #[arg(long, default_value_t = 5_000)]
    transfer_timeout_ms: u64,

    /// Wallet address that refuses direct transfers (repeatable)
    #[arg(long)]
    rejecting: Vec<Address>,

    /// Print ledger balances instead of the transaction table
    #[arg(long)]
    balances: bool,

    /// Use the system clock and ignore the script's `at` column
    #[arg(long)]
    wall_clock: bool,
}

struct Stores {
    transactions: TransactionStoreBox,
    ledger: LedgerStoreBox,
    preferences: PreferenceStoreBox,
}

impl Stores {
    fn in_memory() -> Self {
        Self {
            transactions: Box::new(InMemoryTransactionStore::new()),
            ledger: Box::new(InMemoryLedgerStore::new()),
            preferences: Box::new(InMemoryPreferenceStore::new()),
        }
    }

    fn open(db_path: Option<&Path>) -> Result<Self> {
        match db_path {
            #[cfg(feature = "storage-rocksdb")]
            Some(path) => {
                let store = RocksDBStore::open(path).into_diagnostic()?;
                Ok(Self {
                    transactions: Box::new(store.clone()),
                    ledger: Box::new(store.clone()),
                    preferences: Box::new(store),
                })
            }
            #[cfg(not(feature = "storage-rocksdb"))]
            Some(_) => {
                warn!(
                    "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
                );
                Ok(Self::in_memory())
            }
            None => Ok(Self::in_memory()),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let dispute_window = TimeDelta::try_seconds(cli.dispute_window_secs)
        .filter(|window| *window > TimeDelta::zero())
        .ok_or_else(|| miette!("invalid dispute window: {}s", cli.dispute_window_secs))?;
    let config = EscrowConfig::default()
        .with_dispute_window(dispute_window)
        .with_transfer_timeout(Duration::from_millis(cli.transfer_timeout_ms));

    let wallet = InMemoryWallet::new();
    for address in &cli.rejecting {
        wallet.reject(*address).await;
    }

    let scripted = (!cli.wall_clock).then(|| ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
    let clock: ClockBox = match &scripted {
        Some(clock) => Box::new(clock.clone()),
        None => Box::new(SystemClock),
    };
    let stores = Stores::open(cli.db_path.as_deref())?;
    let payouts = PayoutDispatcher::new(
        stores.ledger,
        stores.preferences,
        Box::new(wallet),
        config.transfer_timeout,
    );
    let engine = EscrowEngine::new(config, stores.transactions, payouts, clock);

    let mirror = InMemoryStatusMirror::new();
    let client = EscrowClient::new(Arc::new(engine), Box::new(mirror.clone()));
    let restored = client.resync_mirror().await.into_diagnostic()?;
    if restored > 0 {
        info!(restored, "mirror rebuilt from stored transactions");
    }

    // Replay the script
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for (index, entry) in reader.commands().enumerate() {
        let line = index + 2;
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(line, error = %e, "Error reading command");
                continue;
            }
        };

        if let Some(at) = entry.at {
            match &scripted {
                Some(clock) => {
                    if let Err(e) = clock.set(at) {
                        warn!(line, error = %e, "Error reading command");
                        continue;
                    }
                }
                None => debug!(line, %at, "wall clock in use, ignoring scripted time"),
            }
        }

        match client.submit(&entry.caller, entry.command).await {
            Ok(receipt) => {
                for event in &receipt.events {
                    debug!(line, ?event, "event emitted");
                }
            }
            Err(e) => warn!(line, caller = %entry.caller, error = %e, "Command rejected"),
        }
    }

    // Output final state
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    if cli.balances {
        let accounts = client.engine().ledger_accounts().await.into_diagnostic()?;
        writer.write_balances(accounts).into_diagnostic()?;
    } else {
        writer.write_mirror(mirror.get_all().await).into_diagnostic()?;
    }

    Ok(())
}
