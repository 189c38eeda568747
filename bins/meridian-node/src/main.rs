//! Meridian chain state engine binary.
//!
//! Opens the on-disk coin database, block files, and block index, wires
//! them into a [`meridian_consensus::ChainstateEngine`], replays the
//! genesis block if the database is empty, and idles until a shutdown
//! signal arrives. Peer networking, RPC, and wallet surfaces are out of
//! scope here — this binary only proves the engine runs end to end against
//! real on-disk state.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use meridian_consensus::ChainstateEngine;
use meridian_core::config::ChainEngineConfig;
use meridian_core::genesis;
use meridian_core::traits::{ChainNotification, MasternodePaymentsOracle, NotificationBus, PayeeSlot};
use meridian_storage::{BlockFileStore, CoinDatabase, IndexDatabase, StorageConfig};
use tracing::{error, info, warn};

/// Meridian chain state engine node.
#[derive(Parser, Debug)]
#[command(name = "meridian-node", version, about = "Meridian chain state engine")]
struct Args {
    /// Root directory for block files, the coin database, and the block index.
    #[arg(long)]
    datadir: Option<PathBuf>,

    /// Rebuild the block index from the block files on disk.
    #[arg(long)]
    reindex: bool,

    /// Rebuild only the coin database, replaying connected blocks from the index.
    #[arg(long)]
    reindex_chainstate: bool,

    /// Maintain the address index.
    #[arg(long)]
    addressindex: bool,

    /// Maintain the spent-output index.
    #[arg(long)]
    spentindex: bool,

    /// Maintain the transaction-location index.
    #[arg(long)]
    txindex: bool,

    /// Script verification worker threads. 0 lets the engine choose.
    #[arg(long, default_value_t = 0)]
    par: usize,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    loglevel: String,
}

impl From<Args> for StorageConfig {
    fn from(args: Args) -> Self {
        let data_dir = args.datadir.unwrap_or_else(|| {
            dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("meridian")
        });
        StorageConfig {
            data_dir,
            reindex: args.reindex,
            reindex_chainstate: args.reindex_chainstate,
            address_index: args.addressindex,
            spent_index: args.spentindex,
            tx_index: args.txindex,
            script_verification_threads: args.par,
            log_level: args.loglevel,
        }
    }
}

/// No masternode list is maintained by this binary; every block is treated
/// as if no payee rotation is due yet. A real deployment supplies this from
/// the masternode broadcast relay, which lives outside this crate.
struct NoMasternodeList;
impl MasternodePaymentsOracle for NoMasternodeList {
    fn expected_payee(&self, _height: u64) -> Option<PayeeSlot> {
        None
    }
}

/// Forwards chain events to the trace log. A real deployment fans these out
/// to RPC/ZMQ subscribers instead.
struct TracingNotificationBus;
impl NotificationBus for TracingNotificationBus {
    fn publish(&self, event: ChainNotification) {
        match event {
            ChainNotification::TipChanged { height, hash } => {
                info!(height, hash = %hash, "tip changed");
            }
            ChainNotification::BlockConnected { height, hash } => {
                info!(height, hash = %hash, "block connected");
            }
            ChainNotification::BlockDisconnected { height, hash } => {
                warn!(height, hash = %hash, "block disconnected");
            }
        }
    }
}

const EXIT_SUCCESS: i32 = 0;
const EXIT_FATAL: i32 = 1;
const EXIT_CORRUPTION: i32 = 2;
const EXIT_SHUTDOWN: i32 = 3;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let storage: StorageConfig = args.into();
    init_logging(&storage.log_level);

    info!("meridian-node v{}", env!("CARGO_PKG_VERSION"));
    info!(data_dir = %storage.data_dir.display(), "starting");

    if let Err(e) = std::fs::create_dir_all(&storage.data_dir) {
        error!("failed to create data directory: {e}");
        process::exit(EXIT_FATAL);
    }

    let mut block_files = match BlockFileStore::new(storage.blocks_dir(), 128 * 1024 * 1024) {
        Ok(store) => store,
        Err(e) => {
            error!("failed to open block files: {e}");
            process::exit(EXIT_FATAL);
        }
    };

    let index_db = match IndexDatabase::open(storage.index_db_path(), storage.index_flags()) {
        Ok(db) => db,
        Err(e) => {
            error!("failed to open block index database: {e}");
            process::exit(EXIT_FATAL);
        }
    };

    let coin_db = match CoinDatabase::open(storage.coin_db_path()) {
        Ok(db) => db,
        Err(e) => {
            error!("failed to open coin database: {e}");
            process::exit(EXIT_FATAL);
        }
    };

    if storage.reindex || storage.reindex_chainstate {
        info!("reindex requested: rescanning block files");
        match block_files.scan_all_blocks() {
            Ok(records) => {
                info!(count = records.len(), "recovered blocks from flat files; rerun without -reindex to continue normally");
                process::exit(EXIT_SUCCESS);
            }
            Err(e) => {
                error!("reindex failed: {e}");
                process::exit(EXIT_CORRUPTION);
            }
        }
    }

    let config = ChainEngineConfig { script_verification_threads: storage.script_verification_threads, ..ChainEngineConfig::default() };
    let engine = ChainstateEngine::new(
        coin_db,
        config,
        Arc::new(NoMasternodeList) as Arc<dyn MasternodePaymentsOracle>,
        Arc::new(TracingNotificationBus) as Arc<dyn NotificationBus>,
    );

    if engine.block_count() == 0 {
        let genesis = genesis::genesis_block();
        info!(hash = %genesis::genesis_hash(), "seeding genesis block");
        if let Err(e) = engine.accept_header(&genesis.header) {
            error!("genesis header rejected: {e}");
            process::exit(EXIT_CORRUPTION);
        }
        engine.remember_body(genesis.clone());
        if let Err(e) = engine.accept_body(genesis) {
            error!("genesis body rejected: {e}");
            process::exit(EXIT_CORRUPTION);
        }
        let hash = genesis::genesis_hash();
        if let Err(e) = engine.submit(&hash) {
            error!("genesis submit failed: {e}");
            process::exit(EXIT_CORRUPTION);
        }
        if let Err(e) = engine.activate_best_chain() {
            error!("genesis activation failed: {e}");
            process::exit(EXIT_CORRUPTION);
        }
    }

    info!(
        height = engine.block_count().saturating_sub(1),
        tip = %engine.active_tip(),
        "chain state engine ready",
    );

    // The index database and block files are held open for the process
    // lifetime; a real deployment would feed accepted headers/bodies into
    // them here as peers deliver blocks. With no network layer in this
    // crate there is nothing further to drive, so the process idles until
    // asked to stop.
    let _ = &index_db;

    info!("meridian-node running (Ctrl+C to stop)");
    if tokio::signal::ctrl_c().await.is_err() {
        error!("failed to install Ctrl+C handler");
        process::exit(EXIT_FATAL);
    }
    info!("shutdown signal received");
    process::exit(EXIT_SHUTDOWN);
}

fn init_logging(level: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true)).init();
}
