//! Shared block/engine construction helpers for the integration tests.

use std::sync::Arc;

use meridian_consensus::ChainstateEngine;
use meridian_core::config::ChainEngineConfig;
use meridian_core::constants::COIN;
use meridian_core::genesis;
use meridian_core::traits::{ChainNotification, MasternodePaymentsOracle, NotificationBus, PayeeSlot};
use meridian_core::types::{Block, BlockHeader, Hash256, OutPoint, ScriptPubKey, Transaction, TxInput, TxOutput};
use meridian_storage::CoinDatabase;

/// A pubkey hash derived from a single seed byte, for tests that only need
/// distinct payees, not real keys.
pub fn pkh(seed: u8) -> Hash256 {
    Hash256([seed; 32])
}

/// A coinbase transaction paying `reward` to `payee`, with `height` folded
/// into the signature field so coinbases at different heights never
/// collide on txid.
pub fn make_coinbase(reward: u64, payee: Hash256, height: u64) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput { previous_output: OutPoint::null(), signature: height.to_le_bytes().to_vec(), public_key: vec![] }],
        outputs: vec![TxOutput { value: reward, script_pubkey: ScriptPubKey::PayToPubkeyHash(payee) }],
        lock_time: 0,
    }
}

/// A block carrying a single coinbase transaction and a correct merkle
/// root, at the easiest possible proof-of-work target.
pub fn make_block(prev_hash: Hash256, timestamp: u64, height: u64, payee: Hash256) -> Block {
    let coinbase = make_coinbase(50 * COIN, payee, height);
    let merkle = meridian_core::merkle::merkle_root(&[coinbase.txid().unwrap()]);
    Block {
        header: BlockHeader { version: 1, prev_hash, merkle_root: merkle, timestamp, difficulty_target: u64::MAX, nonce: 0 },
        transactions: vec![coinbase],
        block_signature: vec![],
    }
}

/// No masternode payments are due in these tests.
pub struct NoPayee;
impl MasternodePaymentsOracle for NoPayee {
    fn expected_payee(&self, _height: u64) -> Option<PayeeSlot> {
        None
    }
}

/// Counts published notifications without asserting on their content.
#[derive(Default)]
pub struct CountingBus {
    pub count: std::sync::atomic::AtomicUsize,
}
impl NotificationBus for CountingBus {
    fn publish(&self, _event: ChainNotification) {
        self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// A [`ChainstateEngine`] backed by a real RocksDB coin database under a
/// temporary directory, seeded with the genesis block.
pub struct TestEngine {
    pub engine: ChainstateEngine<CoinDatabase>,
    _dir: tempfile::TempDir,
}

impl TestEngine {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = CoinDatabase::open(dir.path().join("chainstate")).unwrap();
        let config = ChainEngineConfig { enforce_checkpoints: false, ..ChainEngineConfig::default() };
        let engine = ChainstateEngine::new(db, config, Arc::new(NoPayee), Arc::new(CountingBus::default()))
            .with_clock(|| genesis::GENESIS_TIMESTAMP + 1_000_000);

        let genesis = genesis::genesis_block();
        engine.accept_header(&genesis.header).unwrap();
        engine.remember_body(genesis.clone());
        engine.accept_body(genesis).unwrap();
        engine.submit(&genesis::genesis_hash()).unwrap();
        engine.activate_best_chain().unwrap();

        Self { engine, _dir: dir }
    }

    /// Build, accept, and activate the next block atop the current tip,
    /// paying its coinbase to `payee`. Returns the connected block.
    pub fn mine_to(&self, payee: Hash256) -> Block {
        let tip = self.engine.active_tip();
        let height = self.engine.block_count() as u64;
        let timestamp = genesis::GENESIS_TIMESTAMP + height * meridian_core::constants::BLOCK_TIME_SECS + 100;
        let block = make_block(tip, timestamp, height, payee);

        self.engine.accept_header(&block.header).unwrap();
        self.engine.remember_body(block.clone());
        self.engine.accept_body(&block).unwrap();
        self.engine.submit(&block.header.hash()).unwrap();
        self.engine.activate_best_chain().unwrap();
        block
    }

    pub fn mine(&self) -> Block {
        let height = self.engine.block_count() as u64;
        self.mine_to(pkh(height as u8))
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}
