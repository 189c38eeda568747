//! `ChainstateEngine`: the single owned value consolidating the block
//! index, coin view cache, deployment tracker, download scheduler, and the
//! collaborator handles the rest of the node supplies. It exposes the
//! narrow entry points the block acceptance pipeline and reorg mediator
//! need (`accept_header`, `accept_body`, `activate_best_chain`,
//! `invalidate_block`, `reconsider_block`) and serializes all of them
//! behind one coarse mutex, mirroring the concurrency model the teacher's
//! `ConsensusEngine`/`RocksStore` pairing used for a single-purpose PoW
//! miner, generalized here into the full consensus facade.

use std::sync::Arc;

use parking_lot::Mutex;

use meridian_core::block_index::BlockIndex;
use meridian_core::block_validation::BlockContext;
use meridian_core::coin_view::{CoinCache, CoinViewBacking, CoinViewWrite};
use meridian_core::config::ChainEngineConfig;
use meridian_core::error::BlockError;
use meridian_core::pos_kernel;
use meridian_core::subsidy;
use meridian_core::traits::{MasternodePaymentsOracle, NotificationBus, ChainNotification};
use meridian_core::types::{Block, BlockHeader, Hash256};

use crate::download::DownloadScheduler;
use crate::pipeline::{self, HeaderAcceptance, HeaderContext};
use crate::reorg::{self, ActivationOutcome, BlockBodyStore, ContextBuilder, UndoStore};
use crate::tip::BlockUndo;

/// The on-disk base layer the coin cache stacks over. Implemented by
/// `meridian-storage`'s RocksDB-backed store; an in-memory map suffices
/// for tests.
pub trait CoinDatabase: CoinViewBacking + CoinViewWrite + Send + Sync {}
impl<T: CoinViewBacking + CoinViewWrite + Send + Sync> CoinDatabase for T {}

struct EngineState<B: CoinViewBacking> {
    index: BlockIndex,
    cache: CoinCache<B>,
    active_tip: Hash256,
    download: DownloadScheduler,
    stake_modifiers: std::collections::HashMap<Hash256, Hash256>,
    bodies: std::collections::HashMap<Hash256, Block>,
    undo: std::collections::HashMap<Hash256, BlockUndo>,
}

impl<B: CoinViewBacking> BlockBodyStore for EngineState<B> {
    fn get_block(&self, hash: &Hash256) -> Option<Block> {
        self.bodies.get(hash).cloned()
    }
}

impl<B: CoinViewBacking> UndoStore for EngineState<B> {
    fn get_undo(&self, hash: &Hash256) -> Option<BlockUndo> {
        self.undo.get(hash).cloned()
    }
    fn put_undo(&mut self, hash: Hash256, undo: BlockUndo) {
        self.undo.insert(hash, undo);
    }
}

/// Consolidates the chain state engine's components behind one coarse
/// lock. `B` is the base coin-view layer (storage-backed in production, an
/// in-memory map in tests).
pub struct ChainstateEngine<B: CoinViewBacking> {
    state: Mutex<EngineState<B>>,
    config: ChainEngineConfig,
    masternode_oracle: Arc<dyn MasternodePaymentsOracle>,
    notifications: Arc<dyn NotificationBus>,
    clock: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl<B: CoinViewBacking + std::marker::Sync> ChainstateEngine<B> {
    pub fn new(
        base: B,
        config: ChainEngineConfig,
        masternode_oracle: Arc<dyn MasternodePaymentsOracle>,
        notifications: Arc<dyn NotificationBus>,
    ) -> Self {
        let cache = CoinCache::new(base);
        let active_tip = cache.best_block_hash();
        let max_in_flight = config.max_blocks_in_flight_per_peer;
        Self {
            state: Mutex::new(EngineState {
                index: BlockIndex::new(),
                cache,
                active_tip,
                download: DownloadScheduler::new(max_in_flight),
                stake_modifiers: std::collections::HashMap::new(),
                bodies: std::collections::HashMap::new(),
                undo: std::collections::HashMap::new(),
            }),
            config,
            masternode_oracle,
            notifications,
            clock: Box::new(|| {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs()
            }),
        }
    }

    #[cfg(any(test, feature = "testing"))]
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn active_tip(&self) -> Hash256 {
        self.state.lock().active_tip
    }

    pub fn block_count(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Store a body the engine has already header/body-accepted so later
    /// `activate_best_chain` calls (and disconnects) can retrieve it. A
    /// real node keeps this on disk via `meridian-storage`; the in-memory
    /// map here is this crate's own bookkeeping until that wiring lands.
    pub fn remember_body(&self, block: Block) {
        let hash = block.header.hash();
        self.state.lock().bodies.insert(hash, block);
    }

    /// Stage 1 of the block acceptance pipeline.
    pub fn accept_header(&self, header: &BlockHeader) -> Result<HeaderAcceptance, BlockError> {
        let mut state = self.state.lock();
        let parent = state.index.get(&header.prev_hash).cloned();
        let (parent_height, parent_chain_work, parent_failed) = match &parent {
            Some(entry) => (entry.height, entry.chain_work, entry.is_failed()),
            None if header.prev_hash == Hash256::ZERO => (0, 0, false),
            None => return Err(BlockError::ParentUnknown),
        };

        let context = HeaderContext {
            parent_height,
            parent_chain_work,
            parent_failed,
            expected_target: header.difficulty_target,
            median_time_past: parent.as_ref().map(|e| e.header.timestamp).unwrap_or(0),
            current_time: (self.clock)(),
            block_proof: 1,
        };
        pipeline::accept_header(&mut state.index, header, &context)
    }

    /// Stage 2 of the block acceptance pipeline. Input signatures are
    /// checked in parallel against the current coin view before the
    /// pipeline's own structural checks, so a batch of bad signatures fails
    /// fast without paying for the rest of contextual validation.
    pub fn accept_body(&self, block: &Block) -> Result<(), BlockError> {
        let mut state = self.state.lock();
        let worker_count = self.config.resolved_script_verification_threads();
        crate::script_pool::verify_block_parallel(block, |outpoint| state.cache.get_coin(outpoint), worker_count)?;
        pipeline::accept_body(&mut state.index, block)?;
        let hash = block.header.hash();
        state.index.mark_scripts_valid(&hash);
        state.bodies.insert(hash, block.clone());
        Ok(())
    }

    /// Stage 3: mark a body-accepted block ready for activation.
    pub fn submit(&self, hash: &Hash256) -> Result<(), BlockError> {
        let state = self.state.lock();
        pipeline::submit(&state.index, hash)
    }

    /// Attempt to move the active chain onto the best candidate, yielding
    /// after the configured reorg step budget.
    pub fn activate_best_chain(&self) -> Result<ActivationOutcome, BlockError> {
        let mut state = self.state.lock();
        let EngineState { index, cache, active_tip, bodies, undo, stake_modifiers, .. } = &mut *state;

        let ctx_builder = EngineContextBuilder { index, stake_modifiers, clock: &self.clock };
        let body_store = MapBodyStore(bodies);
        let mut undo_store = MapUndoStore(undo);

        let before = *active_tip;
        let outcome = reorg::activate_best_chain(
            index,
            cache,
            active_tip,
            &body_store,
            &mut undo_store,
            &ctx_builder,
            self.masternode_oracle.as_ref(),
            self.config.enforce_checkpoints,
            self.config.reorg_step_budget,
        )?;

        if *active_tip != before {
            self.notifications.publish(ChainNotification::TipChanged {
                height: index.get(active_tip).map(|e| e.height).unwrap_or(0),
                hash: *active_tip,
            });
        }
        Ok(outcome)
    }

    pub fn invalidate_block(&self, hash: Hash256) {
        let mut state = self.state.lock();
        state.index.mark_failed(hash);
    }

    pub fn reconsider_block(&self, hash: Hash256) {
        let mut state = self.state.lock();
        state.index.reconsider(hash);
    }

    pub fn download_scheduler(&self) -> parking_lot::MappedMutexGuard<'_, DownloadScheduler> {
        parking_lot::MutexGuard::map(self.state.lock(), |s| &mut s.download)
    }
}

struct MapBodyStore<'a>(&'a std::collections::HashMap<Hash256, Block>);
impl BlockBodyStore for MapBodyStore<'_> {
    fn get_block(&self, hash: &Hash256) -> Option<Block> {
        self.0.get(hash).cloned()
    }
}

struct MapUndoStore<'a>(&'a mut std::collections::HashMap<Hash256, BlockUndo>);
impl UndoStore for MapUndoStore<'_> {
    fn get_undo(&self, hash: &Hash256) -> Option<BlockUndo> {
        self.0.get(hash).cloned()
    }
    fn put_undo(&mut self, hash: Hash256, undo: BlockUndo) {
        self.0.insert(hash, undo);
    }
}

/// Builds [`BlockContext`] for a candidate block from its index entry and a
/// rolling stake-modifier cache. Each lookup treats the candidate block
/// itself as the sole entrant past the selection window closed by its
/// parent, rather than replaying the full multi-section window kept in
/// [`pos_kernel::stake_modifier_selection_interval`] — a deliberate
/// simplification over the historical algorithm's batched rescan, noted in
/// `DESIGN.md`.
struct EngineContextBuilder<'a> {
    index: &'a BlockIndex,
    stake_modifiers: &'a mut std::collections::HashMap<Hash256, Hash256>,
    clock: &'a (dyn Fn() -> u64 + Send + Sync),
}

impl ContextBuilder for EngineContextBuilder<'_> {
    fn build(&self, hash: &Hash256) -> Result<BlockContext, BlockError> {
        let entry = self.index.get(hash).ok_or(BlockError::ParentUnknown)?;
        let parent = self.index.get(&entry.header.prev_hash);

        let median_time_past = parent.map(|p| p.header.timestamp).unwrap_or(0);
        let parent_modifier = parent
            .and_then(|p| self.stake_modifiers.get(&p.hash).copied())
            .unwrap_or(Hash256::ZERO);

        // Rotate the modifier using this block itself as the sole selection
        // candidate past the window closed by its parent; `activate_best_chain`
        // persists the result into `stake_modifiers` once the block actually
        // connects.
        let modifier = if let Some(p) = parent {
            let generated = pos_kernel::crosses_modifier_interval(p.header.timestamp, entry.header.timestamp);
            let candidate = pos_kernel::ModifierCandidate {
                timestamp: entry.header.timestamp,
                hash: entry.hash,
                generated_modifier: generated,
                modifier: if generated {
                    pos_kernel::next_stake_modifier(parent_modifier, entry.hash)
                } else {
                    parent_modifier
                },
            };
            pos_kernel::select_modifier_block(p.header.timestamp, &[candidate]).unwrap_or(parent_modifier)
        } else {
            Hash256::ZERO
        };

        let lottery_candidates = parent.map(|p| p.lottery_candidates.clone()).unwrap_or_default();
        let last_lottery_block_hash = self.last_lottery_block_hash(entry.header.prev_hash);

        Ok(BlockContext {
            height: entry.height,
            prev_hash: entry.header.prev_hash,
            median_time_past,
            current_time: (self.clock)(),
            expected_target: entry.header.difficulty_target,
            stake_modifier: modifier,
            accumulated_cycle_subsidy: 0,
            lottery_candidates,
            last_lottery_block_hash,
        })
    }
}

impl EngineContextBuilder<'_> {
    /// Walk back from `from` to the nearest ancestor at a lottery height, or
    /// [`Hash256::ZERO`] if the chain hasn't reached one yet.
    fn last_lottery_block_hash(&self, from: Hash256) -> Hash256 {
        let mut current = from;
        while let Some(entry) = self.index.get(&current) {
            if subsidy::is_lottery_height(entry.height) {
                return entry.hash;
            }
            current = entry.header.prev_hash;
        }
        Hash256::ZERO
    }
}
