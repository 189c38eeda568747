//! Reorg mediator: walks the active chain to whichever candidate currently
//! has the most chain work, disconnecting and connecting one block at a
//! time through [`crate::tip`].
//!
//! `activate_best_chain` never holds its caller past a bounded number of
//! connected blocks (`step_budget`) so a long reorg can't monopolize the
//! engine's coarse mutex; callers loop until the active tip matches the
//! best candidate.

use std::collections::VecDeque;

use meridian_core::block_index::BlockIndex;
use meridian_core::coin_view::{CoinCache, CoinViewBacking};
use meridian_core::error::{BlockError, ChainStateError};
use meridian_core::traits::MasternodePaymentsOracle;
use meridian_core::types::{Block, Hash256};

use crate::checkpoint;
use crate::tip::{self, BlockUndo};

/// Block bodies the mediator needs to connect a forward step. Implemented
/// by `meridian-storage`'s block-file reader; an in-memory map suffices for
/// tests and for a hint the caller already has in hand.
pub trait BlockBodyStore {
    fn get_block(&self, hash: &Hash256) -> Option<Block>;
}

/// Supplies undo data for disconnect steps and records it for future
/// disconnects of a freshly connected block.
pub trait UndoStore {
    fn get_undo(&self, hash: &Hash256) -> Option<BlockUndo>;
    fn put_undo(&mut self, hash: Hash256, undo: BlockUndo);
}

/// Builds the contextual parameters (expected difficulty/stake target,
/// median-time-past, stake modifier, accumulated cycle subsidy) needed to
/// validate the block at a given index entry. Implemented by the engine
/// facade, which has the ancestor-walking machinery; kept as a trait here
/// so the mediator stays agnostic of how those fields are derived.
pub trait ContextBuilder {
    fn build(&self, hash: &Hash256) -> Result<meridian_core::block_validation::BlockContext, BlockError>;
}

/// Outcome of one `activate_best_chain` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The active tip now matches the best known candidate.
    Reached,
    /// Stopped after the step budget; callers should call again to resume.
    BudgetExhausted,
    /// No candidate exists yet (index has no chain-valid entries).
    NoCandidate,
}

/// Walk back from `active_tip` to the lowest common ancestor with
/// `target`, returning `(disconnect_path, connect_path)` both ordered
/// tip-to-target (caller reverses `connect_path` before walking forward).
pub fn fork_paths(index: &BlockIndex, active_tip: Hash256, target: Hash256) -> (Vec<Hash256>, Vec<Hash256>) {
    let mut disconnect = Vec::new();
    let mut connect = Vec::new();
    let mut a = active_tip;
    let mut b = target;

    let height_of = |h: &Hash256| index.get(h).map(|e| e.height).unwrap_or(0);
    let (mut ha, mut hb) = (height_of(&a), height_of(&b));

    while ha > hb {
        disconnect.push(a);
        a = index.get(&a).map(|e| e.header.prev_hash).unwrap_or(Hash256::ZERO);
        ha = ha.saturating_sub(1);
    }
    while hb > ha {
        connect.push(b);
        b = index.get(&b).map(|e| e.header.prev_hash).unwrap_or(Hash256::ZERO);
        hb = hb.saturating_sub(1);
    }
    while a != b {
        disconnect.push(a);
        connect.push(b);
        a = index.get(&a).map(|e| e.header.prev_hash).unwrap_or(Hash256::ZERO);
        b = index.get(&b).map(|e| e.header.prev_hash).unwrap_or(Hash256::ZERO);
    }

    (disconnect, connect)
}

/// Try to move the active chain onto the current best candidate, yielding
/// after `step_budget` connected blocks.
#[allow(clippy::too_many_arguments)]
pub fn activate_best_chain<B>(
    index: &mut BlockIndex,
    cache: &mut CoinCache<B>,
    active_tip: &mut Hash256,
    bodies: &dyn BlockBodyStore,
    undo_store: &mut dyn UndoStore,
    context_builder: &dyn ContextBuilder,
    masternode_oracle: &dyn MasternodePaymentsOracle,
    enforce_checkpoints: bool,
    step_budget: usize,
) -> Result<ActivationOutcome, BlockError>
where
    B: CoinViewBacking,
{
    let Some(target_entry) = index.best_candidate() else {
        return Ok(ActivationOutcome::NoCandidate);
    };
    let target = target_entry.hash;
    if target == *active_tip {
        return Ok(ActivationOutcome::Reached);
    }

    let (disconnect_path, connect_path) = fork_paths(index, *active_tip, target);

    for hash in &disconnect_path {
        let height = index.get(hash).map(|e| e.height).unwrap_or(0);
        if enforce_checkpoints && checkpoint::is_below_checkpoint(height) {
            return Err(BlockError::FailedParent);
        }
        let Some(block) = bodies.get_block(hash) else {
            return Err(BlockError::ParentUnknown);
        };
        let Some(undo) = undo_store.get_undo(hash) else {
            return Err(BlockError::TransactionError {
                index: 0,
                source: meridian_core::error::TransactionError::Serialization(
                    "missing undo data".to_string(),
                ),
            });
        };
        tip::disconnect(cache, &block, &undo).map_err(map_chain_state_err)?;
        *active_tip = block.header.prev_hash;
    }

    let mut forward: VecDeque<Hash256> = connect_path.into_iter().rev().collect();
    let mut connected = 0usize;
    while let Some(hash) = forward.pop_front() {
        if connected >= step_budget {
            return Ok(ActivationOutcome::BudgetExhausted);
        }
        let Some(block) = bodies.get_block(&hash) else {
            return Err(BlockError::ParentUnknown);
        };
        let Some(entry) = index.get(&hash) else {
            return Err(BlockError::ParentUnknown);
        };
        let height = entry.height;
        if enforce_checkpoints {
            checkpoint::check_checkpoint(height, &hash)?;
        }
        let context = context_builder.build(&hash)?;

        match tip::connect(cache, &block, &context, |_| None, |_| None, masternode_oracle) {
            Ok((_validated, undo)) => {
                undo_store.put_undo(hash, undo);
                index.mark_valid(&hash);
                *active_tip = hash;
                connected += 1;
            }
            Err(err) => {
                index.mark_failed(hash);
                if let Some(best) = index.best_candidate() {
                    index.prune_candidates(best.chain_work);
                }
                return Err(err);
            }
        }
    }

    Ok(ActivationOutcome::Reached)
}

fn map_chain_state_err(err: ChainStateError) -> BlockError {
    match err {
        ChainStateError::UndoDataMissing(h) => BlockError::TransactionError {
            index: 0,
            source: meridian_core::error::TransactionError::Serialization(h),
        },
        other => BlockError::TransactionError {
            index: 0,
            source: meridian_core::error::TransactionError::Serialization(other.to_string()),
        },
    }
}
