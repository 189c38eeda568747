//! Block acceptance pipeline: the three-stage intake an inbound block goes
//! through before it's handed to the reorg mediator.
//!
//! 1. [`accept_header`] — context-free then contextual header checks,
//!    inserted into the block index on success.
//! 2. [`accept_body`] — context-free block checks against the full body.
//! 3. [`submit`] — enqueues the accepted body for
//!    [`crate::reorg::activate_best_chain`].
//!
//! A second submission of an already-known hash is a no-op once
//! header-accept has run for it — callers check [`BlockIndex::contains`]
//! before doing any of this work.

use meridian_core::block_index::{BlockIndex, BlockStatus};
use meridian_core::block_validation;
use meridian_core::constants::MAX_FUTURE_BLOCK_TIME;
use meridian_core::error::BlockError;
use meridian_core::lottery;
use meridian_core::types::{Block, BlockHeader, Hash256};

/// Outcome of [`accept_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderAcceptance {
    /// Freshly inserted, now tracked as `HeaderOnly`.
    Accepted { height: u64 },
    /// Already known; no-op.
    AlreadyKnown,
}

/// Context needed to validate a header before its body has arrived:
/// whatever the chain tip manager already knows about the parent.
#[derive(Debug, Clone, Copy)]
pub struct HeaderContext {
    pub parent_height: u64,
    pub parent_chain_work: u128,
    pub parent_failed: bool,
    pub expected_target: u64,
    pub median_time_past: u64,
    pub current_time: u64,
    pub block_proof: u128,
}

/// Stage 1: context-free and contextual header checks, then insertion into
/// the block index.
pub fn accept_header(
    index: &mut BlockIndex,
    header: &BlockHeader,
    context: &HeaderContext,
) -> Result<HeaderAcceptance, BlockError> {
    let hash = header.hash();
    if index.contains(&hash) {
        return Ok(HeaderAcceptance::AlreadyKnown);
    }

    if !index.contains(&header.prev_hash) && header.prev_hash != Hash256::ZERO {
        return Err(BlockError::ParentUnknown);
    }
    if context.parent_failed {
        return Err(BlockError::FailedParent);
    }
    if header.timestamp <= context.median_time_past {
        return Err(BlockError::TimestampNotAfterMedian {
            got: header.timestamp,
            mtp: context.median_time_past,
        });
    }
    let limit = context.current_time + MAX_FUTURE_BLOCK_TIME;
    if header.timestamp > limit {
        return Err(BlockError::TimestampTooFarInFuture { got: header.timestamp, limit });
    }
    if header.difficulty_target != context.expected_target {
        return Err(BlockError::InvalidDifficulty {
            got: header.difficulty_target,
            expected: context.expected_target,
        });
    }

    let height = context.parent_height + 1;
    index.insert_or_get(header.clone(), height, context.parent_chain_work, context.block_proof);
    Ok(HeaderAcceptance::Accepted { height })
}

/// Stage 2: context-free checks against the full block body. Marks the
/// entry `TRANSACTIONS_RECEIVED` on success, folding this block's coinstake
/// (if any) into the running lottery window; callers persist the body to
/// disk themselves (storage-layer concern, not validated here).
pub fn accept_body(index: &mut BlockIndex, block: &Block) -> Result<(), BlockError> {
    let hash = block.header.hash();
    if !index.contains(&hash) {
        return Err(BlockError::ParentUnknown);
    }
    block_validation::validate_block_structure(block)?;
    index.mark_transactions_received(&hash, lottery::candidate_from_block(block));
    Ok(())
}

/// Stage 3: marker that a body-accepted block is ready for the reorg
/// mediator. The pipeline itself holds no queue — `submit` just asserts the
/// entry is in the right state and returns its hash so the caller can push
/// it onto whatever work queue feeds `activate_best_chain`.
pub fn submit(index: &BlockIndex, hash: &Hash256) -> Result<(), BlockError> {
    match index.get(hash) {
        Some(entry) if entry.status.contains(BlockStatus::TRANSACTIONS_RECEIVED) => Ok(()),
        Some(_) => Err(BlockError::ParentUnknown),
        None => Err(BlockError::ParentUnknown),
    }
}
