//! Block subsidy schedule and superblock payout policy.
//!
//! The base subsidy follows a halving schedule identical in shape to
//! Bitcoin's; it is then split between the block's miner/staker and the
//! masternode tier. Every [`UNIFIED_CYCLE_BLOCKS`] blocks, a superblock also
//! carries a treasury and charity payout funded from the accumulated
//! subsidy of the cycle.
//!
//! Before [`UNIFIED_CYCLE_START_HEIGHT`], treasury and lottery payouts ran on
//! two separate legacy cycles (`LEGACY_TREASURY_CYCLE_BLOCKS`,
//! `LEGACY_LOTTERY_CYCLE_BLOCKS`); after it, a single unified cycle governs
//! both — see `DESIGN.md` for the rationale behind the merge height.

use crate::constants::{
    BPS_PRECISION, CHARITY_SHARE_BPS, HALVING_INTERVAL, INITIAL_REWARD, LEGACY_LOTTERY_CYCLE_BLOCKS,
    LEGACY_LOTTERY_START_HEIGHT, LEGACY_TREASURY_CYCLE_BLOCKS, LEGACY_TREASURY_START_HEIGHT,
    MASTERNODE_SHARE_BPS, TREASURY_SHARE_BPS, UNIFIED_CYCLE_BLOCKS, UNIFIED_CYCLE_START_HEIGHT,
};
use crate::error::SubsidyError;

/// The base subsidy (in satoshis) for a block at `height`, before the
/// masternode/treasury/charity split. `INITIAL_REWARD >> (height /
/// HALVING_INTERVAL)`, zero once the shift exhausts it.
pub fn block_reward(height: u64) -> u64 {
    epoch_reward(halving_epoch(height))
}

pub fn epoch_reward(epoch: u64) -> u64 {
    if epoch >= 64 {
        return 0;
    }
    INITIAL_REWARD >> epoch
}

pub fn halving_epoch(height: u64) -> u64 {
    height / HALVING_INTERVAL
}

/// Whether a treasury superblock falls at `height`, on whichever cycle
/// (legacy or unified) governs that height.
pub fn is_treasury_height(height: u64) -> bool {
    if height < LEGACY_TREASURY_START_HEIGHT {
        return false;
    }
    if height < UNIFIED_CYCLE_START_HEIGHT {
        (height - LEGACY_TREASURY_START_HEIGHT) % LEGACY_TREASURY_CYCLE_BLOCKS == 0
    } else {
        (height - UNIFIED_CYCLE_START_HEIGHT) % UNIFIED_CYCLE_BLOCKS == 0
    }
}

/// Whether a lottery (charity) superblock falls at `height`.
pub fn is_lottery_height(height: u64) -> bool {
    if height < LEGACY_LOTTERY_START_HEIGHT {
        return false;
    }
    if height < UNIFIED_CYCLE_START_HEIGHT {
        (height - LEGACY_LOTTERY_START_HEIGHT) % LEGACY_LOTTERY_CYCLE_BLOCKS == 0
    } else {
        (height - UNIFIED_CYCLE_START_HEIGHT) % UNIFIED_CYCLE_BLOCKS == 0
    }
}

/// A superblock is any height carrying a treasury or lottery payout. After
/// `UNIFIED_CYCLE_START_HEIGHT` the two cycles are identical so this is
/// just one check; before it, either firing independently makes the block
/// a superblock.
pub fn is_superblock_height(height: u64) -> bool {
    is_treasury_height(height) || is_lottery_height(height)
}

/// The full breakdown of a block's subsidy across its payees. `total()`
/// always equals `block_reward(height)` plus any superblock cycle payout —
/// the superblock amounts are additional issuance, not carved out of the
/// base reward, matching the legacy chain's accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsidySplit {
    pub miner: u64,
    pub masternode: u64,
    pub treasury: u64,
    pub charity: u64,
}

impl SubsidySplit {
    pub fn total(&self) -> u64 {
        self.miner + self.masternode + self.treasury + self.charity
    }
}

/// Compute the full subsidy split for a block at `height`, given the
/// accumulated cycle subsidy available for superblock payouts (sum of base
/// subsidies since the last superblock, supplied by the caller from chain
/// state — this module is pure and height-only).
pub fn split_subsidy(height: u64, accumulated_cycle_subsidy: u64) -> SubsidySplit {
    let base = block_reward(height);
    let masternode = base * MASTERNODE_SHARE_BPS / BPS_PRECISION;
    let miner = base - masternode;

    let mut treasury = 0;
    let mut charity = 0;
    if is_treasury_height(height) {
        treasury = accumulated_cycle_subsidy * TREASURY_SHARE_BPS / BPS_PRECISION;
    }
    if is_lottery_height(height) {
        charity = accumulated_cycle_subsidy * CHARITY_SHARE_BPS / BPS_PRECISION;
    }

    SubsidySplit { miner, masternode, treasury, charity }
}

/// Verify a claimed split sums to the expected total for `height`.
pub fn validate_split(
    height: u64,
    accumulated_cycle_subsidy: u64,
    claimed: u64,
) -> Result<(), SubsidyError> {
    let expected = split_subsidy(height, accumulated_cycle_subsidy).total();
    if claimed != expected {
        return Err(SubsidyError::SumMismatch { height, got: claimed, expected });
    }
    Ok(())
}
