//! In-memory block index: the arena of known block headers and their
//! validation status, plus the candidate-tip set the chain tip manager
//! selects from.
//!
//! Every header ever received, valid or not, gets an entry here so the
//! engine never re-downloads or re-validates the same block twice. Entries
//! are never removed; a block that turns out invalid is marked `FAILED`
//! (or `FAILED_PARENT` if the failure was inherited) and stays in the arena
//! as a tombstone so peers that keep offering it are rejected immediately.

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;

use crate::lottery::LotteryCoinstakeData;
use crate::types::{BlockHeader, Hash256};

bitflags! {
    /// Validation status of a block index entry, as independent bits rather
    /// than one linear stage. `SCRIPTS_VALID` in particular tracks separately
    /// from `CHAIN_VALID`: input signatures are checked against the coin view
    /// as soon as a body arrives, ahead of (and independent from) the full
    /// contextual connect that only runs once a block is on the path to the
    /// active tip. A block only ever gains bits, never loses `HEADER_VALID`,
    /// `TRANSACTIONS_RECEIVED`, `CHAIN_VALID`, or `SCRIPTS_VALID` once set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlockStatus: u8 {
        /// Header received and structurally sound; the body has not arrived yet.
        const HEADER_VALID = 1 << 0;
        /// Full block body received and structurally validated.
        const TRANSACTIONS_RECEIVED = 1 << 1;
        /// Contextual chain-state validation passed; connectable if the
        /// parent is valid.
        const CHAIN_VALID = 1 << 2;
        /// Input signatures verified against the coin view.
        const SCRIPTS_VALID = 1 << 3;
        /// Failed validation itself.
        const FAILED = 1 << 4;
        /// Never itself checked, but an ancestor is `FAILED`.
        const FAILED_PARENT = 1 << 5;
    }
}

/// One node in the block index arena.
#[derive(Debug, Clone)]
pub struct Entry {
    pub header: BlockHeader,
    pub hash: Hash256,
    pub height: u64,
    pub status: BlockStatus,
    /// Cumulative proof score of the chain ending at this block, used to
    /// pick the best tip among several chains of equal height.
    pub chain_work: u128,
    /// Monotonically increasing order of arrival at this node. Breaks
    /// `chain_work` ties by earliest-seen rather than by hash, so every
    /// honest node that has observed the same blocks in the same order
    /// converges on the same tip even when an adversary mines two
    /// equal-work blocks and only the arrival order differs node to node.
    pub sequence_id: u64,
    /// Whether this entry's stake modifier was freshly generated here (the
    /// selection window closed on it) rather than carried forward from an
    /// ancestor entry.
    pub generated_stake_modifier: bool,
    /// Stake modifier in effect once this block is the tip. Shares
    /// [`Hash256`] with every other modifier-typed value in
    /// [`crate::pos_kernel`] and [`crate::block_validation::BlockContext`]
    /// rather than the historical 64-bit width, so a lookup never needs a
    /// second representation of the same quantity.
    pub stake_modifier: Hash256,
    /// Location of the block body on disk, once written: `(file_number, offset)`.
    pub body_location: Option<(u32, u64)>,
    /// Location of this block's undo data on disk, once written.
    pub undo_location: Option<(u32, u64)>,
    /// Lottery coinstakes accumulated since the last lottery payout up to
    /// and including this block's own coinstake (if it has one). Carried
    /// entry-to-entry so a reorg never needs to rescan a whole cycle to
    /// recover the running candidate window.
    pub lottery_candidates: Vec<LotteryCoinstakeData>,
}

impl Entry {
    pub fn is_valid(&self) -> bool {
        self.status.contains(BlockStatus::CHAIN_VALID)
    }

    pub fn is_failed(&self) -> bool {
        self.status.intersects(BlockStatus::FAILED | BlockStatus::FAILED_PARENT)
    }

    /// Tie-break key used to rank candidate tips of equal `chain_work`:
    /// earliest-arrival (lowest `sequence_id`) wins, so observers that saw
    /// the same blocks in the same order always agree on the active tip.
    fn tie_break_key(&self) -> (u128, std::cmp::Reverse<u64>) {
        (self.chain_work, std::cmp::Reverse(self.sequence_id))
    }
}

/// The block index arena: every known header, keyed by hash, plus the set
/// of blocks eligible to be considered as the active tip.
#[derive(Debug, Default)]
pub struct BlockIndex {
    entries: HashMap<Hash256, Entry>,
    /// Hashes with data available back to genesis and no known failure —
    /// candidates the chain tip manager picks the best-work entry from.
    /// Bitcoin Core calls the same set `setBlockIndexCandidates` and gates
    /// membership on `HaveTxsDownloaded()`, not on contextual validity, so a
    /// freshly body-received block is discoverable before it is ever
    /// connected.
    candidates: HashSet<Hash256>,
    next_sequence_id: u64,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self { entries: HashMap::new(), candidates: HashSet::new(), next_sequence_id: 0 }
    }

    /// Insert a freshly received header, or return the existing entry for
    /// a hash already known. `parent_work` is the chain work accumulated by
    /// the parent block index entry (zero for a first insertion of the
    /// genesis header).
    pub fn insert_or_get(
        &mut self,
        header: BlockHeader,
        height: u64,
        parent_work: u128,
        block_proof: u128,
    ) -> &Entry {
        let hash = header.hash();
        if !self.entries.contains_key(&hash) {
            let sequence_id = self.next_sequence_id;
            self.next_sequence_id += 1;
            self.entries.insert(
                hash,
                Entry {
                    header,
                    hash,
                    height,
                    status: BlockStatus::HEADER_VALID,
                    chain_work: parent_work + block_proof,
                    sequence_id,
                    generated_stake_modifier: false,
                    stake_modifier: Hash256::ZERO,
                    body_location: None,
                    undo_location: None,
                    lottery_candidates: Vec::new(),
                },
            );
        }
        self.entries.get(&hash).expect("just inserted")
    }

    pub fn get(&self, hash: &Hash256) -> Option<&Entry> {
        self.entries.get(hash)
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.entries.contains_key(hash)
    }

    /// Whether `hash` and every ancestor back to genesis has
    /// `TRANSACTIONS_RECEIVED` set and no failure — the data-availability
    /// condition that gates candidacy, independent of whether the chain has
    /// actually been contextually validated yet.
    fn has_data_to_genesis(&self, hash: Hash256) -> bool {
        let mut current = hash;
        loop {
            let Some(entry) = self.entries.get(&current) else {
                return current == Hash256::ZERO;
            };
            if entry.is_failed() || !entry.status.contains(BlockStatus::TRANSACTIONS_RECEIVED) {
                return false;
            }
            if entry.header.prev_hash == Hash256::ZERO {
                return true;
            }
            current = entry.header.prev_hash;
        }
    }

    /// Mark a known header as having received its full, structurally valid
    /// transaction body, folding `lottery_candidate` (this block's own
    /// coinstake, if any) into the running lottery window carried from its
    /// parent. The window resets right after a lottery-height block, since
    /// that block's payout already consumed everything accumulated before it.
    pub fn mark_transactions_received(&mut self, hash: &Hash256, lottery_candidate: Option<LotteryCoinstakeData>) {
        let Some(entry) = self.entries.get(hash) else { return };
        if entry.is_failed() {
            return;
        }
        let parent_hash = entry.header.prev_hash;
        let parent_was_lottery =
            self.entries.get(&parent_hash).is_some_and(|p| crate::subsidy::is_lottery_height(p.height));
        let mut carried = if parent_was_lottery {
            Vec::new()
        } else {
            self.entries.get(&parent_hash).map(|p| p.lottery_candidates.clone()).unwrap_or_default()
        };
        if let Some(candidate) = lottery_candidate {
            carried.push(candidate);
        }

        let entry = self.entries.get_mut(hash).expect("checked above");
        entry.status.insert(BlockStatus::TRANSACTIONS_RECEIVED);
        entry.lottery_candidates = carried;

        if self.has_data_to_genesis(*hash) {
            self.candidates.insert(*hash);
        }
    }

    /// Record that this block's input signatures verified against the coin
    /// view. Independent of [`Self::mark_valid`] — a block can be
    /// script-checked well before (or without ever reaching) a full
    /// contextual connect.
    pub fn mark_scripts_valid(&mut self, hash: &Hash256) {
        if let Some(entry) = self.entries.get_mut(hash) {
            entry.status.insert(BlockStatus::SCRIPTS_VALID);
        }
    }

    /// Record the stake modifier that takes effect once this block is part
    /// of the active chain.
    pub fn set_stake_modifier(&mut self, hash: &Hash256, modifier: Hash256, generated: bool) {
        if let Some(entry) = self.entries.get_mut(hash) {
            entry.stake_modifier = modifier;
            entry.generated_stake_modifier = generated;
        }
    }

    pub fn set_body_location(&mut self, hash: &Hash256, location: (u32, u64)) {
        if let Some(entry) = self.entries.get_mut(hash) {
            entry.body_location = Some(location);
        }
    }

    pub fn set_undo_location(&mut self, hash: &Hash256, location: (u32, u64)) {
        if let Some(entry) = self.entries.get_mut(hash) {
            entry.undo_location = Some(location);
        }
    }

    /// Mark an entry chain-valid (contextually connected) and enter it into
    /// the candidate set. Also sets `SCRIPTS_VALID`: a block that connected
    /// necessarily had its scripts checked as part of connecting, so callers
    /// that invoke this directly (tests, or a future single-pass connect)
    /// don't need a separate `mark_scripts_valid` call to keep the
    /// "`SCRIPTS_VALID` implies all ancestors `SCRIPTS_VALID`" invariant true.
    pub fn mark_valid(&mut self, hash: &Hash256) {
        if let Some(entry) = self.entries.get_mut(hash) {
            entry.status.insert(BlockStatus::CHAIN_VALID | BlockStatus::SCRIPTS_VALID);
            self.candidates.insert(*hash);
        }
    }

    /// Mark a block (and transitively every descendant already known to the
    /// index) as failed. Direct failure on `hash`, `FailedParent` on every
    /// descendant — mirrors the chain's propagation of a bad ancestor so a
    /// reorg can never walk onto a poisoned branch.
    pub fn mark_failed(&mut self, hash: Hash256) {
        if let Some(entry) = self.entries.get_mut(&hash) {
            entry.status.insert(BlockStatus::FAILED);
        } else {
            return;
        }
        self.candidates.remove(&hash);

        let mut frontier = vec![hash];
        while let Some(parent) = frontier.pop() {
            let children: Vec<Hash256> = self
                .entries
                .values()
                .filter(|e| e.header.prev_hash == parent && !e.is_failed())
                .map(|e| e.hash)
                .collect();
            for child in children {
                if let Some(entry) = self.entries.get_mut(&child) {
                    entry.status.insert(BlockStatus::FAILED_PARENT);
                }
                self.candidates.remove(&child);
                frontier.push(child);
            }
        }
    }

    /// Clear `FailedParent` status on a block and its already-known
    /// descendants after an upstream fix (e.g. a deployment flag was wrong,
    /// or a previously missing ancestor arrived and turned out valid).
    /// Plain `Failed` entries are left untouched — reconsideration only
    /// rescues innocent descendants, never a block that failed itself.
    pub fn reconsider(&mut self, hash: Hash256) {
        let Some(entry) = self.entries.get(&hash) else { return };
        if !entry.status.contains(BlockStatus::FAILED_PARENT) {
            return;
        }
        self.clear_failed_parent(hash);
    }

    fn clear_failed_parent(&mut self, hash: Hash256) {
        if let Some(entry) = self.entries.get_mut(&hash) {
            entry.status.remove(BlockStatus::FAILED_PARENT);
        }
        if self.has_data_to_genesis(hash) {
            self.candidates.insert(hash);
        }

        let mut frontier = vec![hash];
        while let Some(parent) = frontier.pop() {
            let children: Vec<Hash256> = self
                .entries
                .values()
                .filter(|e| e.header.prev_hash == parent && e.status.contains(BlockStatus::FAILED_PARENT))
                .map(|e| e.hash)
                .collect();
            for child in children {
                if let Some(entry) = self.entries.get_mut(&child) {
                    entry.status.remove(BlockStatus::FAILED_PARENT);
                }
                if self.has_data_to_genesis(child) {
                    self.candidates.insert(child);
                }
                frontier.push(child);
            }
        }
    }

    /// Remove from the candidate set any entry whose `chain_work` can no
    /// longer win against `best_work` — called after every tip update so
    /// the set stays small instead of growing with every stale fork tip.
    pub fn prune_candidates(&mut self, best_work: u128) {
        self.candidates.retain(|hash| {
            self.entries.get(hash).is_some_and(|e| e.chain_work >= best_work)
        });
    }

    /// The candidate with the greatest chain work, tie-broken
    /// deterministically. `None` if no candidate exists yet.
    pub fn best_candidate(&self) -> Option<&Entry> {
        self.candidates
            .iter()
            .filter_map(|h| self.entries.get(h))
            .max_by_key(|e| e.tie_break_key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }
}
