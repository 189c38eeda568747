//! Chain state engine tuning parameters.
//!
//! [`ChainEngineConfig`] holds the knobs the engine itself consumes —
//! cache budgets, worker pool sizing, checkpoint enforcement — as opposed
//! to node-level concerns like data directories or sub-index selection,
//! which live in `meridian-storage`'s `StorageConfig`.

/// Tuning parameters for a running [`crate`] chain state engine instance.
#[derive(Debug, Clone)]
pub struct ChainEngineConfig {
    /// Maximum heap bytes the in-memory coin cache may hold before the
    /// engine forces a flush to the base layer.
    pub coin_cache_budget_bytes: usize,
    /// Worker count for the script-verification pool. `0` means "logical
    /// cores minus one, clamped to at least one" — resolved by the caller
    /// at pool construction time, not stored as zero.
    pub script_verification_threads: usize,
    /// Maximum number of blocks a single reorg step processes before
    /// yielding control back to the caller, bounding worst-case latency on
    /// a long reorganization.
    pub reorg_step_budget: usize,
    /// Whether hard-coded checkpoint hashes are enforced. Disabled for
    /// regtest-style local testing, enabled everywhere else.
    pub enforce_checkpoints: bool,
    /// Maximum number of headers accepted per peer message during initial
    /// block download before the block-download scheduler reprioritizes.
    pub max_headers_per_message: usize,
    /// In-flight block request limit per peer.
    pub max_blocks_in_flight_per_peer: usize,
}

impl ChainEngineConfig {
    /// Resolve [`Self::script_verification_threads`] into an actual worker
    /// count: `0` means "logical cores minus one, at least one".
    pub fn resolved_script_verification_threads(&self) -> usize {
        if self.script_verification_threads != 0 {
            return self.script_verification_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1).max(1))
            .unwrap_or(1)
    }
}

impl Default for ChainEngineConfig {
    fn default() -> Self {
        Self {
            coin_cache_budget_bytes: 450 * 1024 * 1024,
            script_verification_threads: 0,
            reorg_step_budget: 2_000,
            enforce_checkpoints: true,
            max_headers_per_message: 2_000,
            max_blocks_in_flight_per_peer: 16,
        }
    }
}
