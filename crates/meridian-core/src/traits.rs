//! Collaborator interfaces the chain state engine depends on but does not
//! implement itself.
//!
//! These traits define the seam between the engine and the surrounding node:
//! - [`PeerBlockNotifier`] — tells peers which blocks/headers to relay
//! - [`MempoolSink`] — removes newly-connected/conflicting transactions
//! - [`SporkOracle`] — live feature-flag toggles outside deployment activation
//! - [`MasternodePaymentsOracle`] — current payee rotation for a height
//! - [`ShutdownSignal`] — cooperative cancellation for long validation runs
//! - [`NotificationBus`] — best-tip-changed / block-connected event fan-out

use crate::error::MeridianError;
use crate::types::{Block, BlockHeader, Hash256, Transaction};

/// Announces newly accepted blocks and headers to the peer-to-peer layer.
/// Implemented by the node's network service; the engine never talks to
/// peers directly.
pub trait PeerBlockNotifier: Send + Sync {
    /// A block has been connected to the active chain; relay its header.
    fn announce_new_tip(&self, header: &BlockHeader);

    /// A full block should be relayed to peers that requested it.
    fn announce_block(&self, block: &Block);

    /// Request peers that previously offered `hash` to send the full block.
    fn request_block(&self, hash: &Hash256);
}

/// Keeps the mempool consistent with the active chain.
/// Implemented by the node's transaction pool.
pub trait MempoolSink: Send + Sync {
    /// Remove a transaction that was just mined (or otherwise made invalid).
    fn remove_confirmed(&self, txid: &Hash256);

    /// Re-admit previously confirmed transactions after a reorg disconnects
    /// the block that confirmed them, so they return to the pool rather
    /// than being lost.
    fn resubmit(&self, tx: &Transaction);

    /// Number of transactions currently held. Used for log/metric context.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Soft, operator-controlled feature toggles that sit alongside
/// [`crate::deployment`]'s BIP9-style bit voting but update immediately
/// rather than through a threshold vote — masternode reward schedule
/// tweaks, superblock cadence overrides, emergency validation relaxations.
pub trait SporkOracle: Send + Sync {
    /// Whether the named spork is currently active at `height`.
    fn is_active(&self, spork_name: &str, height: u64) -> bool;

    /// The raw activation height for a spork, if set. `None` means never
    /// activated (default: inactive).
    fn activation_height(&self, spork_name: &str) -> Option<u64>;
}

/// A single masternode payee slot in the rotation used by
/// [`crate::masternode`] to validate the payout output of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayeeSlot {
    pub pubkey_hash: Hash256,
    pub amount: u64,
}

/// Resolves the expected masternode payee for a given height. Implemented
/// by the node's masternode list / payment vote tracker; the engine only
/// consumes the resolved slot, it never maintains the underlying list.
pub trait MasternodePaymentsOracle: Send + Sync {
    /// The payee expected to be paid by the block at `height`, if the
    /// masternode list has enough confirmed entries to select one.
    fn expected_payee(&self, height: u64) -> Option<PayeeSlot>;
}

/// Cooperative cancellation for block/script validation that may run on a
/// scoped-thread script verification worker pool.
pub trait ShutdownSignal: Send + Sync {
    /// Polled between validation steps; workers abort promptly instead of
    /// running a whole block to completion during node shutdown.
    fn is_shutting_down(&self) -> bool;
}

/// Events the engine publishes whenever the active chain tip or connected
/// block set changes, independent of the `PeerBlockNotifier` relay path.
/// Consumers include RPC/ZMQ notification layers external to this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainNotification {
    TipChanged { height: u64, hash: Hash256 },
    BlockConnected { height: u64, hash: Hash256 },
    BlockDisconnected { height: u64, hash: Hash256 },
}

pub trait NotificationBus: Send + Sync {
    fn publish(&self, event: ChainNotification);
}

/// Validates a transaction's signatures against the coins it spends,
/// offloaded to a script-verification worker pool. Kept as a trait (rather
/// than a free function) so the pool can be mocked in tests without
/// constructing real keys for every case.
pub trait ScriptVerifier: Send + Sync {
    fn verify_input(&self, tx: &Transaction, input_index: usize) -> Result<(), MeridianError>;
}
