//! Layered unspent-output cache.
//!
//! Three layers compose through the same [`CoinViewBacking`] seam: the
//! on-disk `Base` (backed by `meridian-storage`), an in-memory `Cache` held
//! by the connected chain tip, and a short-lived `Transient` view the
//! mempool or block-template builder opens on top of the tip's cache to try
//! out a batch of spends without ever touching the real cache. Each layer
//! only materializes the coins it actually reads or writes; everything
//! else falls through to the layer beneath it until it reaches storage.
//!
//! Every cached entry carries two bits: `dirty` (the cached value disagrees
//! with the backing layer and must be written on flush) and `fresh` (the
//! backing layer has no entry for this outpoint at all, so a local spend
//! can simply drop the cache entry instead of writing a tombstone).

use std::collections::HashMap;

use crate::error::ChainStateError;
use crate::types::{Coin, Hash256, OutPoint};

/// Read access to whatever sits beneath a [`CoinCache`] layer: on-disk
/// storage for the base layer, or another `CoinCache` for a stacked one.
pub trait CoinViewBacking {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin>;
    fn best_block_hash(&self) -> Hash256;

    fn has_coin(&self, outpoint: &OutPoint) -> bool {
        self.get_coin(outpoint).is_some()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    /// `None` means the outpoint is known-spent at this layer (a tombstone
    /// over a coin the backing layer still has).
    coin: Option<Coin>,
    dirty: bool,
    fresh: bool,
}

impl CacheEntry {
    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

/// An in-memory overlay over a [`CoinViewBacking`] layer.
#[derive(Debug)]
pub struct CoinCache<B> {
    backing: B,
    cache: HashMap<OutPoint, CacheEntry>,
    best_block: Hash256,
}

impl<B: CoinViewBacking> CoinCache<B> {
    pub fn new(backing: B) -> Self {
        let best_block = backing.best_block_hash();
        Self { backing, cache: HashMap::new(), best_block }
    }

    pub fn best_block_hash(&self) -> Hash256 {
        self.best_block
    }

    pub fn set_best_block_hash(&mut self, hash: Hash256) {
        self.best_block = hash;
    }

    pub fn into_backing(self) -> B {
        self.backing
    }

    /// Look up a coin, checking the cache before falling through to the
    /// backing layer. Does not populate the cache — use
    /// [`Self::access_coin`] when the caller intends to mutate it next.
    pub fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        match self.cache.get(outpoint) {
            Some(entry) => entry.coin.clone(),
            None => self.backing.get_coin(outpoint),
        }
    }

    pub fn has_coin(&self, outpoint: &OutPoint) -> bool {
        self.get_coin(outpoint).is_some()
    }

    /// Pull a coin into the cache (clean, non-dirty) so later spends on the
    /// same outpoint within this batch avoid a second backing-layer lookup.
    fn ensure_cached(&mut self, outpoint: &OutPoint) {
        if self.cache.contains_key(outpoint) {
            return;
        }
        let coin = self.backing.get_coin(outpoint);
        self.cache.insert(
            *outpoint,
            CacheEntry { coin, dirty: false, fresh: false },
        );
    }

    pub fn access_coin(&mut self, outpoint: &OutPoint) -> Option<&Coin> {
        self.ensure_cached(outpoint);
        self.cache.get(outpoint).and_then(|e| e.coin.as_ref())
    }

    /// Record a new unspent coin (block connection, or undo of a spend
    /// during disconnection). `overwrite` permits replacing an existing
    /// live entry, needed only when replaying undo data for a coinbase
    /// whose original output was already pruned.
    pub fn add_coin(
        &mut self,
        outpoint: OutPoint,
        coin: Coin,
        overwrite: bool,
    ) -> Result<(), ChainStateError> {
        let existed_live = self.get_coin(&outpoint).is_some();
        if existed_live && !overwrite {
            return Err(ChainStateError::DuplicateBlock(format!(
                "coin already exists at {outpoint}"
            )));
        }

        let fresh = !existed_live && !self.backing.has_coin(&outpoint);
        self.cache.insert(outpoint, CacheEntry { coin: Some(coin), dirty: true, fresh });
        Ok(())
    }

    /// Mark a coin spent, returning the coin so the caller can build undo
    /// data for a future disconnect. A `fresh` cache entry (never seen by
    /// the backing layer) is dropped outright rather than tombstoned.
    pub fn spend_coin(&mut self, outpoint: &OutPoint) -> Option<Coin> {
        self.ensure_cached(outpoint);
        let entry = self.cache.get(outpoint)?;
        let spent = entry.coin.clone()?;

        if entry.fresh {
            self.cache.remove(outpoint);
        } else {
            self.cache.insert(*outpoint, CacheEntry { coin: None, dirty: true, fresh: false });
        }
        Some(spent)
    }

    pub fn cached_entry_count(&self) -> usize {
        self.cache.len()
    }

    /// Approximate heap footprint of the dirty working set, used by the
    /// node to decide when to flush before the cache grows past its
    /// configured budget.
    pub fn dynamic_memory_usage(&self) -> usize {
        self.cache.values().map(CacheEntry::memory_usage).sum()
    }
}

/// Sink a [`CoinCache`] can flush its dirty entries into. Implemented by
/// `meridian-storage`'s on-disk coin database, and trivially by another
/// `CoinCache` layer for stacking a transient view over the tip's cache.
pub trait CoinViewWrite {
    fn write_coin(&mut self, outpoint: OutPoint, coin: Option<Coin>);
    fn set_best_block_hash(&mut self, hash: Hash256);
}

impl<B: CoinViewBacking> CoinViewWrite for CoinCache<B> {
    fn write_coin(&mut self, outpoint: OutPoint, coin: Option<Coin>) {
        match coin {
            Some(coin) => {
                let fresh = !self.backing.has_coin(&outpoint);
                self.cache.insert(outpoint, CacheEntry { coin: Some(coin), dirty: true, fresh });
            }
            None => {
                if self.backing.has_coin(&outpoint) {
                    self.cache.insert(outpoint, CacheEntry { coin: None, dirty: true, fresh: false });
                } else {
                    self.cache.remove(&outpoint);
                }
            }
        }
    }

    fn set_best_block_hash(&mut self, hash: Hash256) {
        self.best_block = hash;
    }
}

impl<B: CoinViewBacking> CoinCache<B> {
    /// Push every dirty entry down into `sink` and clear the local cache.
    /// `fresh`-spent entries (never seen below) are simply dropped rather
    /// than written as tombstones.
    pub fn flush(&mut self, sink: &mut impl CoinViewWrite) {
        for (outpoint, entry) in self.cache.drain() {
            if !entry.dirty {
                continue;
            }
            if entry.fresh && entry.coin.is_none() {
                continue;
            }
            sink.write_coin(outpoint, entry.coin);
        }
        sink.set_best_block_hash(self.best_block);
    }
}

impl<B: CoinViewBacking> CoinViewBacking for CoinCache<B> {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        CoinCache::get_coin(self, outpoint)
    }

    fn best_block_hash(&self) -> Hash256 {
        self.best_block
    }
}
