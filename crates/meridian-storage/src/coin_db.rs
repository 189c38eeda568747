//! RocksDB-backed coin database: the base layer the engine's
//! [`meridian_core::coin_view::CoinCache`] stacks over.
//!
//! Keys are a one-byte type tag plus an encoded key: `'c'` + outpoint for a
//! coin entry, and the bare byte `'B'` for the best-block hash record.
//! Values are the project's bincode-standard encoding, matching the wire
//! format used everywhere else in the workspace.

use std::path::Path;

use rocksdb::{Options, WriteBatch, DB};

use meridian_core::coin_view::{CoinViewBacking, CoinViewWrite};
use meridian_core::error::StorageError;
use meridian_core::types::{Coin, Hash256, OutPoint};

const TAG_COIN: u8 = b'c';
const KEY_BEST_HASH: &[u8] = b"B";

fn coin_key(outpoint: &OutPoint) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 36);
    key.push(TAG_COIN);
    key.extend_from_slice(outpoint.txid.as_bytes());
    key.extend_from_slice(&outpoint.index.to_be_bytes());
    key
}

/// Persistent UTXO set. Every read falls through to RocksDB directly — the
/// in-memory working set lives one layer up, in
/// [`meridian_core::coin_view::CoinCache`].
pub struct CoinDatabase {
    db: DB,
}

impl CoinDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(Self { db })
    }

    pub fn get_coin(&self, outpoint: &OutPoint) -> Result<Option<Coin>, StorageError> {
        let Some(bytes) = self
            .db
            .get(coin_key(outpoint))
            .map_err(|e| StorageError::Io(e.to_string()))?
        else {
            return Ok(None);
        };
        let (coin, _): (Coin, usize) = bincode::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|e| StorageError::Corruption(e.to_string()))?;
        Ok(Some(coin))
    }

    pub fn best_block_hash(&self) -> Result<Hash256, StorageError> {
        let Some(bytes) = self
            .db
            .get(KEY_BEST_HASH)
            .map_err(|e| StorageError::Io(e.to_string()))?
        else {
            return Ok(Hash256::ZERO);
        };
        if bytes.len() != 32 {
            return Err(StorageError::Corruption("besthash record has wrong length".to_string()));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Hash256(hash))
    }

    /// Apply a batch of coin writes and a besthash update atomically. This
    /// is the sink a flushed [`meridian_core::coin_view::CoinCache`] writes
    /// into; every dirty entry lands in one `WriteBatch` so a crash never
    /// leaves the coin set and `besthash` disagreeing.
    pub fn write_batch(
        &self,
        writes: impl IntoIterator<Item = (OutPoint, Option<Coin>)>,
        best_block: Hash256,
    ) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        for (outpoint, coin) in writes {
            let key = coin_key(&outpoint);
            match coin {
                Some(coin) => {
                    let value = bincode::encode_to_vec(&coin, bincode::config::standard())
                        .map_err(|e| StorageError::Corruption(e.to_string()))?;
                    batch.put(key, value);
                }
                None => batch.delete(key),
            }
        }
        batch.put(KEY_BEST_HASH, best_block.as_bytes());
        self.db.write(batch).map_err(|e| StorageError::Io(e.to_string()))
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(|e| StorageError::Io(e.to_string()))
    }
}

/// Bridges [`CoinDatabase`]'s fallible RocksDB reads into the infallible
/// [`CoinViewBacking`] seam. A read error degrades to "coin not found"
/// rather than panicking; callers that need to distinguish corruption from
/// absence should use [`CoinDatabase::get_coin`] directly before wrapping.
impl CoinViewBacking for CoinDatabase {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        CoinDatabase::get_coin(self, outpoint).ok().flatten()
    }

    fn best_block_hash(&self) -> Hash256 {
        CoinDatabase::best_block_hash(self).unwrap_or(Hash256::ZERO)
    }
}

impl CoinViewWrite for CoinDatabase {
    fn write_coin(&mut self, outpoint: OutPoint, coin: Option<Coin>) {
        let best = CoinViewBacking::best_block_hash(self);
        let _ = self.write_batch([(outpoint, coin)], best);
    }

    fn set_best_block_hash(&mut self, hash: Hash256) {
        let _ = self.db.put(KEY_BEST_HASH, hash.as_bytes());
    }
}
