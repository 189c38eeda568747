//! Persistent block index: on-disk mirror of
//! [`meridian_core::block_index::BlockIndex`] plus the blockfile-info
//! records and the optional address/spent/tx-location sub-indexes, gated
//! behind the boolean flags a node sets once at startup and never changes
//! without a reindex.
//!
//! Every record — block-index entry, blockfile-info, sub-index entry — is
//! serialized with the same bincode-standard stream used by the coin
//! database, so a single `Options` tuning pass covers the whole database.

use std::path::Path;

use rocksdb::{Options, WriteBatch, DB};

use meridian_core::block_index::{BlockStatus, Entry};
use meridian_core::error::StorageError;
use meridian_core::lottery::LotteryCoinstakeData;
use meridian_core::types::{BlockHeader, Hash256, OutPoint};

const CF_ENTRIES: &str = "block_index_entries";
const CF_FILE_INFO: &str = "block_file_info";
const CF_ADDRESS_INDEX: &str = "address_index";
const CF_SPENT_INDEX: &str = "spent_index";
const CF_TX_INDEX: &str = "tx_index";

const ALL_CFS: &[&str] = &[CF_ENTRIES, CF_FILE_INFO, CF_ADDRESS_INDEX, CF_SPENT_INDEX, CF_TX_INDEX];

/// Which optional sub-indexes a node maintains, fixed at database creation.
/// Flipping one of these on an existing database without a full reindex
/// would leave it permanently incomplete, so the flags are only read from
/// [`IndexDatabase::open`], never changed afterward.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexFlags {
    pub address_index: bool,
    pub spent_index: bool,
    pub tx_index: bool,
}

#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
struct StoredEntry {
    header: StoredHeader,
    height: u64,
    status: u8,
    chain_work_hi: u64,
    chain_work_lo: u64,
    sequence_id: u64,
    generated_stake_modifier: bool,
    stake_modifier: [u8; 32],
    body_location: Option<(u32, u64)>,
    undo_location: Option<(u32, u64)>,
    lottery_candidates: Vec<LotteryCoinstakeData>,
}

#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
struct StoredHeader {
    version: u32,
    prev_hash: [u8; 32],
    merkle_root: [u8; 32],
    timestamp: u64,
    difficulty_target: u64,
    nonce: u64,
}

fn status_to_byte(status: BlockStatus) -> u8 {
    status.bits()
}

fn byte_to_status(byte: u8) -> Result<BlockStatus, StorageError> {
    BlockStatus::from_bits(byte)
        .ok_or_else(|| StorageError::Corruption(format!("unknown block status bits {byte:#04x}")))
}

/// RocksDB-backed persistence for the block index and its optional
/// sub-indexes.
pub struct IndexDatabase {
    db: DB,
    flags: IndexFlags,
}

impl IndexDatabase {
    pub fn open(path: impl AsRef<Path>, flags: IndexFlags) -> Result<Self, StorageError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        let cfs: Vec<_> = ALL_CFS.iter().map(|name| (*name, Options::default())).collect();
        let db = DB::open_cf_with_opts(&db_opts, path.as_ref(), cfs)
            .map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(Self { db, flags })
    }

    pub fn flags(&self) -> IndexFlags {
        self.flags
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::Corruption(format!("missing column family: {name}")))
    }

    pub fn put_entry(&self, hash: Hash256, entry: &Entry) -> Result<(), StorageError> {
        let stored = StoredEntry {
            header: StoredHeader {
                version: entry.header.version,
                prev_hash: *entry.header.prev_hash.as_bytes(),
                merkle_root: *entry.header.merkle_root.as_bytes(),
                timestamp: entry.header.timestamp,
                difficulty_target: entry.header.difficulty_target,
                nonce: entry.header.nonce,
            },
            height: entry.height,
            status: status_to_byte(entry.status),
            chain_work_hi: (entry.chain_work >> 64) as u64,
            chain_work_lo: entry.chain_work as u64,
            sequence_id: entry.sequence_id,
            generated_stake_modifier: entry.generated_stake_modifier,
            stake_modifier: *entry.stake_modifier.as_bytes(),
            body_location: entry.body_location,
            undo_location: entry.undo_location,
            lottery_candidates: entry.lottery_candidates.clone(),
        };
        let bytes = bincode::encode_to_vec(&stored, bincode::config::standard())
            .map_err(|e| StorageError::Corruption(e.to_string()))?;
        self.db
            .put_cf(self.cf(CF_ENTRIES)?, hash.as_bytes(), bytes)
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    pub fn get_entry(&self, hash: &Hash256) -> Result<Option<Entry>, StorageError> {
        let Some(bytes) = self
            .db
            .get_cf(self.cf(CF_ENTRIES)?, hash.as_bytes())
            .map_err(|e| StorageError::Io(e.to_string()))?
        else {
            return Ok(None);
        };
        let (stored, _): (StoredEntry, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| StorageError::Corruption(e.to_string()))?;

        let header = BlockHeader {
            version: stored.header.version,
            prev_hash: Hash256(stored.header.prev_hash),
            merkle_root: Hash256(stored.header.merkle_root),
            timestamp: stored.header.timestamp,
            difficulty_target: stored.header.difficulty_target,
            nonce: stored.header.nonce,
        };
        let chain_work = ((stored.chain_work_hi as u128) << 64) | stored.chain_work_lo as u128;
        let entry = Entry {
            header,
            hash: *hash,
            height: stored.height,
            status: byte_to_status(stored.status)?,
            chain_work,
            sequence_id: stored.sequence_id,
            generated_stake_modifier: stored.generated_stake_modifier,
            stake_modifier: Hash256(stored.stake_modifier),
            body_location: stored.body_location,
            undo_location: stored.undo_location,
            lottery_candidates: stored.lottery_candidates,
        };
        Ok(Some(entry))
    }

    /// Record the outputs an address's coins sit at, gated by
    /// [`IndexFlags::address_index`]. A no-op (not an error) when the flag
    /// is off, so callers don't need to branch on it themselves.
    pub fn index_address(&self, pubkey_hash: &Hash256, outpoint: &OutPoint) -> Result<(), StorageError> {
        if !self.flags.address_index {
            return Ok(());
        }
        let mut key = Vec::with_capacity(32 + 36);
        key.extend_from_slice(pubkey_hash.as_bytes());
        key.extend_from_slice(outpoint.txid.as_bytes());
        key.extend_from_slice(&outpoint.index.to_be_bytes());
        self.db
            .put_cf(self.cf(CF_ADDRESS_INDEX)?, key, [])
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    pub fn outpoints_for_address(&self, pubkey_hash: &Hash256) -> Result<Vec<OutPoint>, StorageError> {
        let cf = self.cf(CF_ADDRESS_INDEX)?;
        let mut out = Vec::new();
        let iter = self.db.prefix_iterator_cf(cf, pubkey_hash.as_bytes());
        for item in iter {
            let (key, _) = item.map_err(|e| StorageError::Io(e.to_string()))?;
            if !key.starts_with(pubkey_hash.as_bytes()) {
                break;
            }
            if key.len() != 68 {
                return Err(StorageError::Corruption("malformed address index key".to_string()));
            }
            let mut txid = [0u8; 32];
            txid.copy_from_slice(&key[32..64]);
            let index = u32::from_be_bytes(key[64..68].try_into().unwrap());
            out.push(OutPoint { txid: Hash256(txid), index });
        }
        Ok(out)
    }

    /// Record that `outpoint` was spent by `spending_txid`, gated by
    /// [`IndexFlags::spent_index`].
    pub fn index_spend(&self, outpoint: &OutPoint, spending_txid: Hash256) -> Result<(), StorageError> {
        if !self.flags.spent_index {
            return Ok(());
        }
        let mut key = Vec::with_capacity(36);
        key.extend_from_slice(outpoint.txid.as_bytes());
        key.extend_from_slice(&outpoint.index.to_be_bytes());
        self.db
            .put_cf(self.cf(CF_SPENT_INDEX)?, key, spending_txid.as_bytes())
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    pub fn spender_of(&self, outpoint: &OutPoint) -> Result<Option<Hash256>, StorageError> {
        let mut key = Vec::with_capacity(36);
        key.extend_from_slice(outpoint.txid.as_bytes());
        key.extend_from_slice(&outpoint.index.to_be_bytes());
        let Some(bytes) = self
            .db
            .get_cf(self.cf(CF_SPENT_INDEX)?, key)
            .map_err(|e| StorageError::Io(e.to_string()))?
        else {
            return Ok(None);
        };
        if bytes.len() != 32 {
            return Err(StorageError::Corruption("malformed spent index value".to_string()));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Some(Hash256(hash)))
    }

    /// Record where a transaction lives (block hash, index within the
    /// block), gated by [`IndexFlags::tx_index`].
    pub fn index_transaction(&self, txid: Hash256, block_hash: Hash256, tx_index: u32) -> Result<(), StorageError> {
        if !self.flags.tx_index {
            return Ok(());
        }
        let mut value = Vec::with_capacity(36);
        value.extend_from_slice(block_hash.as_bytes());
        value.extend_from_slice(&tx_index.to_be_bytes());
        self.db
            .put_cf(self.cf(CF_TX_INDEX)?, txid.as_bytes(), value)
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    pub fn locate_transaction(&self, txid: &Hash256) -> Result<Option<(Hash256, u32)>, StorageError> {
        let Some(bytes) = self
            .db
            .get_cf(self.cf(CF_TX_INDEX)?, txid.as_bytes())
            .map_err(|e| StorageError::Io(e.to_string()))?
        else {
            return Ok(None);
        };
        if bytes.len() != 36 {
            return Err(StorageError::Corruption("malformed tx index value".to_string()));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[0..32]);
        let index = u32::from_be_bytes(bytes[32..36].try_into().unwrap());
        Ok(Some((Hash256(hash), index)))
    }

    /// Track how much of a block file is in use, so the caller can decide
    /// when to roll over — mirrors the blockfile-info record a node keeps
    /// per numbered file.
    pub fn record_file_usage(&self, file_number: u32, bytes_used: u64) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_FILE_INFO)?, file_number.to_be_bytes(), bytes_used.to_le_bytes());
        self.db.write(batch).map_err(|e| StorageError::Io(e.to_string()))
    }

    pub fn file_usage(&self, file_number: u32) -> Result<u64, StorageError> {
        let Some(bytes) = self
            .db
            .get_cf(self.cf(CF_FILE_INFO)?, file_number.to_be_bytes())
            .map_err(|e| StorageError::Io(e.to_string()))?
        else {
            return Ok(0);
        };
        if bytes.len() != 8 {
            return Err(StorageError::Corruption("malformed file-info record".to_string()));
        }
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(height: u64, status: BlockStatus) -> Entry {
        Entry {
            header: BlockHeader {
                version: 1,
                prev_hash: Hash256::ZERO,
                merkle_root: Hash256::ZERO,
                timestamp: 1_700_000_000,
                difficulty_target: u64::MAX,
                nonce: 0,
            },
            hash: Hash256([9; 32]),
            height,
            status,
            chain_work: (1u128 << 70) + 5,
            sequence_id: 3,
            generated_stake_modifier: true,
            stake_modifier: Hash256([6; 32]),
            body_location: Some((2, 128)),
            undo_location: Some((2, 256)),
            lottery_candidates: vec![LotteryCoinstakeData {
                coinstake_txid: Hash256([1; 32]),
                payee: meridian_core::types::ScriptPubKey::PayToPubkeyHash(Hash256([2; 32])),
            }],
        }
    }

    #[test]
    fn entry_round_trips_including_high_chain_work() {
        let dir = tempfile::tempdir().unwrap();
        let db = IndexDatabase::open(dir.path(), IndexFlags::default()).unwrap();
        let hash = Hash256([9; 32]);
        let entry = sample_entry(5, BlockStatus::CHAIN_VALID);
        db.put_entry(hash, &entry).unwrap();

        let read_back = db.get_entry(&hash).unwrap().unwrap();
        assert_eq!(read_back.height, 5);
        assert_eq!(read_back.status, BlockStatus::CHAIN_VALID);
        assert_eq!(read_back.chain_work, entry.chain_work);
        assert_eq!(read_back.sequence_id, 3);
        assert!(read_back.generated_stake_modifier);
        assert_eq!(read_back.stake_modifier, Hash256([6; 32]));
        assert_eq!(read_back.body_location, Some((2, 128)));
        assert_eq!(read_back.undo_location, Some((2, 256)));
        assert_eq!(read_back.lottery_candidates, entry.lottery_candidates);
    }

    #[test]
    fn missing_entry_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let db = IndexDatabase::open(dir.path(), IndexFlags::default()).unwrap();
        assert!(db.get_entry(&Hash256([1; 32])).unwrap().is_none());
    }

    #[test]
    fn address_index_disabled_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let db = IndexDatabase::open(dir.path(), IndexFlags::default()).unwrap();
        let pubkey_hash = Hash256([3; 32]);
        let outpoint = OutPoint { txid: Hash256([4; 32]), index: 0 };
        db.index_address(&pubkey_hash, &outpoint).unwrap();
        assert!(db.outpoints_for_address(&pubkey_hash).unwrap().is_empty());
    }

    #[test]
    fn address_index_tracks_outpoints_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let flags = IndexFlags { address_index: true, ..IndexFlags::default() };
        let db = IndexDatabase::open(dir.path(), flags).unwrap();
        let pubkey_hash = Hash256([3; 32]);
        let outpoint = OutPoint { txid: Hash256([4; 32]), index: 2 };
        db.index_address(&pubkey_hash, &outpoint).unwrap();
        assert_eq!(db.outpoints_for_address(&pubkey_hash).unwrap(), vec![outpoint]);
    }

    #[test]
    fn spent_index_round_trips_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let flags = IndexFlags { spent_index: true, ..IndexFlags::default() };
        let db = IndexDatabase::open(dir.path(), flags).unwrap();
        let outpoint = OutPoint { txid: Hash256([1; 32]), index: 0 };
        let spender = Hash256([2; 32]);
        db.index_spend(&outpoint, spender).unwrap();
        assert_eq!(db.spender_of(&outpoint).unwrap(), Some(spender));
    }

    #[test]
    fn tx_index_round_trips_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let flags = IndexFlags { tx_index: true, ..IndexFlags::default() };
        let db = IndexDatabase::open(dir.path(), flags).unwrap();
        let txid = Hash256([7; 32]);
        let block_hash = Hash256([8; 32]);
        db.index_transaction(txid, block_hash, 3).unwrap();
        assert_eq!(db.locate_transaction(&txid).unwrap(), Some((block_hash, 3)));
    }

    #[test]
    fn file_usage_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let db = IndexDatabase::open(dir.path(), IndexFlags::default()).unwrap();
        assert_eq!(db.file_usage(0).unwrap(), 0);
        db.record_file_usage(0, 4096).unwrap();
        assert_eq!(db.file_usage(0).unwrap(), 4096);
    }
}
