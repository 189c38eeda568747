//! Flat-file block and undo storage.
//!
//! Blocks are appended to numbered files as a sequence of records: 4-byte
//! network magic, 4-byte little-endian payload size, then the bincode
//! encoding of the block itself. Undo files mirror the same record framing
//! and additionally trail each record with a 32-byte SHA-256d checksum over
//! the hash of the block the record undoes, concatenated with the payload —
//! catching a torn write or bit-rot before a disconnect ever replays it.
//!
//! Callers are expected to remember `(file_number, offset)` themselves
//! (typically in the block index database) and pass it back in for reads;
//! this module never scans a file to find a record.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use meridian_core::constants::MAGIC_BYTES;
use meridian_core::crypto::sha256d;
use meridian_core::error::StorageError;
use meridian_core::types::{Block, Hash256};

use meridian_consensus::tip::{BlockUndo, TxUndo};

fn block_file_path(dir: &Path, file_number: u32) -> PathBuf {
    dir.join(format!("blk{file_number:05}.dat"))
}

fn undo_file_path(dir: &Path, file_number: u32) -> PathBuf {
    dir.join(format!("rev{file_number:05}.dat"))
}

/// Location of one stored block within the flat-file set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLocation {
    pub file_number: u32,
    pub offset: u64,
}

/// Appends and reads block/undo records across numbered files in a
/// directory, rolling over to a new file once the current one exceeds
/// `max_file_size`.
pub struct BlockFileStore {
    dir: PathBuf,
    max_file_size: u64,
    current_file: u32,
}

impl BlockFileStore {
    pub fn new(dir: impl Into<PathBuf>, max_file_size: u64) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(Self { dir, max_file_size, current_file: 0 })
    }

    fn size_of(&self, path: &Path) -> u64 {
        std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    }

    fn open_append(path: &Path) -> Result<File, StorageError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    /// Append a block, rolling over to a fresh file first if the current one
    /// would exceed `max_file_size`. Returns where it landed.
    pub fn write_block(&mut self, block: &Block) -> Result<FileLocation, StorageError> {
        let payload = bincode::encode_to_vec(block, bincode::config::standard())
            .map_err(|e| StorageError::Corruption(e.to_string()))?;

        let mut path = block_file_path(&self.dir, self.current_file);
        if self.size_of(&path) + payload.len() as u64 + 8 > self.max_file_size {
            self.current_file += 1;
            path = block_file_path(&self.dir, self.current_file);
        }

        let mut file = Self::open_append(&path)?;
        let offset = file.stream_position().map_err(|e| StorageError::Io(e.to_string()))?;
        file.write_all(&MAGIC_BYTES).map_err(|e| StorageError::Io(e.to_string()))?;
        file.write_all(&(payload.len() as u32).to_le_bytes())
            .map_err(|e| StorageError::Io(e.to_string()))?;
        file.write_all(&payload).map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(FileLocation { file_number: self.current_file, offset })
    }

    pub fn read_block(&self, location: FileLocation) -> Result<Block, StorageError> {
        let path = block_file_path(&self.dir, location.file_number);
        let mut file = File::open(&path).map_err(|e| StorageError::Io(e.to_string()))?;
        file.seek(SeekFrom::Start(location.offset)).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).map_err(|e| StorageError::Io(e.to_string()))?;
        if magic != MAGIC_BYTES {
            return Err(StorageError::Corruption(format!(
                "bad magic at {}:{}",
                location.file_number, location.offset
            )));
        }
        let mut size_bytes = [0u8; 4];
        file.read_exact(&mut size_bytes).map_err(|e| StorageError::Io(e.to_string()))?;
        let size = u32::from_le_bytes(size_bytes) as usize;

        let mut payload = vec![0u8; size];
        file.read_exact(&mut payload).map_err(|e| StorageError::Io(e.to_string()))?;

        let (block, _): (Block, usize) = bincode::decode_from_slice(&payload, bincode::config::standard())
            .map_err(|e| StorageError::Corruption(e.to_string()))?;
        Ok(block)
    }

    /// Append undo data for the block at `undone_block_hash`, trailing the
    /// record with a checksum over `undone_block_hash || payload` so a
    /// later read can detect corruption before replaying a disconnect.
    pub fn write_undo(
        &mut self,
        undone_block_hash: Hash256,
        undo: &BlockUndo,
    ) -> Result<FileLocation, StorageError> {
        let payload = encode_undo(undo)?;
        let mut checksum_input = Vec::with_capacity(32 + payload.len());
        checksum_input.extend_from_slice(undone_block_hash.as_bytes());
        checksum_input.extend_from_slice(&payload);
        let checksum = sha256d(&checksum_input);

        let mut path = undo_file_path(&self.dir, self.current_file);
        if self.size_of(&path) + payload.len() as u64 + 8 + 32 > self.max_file_size {
            self.current_file += 1;
            path = undo_file_path(&self.dir, self.current_file);
        }

        let mut file = Self::open_append(&path)?;
        let offset = file.stream_position().map_err(|e| StorageError::Io(e.to_string()))?;
        file.write_all(&MAGIC_BYTES).map_err(|e| StorageError::Io(e.to_string()))?;
        file.write_all(&(payload.len() as u32).to_le_bytes())
            .map_err(|e| StorageError::Io(e.to_string()))?;
        file.write_all(&payload).map_err(|e| StorageError::Io(e.to_string()))?;
        file.write_all(checksum.as_bytes()).map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(FileLocation { file_number: self.current_file, offset })
    }

    pub fn read_undo(
        &self,
        location: FileLocation,
        undone_block_hash: Hash256,
    ) -> Result<BlockUndo, StorageError> {
        let path = undo_file_path(&self.dir, location.file_number);
        let mut file = File::open(&path).map_err(|e| StorageError::Io(e.to_string()))?;
        file.seek(SeekFrom::Start(location.offset)).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).map_err(|e| StorageError::Io(e.to_string()))?;
        if magic != MAGIC_BYTES {
            return Err(StorageError::Corruption(format!(
                "bad magic at {}:{}",
                location.file_number, location.offset
            )));
        }
        let mut size_bytes = [0u8; 4];
        file.read_exact(&mut size_bytes).map_err(|e| StorageError::Io(e.to_string()))?;
        let size = u32::from_le_bytes(size_bytes) as usize;

        let mut payload = vec![0u8; size];
        file.read_exact(&mut payload).map_err(|e| StorageError::Io(e.to_string()))?;
        let mut stored_checksum = [0u8; 32];
        file.read_exact(&mut stored_checksum).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut checksum_input = Vec::with_capacity(32 + payload.len());
        checksum_input.extend_from_slice(undone_block_hash.as_bytes());
        checksum_input.extend_from_slice(&payload);
        if sha256d(&checksum_input).as_bytes() != &stored_checksum {
            return Err(StorageError::ChecksumMismatch { what: format!("undo record at {}:{}", location.file_number, location.offset) });
        }

        decode_undo(&payload)
    }

    /// Walk every record in one numbered block file in order, used by a
    /// reindex to rebuild the block index straight from the flat files
    /// rather than trusting whatever is left in the index database.
    pub fn scan_file(&self, file_number: u32) -> Result<Vec<(FileLocation, Block)>, StorageError> {
        let path = block_file_path(&self.dir, file_number);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e.to_string())),
        };

        let mut records = Vec::new();
        loop {
            let offset = file.stream_position().map_err(|e| StorageError::Io(e.to_string()))?;
            let mut magic = [0u8; 4];
            match file.read_exact(&mut magic) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(StorageError::Io(e.to_string())),
            }
            if magic != MAGIC_BYTES {
                return Err(StorageError::Corruption(format!("bad magic in {}:{offset}", path.display())));
            }
            let mut size_bytes = [0u8; 4];
            file.read_exact(&mut size_bytes).map_err(|e| StorageError::Io(e.to_string()))?;
            let size = u32::from_le_bytes(size_bytes) as usize;

            let mut payload = vec![0u8; size];
            file.read_exact(&mut payload).map_err(|e| StorageError::Io(e.to_string()))?;
            let (block, _): (Block, usize) = bincode::decode_from_slice(&payload, bincode::config::standard())
                .map_err(|e| StorageError::Corruption(e.to_string()))?;
            records.push((FileLocation { file_number, offset }, block));
        }
        Ok(records)
    }

    /// Walk every block across every numbered file in order, stopping at
    /// the first file number that doesn't exist.
    pub fn scan_all_blocks(&self) -> Result<Vec<(FileLocation, Block)>, StorageError> {
        let mut all = Vec::new();
        let mut file_number = 0u32;
        loop {
            let batch = self.scan_file(file_number)?;
            if batch.is_empty() {
                break;
            }
            all.extend(batch);
            file_number += 1;
        }
        Ok(all)
    }
}

fn encode_undo(undo: &BlockUndo) -> Result<Vec<u8>, StorageError> {
    let tx_count = undo.tx_undo.len() as u32;
    let mut buf = tx_count.to_le_bytes().to_vec();
    for tx_undo in &undo.tx_undo {
        let coin_count = tx_undo.spent_coins.len() as u32;
        buf.extend_from_slice(&coin_count.to_le_bytes());
        for coin in &tx_undo.spent_coins {
            let encoded = bincode::encode_to_vec(coin, bincode::config::standard())
                .map_err(|e| StorageError::Corruption(e.to_string()))?;
            buf.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
            buf.extend_from_slice(&encoded);
        }
    }
    Ok(buf)
}

fn decode_undo(bytes: &[u8]) -> Result<BlockUndo, StorageError> {
    let bad = || StorageError::Corruption("truncated undo record".to_string());
    let mut cursor = 0usize;
    let read_u32 = |cursor: &mut usize| -> Result<u32, StorageError> {
        let slice = bytes.get(*cursor..*cursor + 4).ok_or_else(bad)?;
        *cursor += 4;
        Ok(u32::from_le_bytes(slice.try_into().unwrap()))
    };

    let tx_count = read_u32(&mut cursor)?;
    let mut tx_undo = Vec::with_capacity(tx_count as usize);
    for _ in 0..tx_count {
        let coin_count = read_u32(&mut cursor)?;
        let mut spent_coins = Vec::with_capacity(coin_count as usize);
        for _ in 0..coin_count {
            let len = read_u32(&mut cursor)? as usize;
            let slice = bytes.get(cursor..cursor + len).ok_or_else(bad)?;
            cursor += len;
            let (coin, _) = bincode::decode_from_slice(slice, bincode::config::standard())
                .map_err(|e| StorageError::Corruption(e.to_string()))?;
            spent_coins.push(coin);
        }
        tx_undo.push(TxUndo { spent_coins });
    }
    Ok(BlockUndo { tx_undo })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::types::{BlockHeader, ScriptPubKey, Transaction, TxInput, TxOutput};

    fn sample_block(nonce: u8) -> Block {
        let cb = Transaction {
            version: 1,
            inputs: vec![TxInput { previous_output: meridian_core::types::OutPoint::null(), signature: vec![nonce], public_key: vec![] }],
            outputs: vec![TxOutput { value: 50, script_pubkey: ScriptPubKey::PayToPubkeyHash(Hash256::ZERO) }],
            lock_time: 0,
        };
        let merkle = meridian_core::merkle::merkle_root(&[cb.txid().unwrap()]);
        Block {
            header: BlockHeader { version: 1, prev_hash: Hash256::ZERO, merkle_root: merkle, timestamp: 1_700_000_000, difficulty_target: u64::MAX, nonce: 0 },
            transactions: vec![cb],
            block_signature: vec![],
        }
    }

    #[test]
    fn write_then_read_block_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BlockFileStore::new(dir.path(), 16 * 1024 * 1024).unwrap();
        let block = sample_block(1);
        let location = store.write_block(&block).unwrap();
        let read_back = store.read_block(location).unwrap();
        assert_eq!(read_back, block);
    }

    #[test]
    fn write_then_read_undo_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BlockFileStore::new(dir.path(), 16 * 1024 * 1024).unwrap();
        let undo = BlockUndo {
            tx_undo: vec![TxUndo {
                spent_coins: vec![meridian_core::types::Coin {
                    output: TxOutput { value: 10, script_pubkey: ScriptPubKey::PayToPubkeyHash(Hash256::ZERO) },
                    height: 1,
                    is_coinbase: false,
                    is_coinstake: false,
                }],
            }],
        };
        let hash = Hash256([5; 32]);
        let location = store.write_undo(hash, &undo).unwrap();
        let read_back = store.read_undo(location, hash).unwrap();
        assert_eq!(read_back.tx_undo.len(), 1);
        assert_eq!(read_back.tx_undo[0].spent_coins.len(), 1);
    }

    #[test]
    fn read_undo_detects_checksum_mismatch_on_wrong_hash() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BlockFileStore::new(dir.path(), 16 * 1024 * 1024).unwrap();
        let undo = BlockUndo::default();
        let location = store.write_undo(Hash256([1; 32]), &undo).unwrap();
        let err = store.read_undo(location, Hash256([2; 32])).unwrap_err();
        assert!(matches!(err, StorageError::ChecksumMismatch { .. }));
    }

    #[test]
    fn rolls_over_to_new_file_past_size_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BlockFileStore::new(dir.path(), 64).unwrap();
        let first = store.write_block(&sample_block(1)).unwrap();
        let second = store.write_block(&sample_block(2)).unwrap();
        assert!(second.file_number > first.file_number);
    }

    #[test]
    fn scan_all_blocks_recovers_every_record_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BlockFileStore::new(dir.path(), 64).unwrap();
        store.write_block(&sample_block(1)).unwrap();
        store.write_block(&sample_block(2)).unwrap();
        store.write_block(&sample_block(3)).unwrap();

        let recovered = store.scan_all_blocks().unwrap();
        assert_eq!(recovered.len(), 3);
        assert_eq!(recovered[0].1, sample_block(1));
        assert_eq!(recovered[2].1, sample_block(3));
    }

    #[test]
    fn scan_all_blocks_on_empty_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockFileStore::new(dir.path(), 64).unwrap();
        assert!(store.scan_all_blocks().unwrap().is_empty());
    }
}
