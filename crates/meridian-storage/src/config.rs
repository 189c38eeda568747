//! On-disk layout and CLI-surface configuration for a node's storage layer.
//!
//! Holds the knobs a node sets once at startup — data directory, which
//! optional sub-indexes to maintain, whether to reindex from the block
//! files on disk — and never touches network, RPC, or wallet concerns,
//! which live outside this crate entirely.

use std::path::PathBuf;

use crate::index_db::IndexFlags;

/// Default size, in bytes, a block file grows to before a node rolls over
/// to the next numbered file.
pub const DEFAULT_MAX_BLOCK_FILE_SIZE: u64 = 128 * 1024 * 1024;

/// Storage-layer configuration for a node instance, populated from CLI
/// flags (`-datadir`, `-reindex`, `-reindex-chainstate`, `-addressindex`,
/// `-spentindex`, `-txindex`, `-par`, `-loglevel`) at startup.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// Rebuild the block index database from the block files on disk.
    pub reindex: bool,
    /// Rebuild only the coin database, replaying from the block index.
    pub reindex_chainstate: bool,
    /// Maintain the address index (`-addressindex`).
    pub address_index: bool,
    /// Maintain the spent index (`-spentindex`).
    pub spent_index: bool,
    /// Maintain the transaction-location index (`-txindex`).
    pub tx_index: bool,
    /// Number of script verification worker threads (`-par`); `0` lets the
    /// engine pick based on available parallelism.
    pub script_verification_threads: usize,
    /// Log level filter string (e.g. "info", "debug", "meridian_node=trace").
    pub log_level: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("meridian");

        Self {
            data_dir,
            reindex: false,
            reindex_chainstate: false,
            address_index: false,
            spent_index: false,
            tx_index: false,
            script_verification_threads: 0,
            log_level: "info".to_string(),
        }
    }
}

impl StorageConfig {
    /// Path to the RocksDB coin database.
    pub fn coin_db_path(&self) -> PathBuf {
        self.data_dir.join("chainstate")
    }

    /// Path to the RocksDB block index database.
    pub fn index_db_path(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    /// Path to the flat-file block and undo store.
    pub fn blocks_dir(&self) -> PathBuf {
        self.data_dir.join("blocks")
    }

    pub fn index_flags(&self) -> IndexFlags {
        IndexFlags {
            address_index: self.address_index,
            spent_index: self.spent_index,
            tx_index: self.tx_index,
        }
    }
}
