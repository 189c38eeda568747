//! # meridian-storage — on-disk persistence for the chain state engine.
//!
//! - [`coin_db::CoinDatabase`] — RocksDB-backed UTXO set, the base layer a
//!   [`meridian_core::coin_view::CoinCache`] stacks over.
//! - [`block_files::BlockFileStore`] — flat-file block and undo storage.
//! - [`index_db::IndexDatabase`] — block index, blockfile-info, and the
//!   optional address/spent/tx-location sub-indexes.
//! - [`config::StorageConfig`] — on-disk layout and CLI-surface flags.
//!
//! Network, RPC, and wallet orchestration live outside this crate; it only
//! ever touches the filesystem and RocksDB.

pub mod block_files;
pub mod coin_db;
pub mod config;
pub mod index_db;

pub use block_files::{BlockFileStore, FileLocation};
pub use coin_db::CoinDatabase;
pub use config::StorageConfig;
pub use index_db::{IndexDatabase, IndexFlags};
