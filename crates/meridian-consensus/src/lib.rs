//! # meridian-consensus — chain state engine.
//!
//! Owns the block index, the layered coin-view cache, the reorg mediator,
//! and the block acceptance pipeline described in `meridian-core`'s
//! validation and scoring primitives. Everything here runs under the
//! engine's single coarse lock (see [`engine::ChainstateEngine`]); nothing
//! in this crate spawns its own background work beyond the bounded script
//! verification pool.

pub mod checkpoint;
pub mod download;
pub mod engine;
pub mod pipeline;
pub mod reorg;
pub mod script_pool;
pub mod tip;

pub use engine::{ChainstateEngine, CoinDatabase};
