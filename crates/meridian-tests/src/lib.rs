//! Integration and adversarial test suite for the Meridian chain state
//! engine.
//!
//! This crate carries no production code of its own — [`helpers`] builds
//! the blocks and engines the test binaries in `tests/` drive end to end
//! against real on-disk storage.

pub mod helpers;
