//! Fork resolution tests: build two independent candidate chains against
//! the same engine (simulating blocks arriving from different peers) and
//! verify the tip always settles on the heavier one, with the coin view
//! rolled back and replayed correctly across the switch.

use meridian_consensus::reorg::ActivationOutcome;
use meridian_core::genesis;
use meridian_tests::helpers::{pkh, TestEngine};

/// Submits `count` blocks built on top of `parent`, returning the final
/// block's hash. Headers/bodies are accepted but `activate_best_chain` is
/// left to the caller so both forks can be fully staged before resolution.
fn stage_chain(harness: &TestEngine, mut parent: meridian_core::types::Hash256, start_height: u64, count: u64, miner_seed: u8) -> meridian_core::types::Hash256 {
    for i in 0..count {
        let height = start_height + i;
        let timestamp = genesis::GENESIS_TIMESTAMP + height * meridian_core::constants::BLOCK_TIME_SECS + 100 + miner_seed as u64;
        let block = meridian_tests::helpers::make_block(parent, timestamp, height, pkh(miner_seed));
        harness.engine.accept_header(&block.header).unwrap();
        harness.engine.remember_body(block.clone());
        harness.engine.accept_body(&block).unwrap();
        harness.engine.submit(&block.header.hash()).unwrap();
        parent = block.header.hash();
    }
    parent
}

#[test]
fn longer_fork_wins_after_both_are_staged() {
    let harness = TestEngine::new();
    let tip = harness.engine.active_tip();

    // Fork A: 2 blocks.
    let a_tip = stage_chain(&harness, tip, 1, 2, 0xA0);
    harness.engine.activate_best_chain().unwrap();
    assert_eq!(harness.engine.active_tip(), a_tip);

    // Fork B: 3 blocks from the same parent, staged after A has already
    // been activated — the mediator must disconnect A and connect B.
    let b_tip = stage_chain(&harness, tip, 1, 3, 0xB0);
    let outcome = harness.engine.activate_best_chain().unwrap();

    assert_eq!(outcome, ActivationOutcome::Reached);
    assert_eq!(harness.engine.active_tip(), b_tip);
}

#[test]
fn activate_best_chain_is_a_no_op_when_already_at_the_best_candidate() {
    let harness = TestEngine::new();
    harness.mine();
    let tip_before = harness.engine.active_tip();

    let outcome = harness.engine.activate_best_chain().unwrap();
    assert_eq!(outcome, ActivationOutcome::Reached);
    assert_eq!(harness.engine.active_tip(), tip_before);
}

#[test]
fn reorg_preserves_total_block_count_in_the_index() {
    let harness = TestEngine::new();
    let tip = harness.engine.active_tip();

    stage_chain(&harness, tip, 1, 2, 0xC0);
    harness.engine.activate_best_chain().unwrap();
    let count_after_a = harness.engine.block_count();

    stage_chain(&harness, tip, 1, 3, 0xD0);
    harness.engine.activate_best_chain().unwrap();

    // The index keeps both forks' entries; only the active tip moves.
    assert!(harness.engine.block_count() > count_after_a);
}
