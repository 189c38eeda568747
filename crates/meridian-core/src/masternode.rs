//! Masternode payout validation.
//!
//! The chain state engine does not track the masternode list itself — that
//! lives outside this crate and is exposed through
//! [`crate::traits::MasternodePaymentsOracle`]. This module only checks
//! that a block's coinbase or coinstake actually pays whatever payee the
//! oracle says is due, once the oracle considers the list populated enough
//! to select one.

use crate::error::BlockError;
use crate::traits::{MasternodePaymentsOracle, PayeeSlot};
use crate::types::{Block, ScriptPubKey};

/// Verify `block` pays the expected masternode payee for `height`, if any
/// is due. Returns `Ok(())` when the oracle reports no payee is owed yet
/// (e.g. too few confirmed masternodes), since the payment requirement
/// only starts once the list can produce a deterministic rotation.
pub fn validate_masternode_payout(
    block: &Block,
    height: u64,
    oracle: &dyn MasternodePaymentsOracle,
) -> Result<(), BlockError> {
    let Some(expected) = oracle.expected_payee(height) else {
        return Ok(());
    };

    if block_pays_slot(block, &expected) {
        Ok(())
    } else {
        Err(BlockError::InvalidMasternodePayee)
    }
}

fn block_pays_slot(block: &Block, slot: &PayeeSlot) -> bool {
    let coinbase_outputs = block.coinbase().into_iter().flat_map(|tx| tx.outputs.iter());
    let coinstake_outputs = block.coinstake().into_iter().flat_map(|tx| tx.outputs.iter());

    coinbase_outputs.chain(coinstake_outputs).any(|output| {
        matches!(output.script_pubkey, ScriptPubKey::StakeVault(hash) if hash == slot.pubkey_hash)
            && output.value >= slot.amount
    })
}
