//! Transaction validation.
//!
//! Two levels:
//!
//! - **Structural** ([`validate_transaction_structure`]): context-free
//!   checks on format and internal consistency. No external state needed.
//! - **Contextual** ([`validate_transaction`]): coin-view-aware checks
//!   including signature verification, coin maturity, and value
//!   conservation.
//!
//! Coinbase and coinstake transactions are only structurally validated
//! here; their reward amounts are checked during block validation, which
//! has the subsidy schedule and masternode/superblock context this module
//! deliberately does not carry.

use std::collections::HashSet;

use crate::constants::{LOCKTIME_THRESHOLD, MAX_MONEY, MAX_TX_SIZE};
use crate::crypto;
use crate::error::TransactionError;
use crate::types::{Coin, OutPoint, ScriptPubKey, Transaction};

/// Summary of a successfully validated transaction, used by block
/// validation and template assembly for fee accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    pub total_input: u64,
    pub total_output: u64,
    pub fee: u64,
}

/// Validate transaction structure (context-free).
pub fn validate_transaction_structure(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(TransactionError::EmptyInputsOrOutputs);
    }

    for output in &tx.outputs {
        let zero_allowed = matches!(output.script_pubkey, ScriptPubKey::NullData);
        if output.value == 0 && !zero_allowed {
            return Err(TransactionError::ValueOutOfRange(0));
        }
        if output.value > MAX_MONEY {
            return Err(TransactionError::ValueOutOfRange(output.value));
        }
    }

    if tx.total_output_value().is_none() {
        return Err(TransactionError::ValueOverflow);
    }

    let encoded = bincode::encode_to_vec(tx, bincode::config::standard())
        .map_err(|e| TransactionError::Serialization(e.to_string()))?;
    if encoded.len() > MAX_TX_SIZE {
        return Err(TransactionError::OversizedTransaction { size: encoded.len(), max: MAX_TX_SIZE });
    }

    if tx.is_coinbase() {
        validate_coinbase_structure(tx)?;
    } else {
        validate_regular_structure(tx)?;
    }

    Ok(())
}

/// - Exactly one input with null outpoint (guaranteed by `is_coinbase`)
/// - Coinbase data (the input's signature field, used as free-form data)
///   within [`crate::constants::MAX_COINBASE_DATA`] bytes
fn validate_coinbase_structure(tx: &Transaction) -> Result<(), TransactionError> {
    let data_len = tx.inputs[0].signature.len();
    if data_len > crate::constants::MAX_COINBASE_DATA {
        return Err(TransactionError::InvalidCoinbaseLength(data_len));
    }
    Ok(())
}

/// - No null outpoints
/// - No duplicate input outpoints
/// - 64-byte signature and 32-byte public key on each input, except the
///   coinstake kernel input at index 0, which is authorized by the PoS
///   kernel check rather than an ordinary signature
fn validate_regular_structure(tx: &Transaction) -> Result<(), TransactionError> {
    let is_coinstake = tx.is_coinstake_marker();
    let mut seen = HashSet::with_capacity(tx.inputs.len());

    for (i, input) in tx.inputs.iter().enumerate() {
        if input.previous_output.is_null() {
            return Err(TransactionError::NullOutpointInRegularTx(i));
        }
        if !seen.insert(&input.previous_output) {
            return Err(TransactionError::DuplicateInput(input.previous_output.to_string()));
        }

        if is_coinstake && i == 0 {
            continue;
        }
        if input.signature.len() != 64 || input.public_key.len() != 32 {
            return Err(TransactionError::InvalidSignature { index: i });
        }
    }

    Ok(())
}

/// Verify `lock_time` is satisfied as of `current_height`/`current_time`,
/// using the same height-vs-timestamp threshold convention as Bitcoin.
pub fn check_locktime(
    tx: &Transaction,
    current_height: u64,
    current_time: u64,
) -> Result<(), TransactionError> {
    if tx.lock_time == 0 {
        return Ok(());
    }
    let satisfied = if tx.lock_time < LOCKTIME_THRESHOLD {
        tx.lock_time <= current_height
    } else {
        tx.lock_time <= current_time
    };
    if satisfied {
        Ok(())
    } else {
        Err(TransactionError::LocktimeNotSatisfied(tx.lock_time))
    }
}

/// Validate a transaction against the coin view (contextual): every input
/// resolves to a mature, unspent coin whose signature verifies, and inputs
/// cover outputs.
///
/// Coinbase transactions are rejected here — they have no real inputs to
/// check. Coinstake kernel inputs (index 0 of a coinstake) are likewise
/// skipped: the PoS kernel hash proof in [`crate::pos_kernel`] is their
/// authorization, not an Ed25519 signature.
pub fn validate_transaction<F>(
    tx: &Transaction,
    get_coin: F,
    current_height: u64,
) -> Result<ValidatedTransaction, TransactionError>
where
    F: Fn(&OutPoint) -> Option<Coin>,
{
    if tx.is_coinbase() {
        return Err(TransactionError::NullOutpointInRegularTx(0));
    }

    validate_transaction_structure(tx)?;
    let is_coinstake = tx.is_coinstake_marker();

    let mut total_input: u64 = 0;
    for (i, input) in tx.inputs.iter().enumerate() {
        let coin = get_coin(&input.previous_output).ok_or(TransactionError::UnknownUtxo(i))?;

        if !coin.is_mature(current_height) {
            return Err(TransactionError::ImmatureCoin { index: i });
        }

        if is_coinstake && i == 0 {
            // kernel input: authorized by the PoS kernel hash proof, checked
            // by the caller with the stake-modifier context this module lacks.
        } else {
            let pubkey_hash = coin
                .output
                .script_pubkey
                .pubkey_hash()
                .ok_or(TransactionError::InvalidSignature { index: i })?;
            crypto::verify_transaction_input(tx, i, &pubkey_hash)
                .map_err(|_| TransactionError::InvalidSignature { index: i })?;
        }

        total_input = total_input.checked_add(coin.output.value).ok_or(TransactionError::ValueOverflow)?;
    }

    let total_output = tx.total_output_value().ok_or(TransactionError::ValueOverflow)?;

    if !is_coinstake && total_input < total_output {
        return Err(TransactionError::InsufficientFunds { have: total_input, need: total_output });
    }

    let fee = total_input.saturating_sub(total_output);
    Ok(ValidatedTransaction { total_input, total_output, fee })
}
