//! Scoped-thread worker pool for batch signature verification.
//!
//! Checking every non-coinbase input's signature is the single most
//! expensive part of validating a block, and each check is independent of
//! every other — an ideal shape for a short-lived pool of scoped threads.
//! [`verify_block_parallel`] collects the checks a block needs and runs
//! them across `worker_count` threads via `std::thread::scope` and
//! `std::sync::mpsc`, the same primitives the rest of this crate already
//! relies on, rather than pulling in an async runtime or a job-queue crate.
//!
//! This runs *ahead of* [`meridian_core::block_validation::validate_block`],
//! which re-checks the same signatures serially as part of full contextual
//! validation; the pool exists to fail fast on a bad signature before
//! paying for the rest of that serial pass.

use std::sync::mpsc;

use meridian_core::crypto::verify_transaction_input;
use meridian_core::error::{BlockError, TransactionError};
use meridian_core::types::{Block, Coin, Hash256, OutPoint};

struct Job<'a> {
    tx_index: usize,
    input_index: usize,
    tx: &'a meridian_core::types::Transaction,
    expected_pubkey_hash: Hash256,
}

/// Collect the per-input signature checks a block needs, skipping the
/// coinbase (no signature) and a coinstake's kernel input (checked via the
/// detached block signature, not a per-input one, in
/// [`meridian_core::block_validation::validate_block`]).
fn collect_jobs<'a>(
    block: &'a Block,
    get_coin: &impl Fn(&OutPoint) -> Option<Coin>,
) -> Result<Vec<Job<'a>>, BlockError> {
    let coinstake_index = if block.coinstake().is_some() { Some(1) } else { None };
    let mut jobs = Vec::new();

    for (tx_index, tx) in block.transactions.iter().enumerate() {
        if tx_index == 0 {
            continue;
        }
        for (input_index, input) in tx.inputs.iter().enumerate() {
            if Some(tx_index) == coinstake_index && input_index == 0 {
                continue;
            }
            let coin = get_coin(&input.previous_output).ok_or(BlockError::TransactionError {
                index: tx_index,
                source: TransactionError::UnknownUtxo(input_index),
            })?;
            let expected_pubkey_hash = coin.output.script_pubkey.pubkey_hash().ok_or(BlockError::TransactionError {
                index: tx_index,
                source: TransactionError::InvalidSignature { index: input_index },
            })?;
            jobs.push(Job { tx_index, input_index, tx, expected_pubkey_hash });
        }
    }
    Ok(jobs)
}

fn chunks<T>(items: &[T], worker_count: usize) -> impl Iterator<Item = &[T]> {
    let chunk_size = items.len().div_ceil(worker_count).max(1);
    items.chunks(chunk_size)
}

/// Verify every input signature in `block` across `worker_count` scoped
/// threads, returning the lowest `(tx_index, input_index)` failure found,
/// or `Ok(())` if every signature checks out. `worker_count` of `0` runs
/// everything on the calling thread.
pub fn verify_block_parallel(
    block: &Block,
    get_coin: impl Fn(&OutPoint) -> Option<Coin> + Sync,
    worker_count: usize,
) -> Result<(), BlockError> {
    let jobs = collect_jobs(block, &get_coin)?;
    if jobs.is_empty() {
        return Ok(());
    }
    let worker_count = worker_count.max(1).min(jobs.len());

    let (tx, rx) = mpsc::channel();
    std::thread::scope(|scope| {
        for chunk in chunks(&jobs, worker_count) {
            let sender = tx.clone();
            scope.spawn(move || {
                for job in chunk {
                    let outcome = verify_transaction_input(job.tx, job.input_index, &job.expected_pubkey_hash);
                    if outcome.is_err() {
                        let _ = sender.send(Some((job.tx_index, job.input_index)));
                        return;
                    }
                }
                let _ = sender.send(None);
            });
        }
    });
    drop(tx);

    let mut failure: Option<(usize, usize)> = None;
    for received in rx {
        if let Some(candidate) = received {
            failure = Some(match failure {
                Some(current) if current <= candidate => current,
                _ => candidate,
            });
        }
    }

    match failure {
        None => Ok(()),
        Some((tx_index, input_index)) => {
            Err(BlockError::TransactionError { index: tx_index, source: TransactionError::InvalidSignature { index: input_index } })
        }
    }
}
