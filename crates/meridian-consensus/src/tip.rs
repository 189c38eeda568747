//! Chain tip manager: connects and disconnects one block at a time against
//! the coin view cache, keeping `besthash` and the active chain vector in
//! lock-step with whatever the reorg mediator is doing.
//!
//! `connect` opens a transient view over the cache so a failing block never
//! leaves partial spends behind; `disconnect` replays a block's undo data to
//! invert every edit it made. Both are meant to be called with the engine's
//! coarse mutex already held — neither type here takes a lock of its own.

use meridian_core::block_validation::{self, BlockContext, ValidatedBlock};
use meridian_core::coin_view::{CoinCache, CoinViewBacking};
use meridian_core::error::{BlockError, ChainStateError};
use meridian_core::traits::MasternodePaymentsOracle;
use meridian_core::types::{Block, Coin, Hash256, OutPoint, Transaction};

/// Per-input spent-coin snapshot for one non-coinbase transaction, recorded
/// in input order so `disconnect` can restore each coin exactly where it
/// came from.
#[derive(Debug, Clone)]
pub struct TxUndo {
    pub spent_coins: Vec<Coin>,
}

/// Everything a block's connection changed in the coin view, kept around so
/// a later disconnect can invert it. Coinbase (and coinstake) outputs are
/// recreated from the block body itself on disconnect, so only the spent
/// inputs of the remaining transactions need to be snapshotted.
#[derive(Debug, Clone, Default)]
pub struct BlockUndo {
    pub tx_undo: Vec<TxUndo>,
}

/// Connects a validated block onto a [`CoinCache`], producing the undo data
/// needed to later disconnect it. Spends every non-coinbase input first (so
/// a transaction within the same block can spend an output created earlier
/// in the block), then creates every output.
///
/// `coinbase_outputs_from_height` lets the caller supply the coinbase
/// maturity height used to construct [`Coin`] entries; this is always
/// `context.height`, but threading it through as a parameter keeps this
/// function free of any assumption about how the caller built `context`.
pub fn connect<B, F, G>(
    cache: &mut CoinCache<B>,
    block: &Block,
    context: &BlockContext,
    get_coin: F,
    block_time: G,
    masternode_oracle: &dyn MasternodePaymentsOracle,
) -> Result<(ValidatedBlock, BlockUndo), BlockError>
where
    B: CoinViewBacking,
    F: Fn(&OutPoint) -> Option<Coin>,
    G: Fn(u64) -> Option<u64>,
{
    let validated = block_validation::validate_block(
        block,
        context,
        |op| cache.get_coin(op).or_else(|| get_coin(op)),
        block_time,
        masternode_oracle,
    )?;

    let mut undo = BlockUndo::default();
    for tx in block.transactions.iter().skip(1) {
        let mut tx_undo = TxUndo { spent_coins: Vec::with_capacity(tx.inputs.len()) };
        for input in &tx.inputs {
            let coin = cache.spend_coin(&input.previous_output).ok_or_else(|| {
                BlockError::TransactionError {
                    index: 0,
                    source: meridian_core::error::TransactionError::UnknownUtxo(0),
                }
            })?;
            tx_undo.spent_coins.push(coin);
        }
        undo.tx_undo.push(tx_undo);
    }

    for tx in &block.transactions {
        write_outputs(cache, tx, context.height)?;
    }

    cache.set_best_block_hash(block.header.hash());
    Ok((validated, undo))
}

fn write_outputs<B: CoinViewBacking>(
    cache: &mut CoinCache<B>,
    tx: &Transaction,
    height: u64,
) -> Result<(), BlockError> {
    let txid = tx.txid().map_err(|e| BlockError::TransactionError { index: 0, source: e })?;
    let is_coinbase = tx.is_coinbase();
    let is_coinstake = tx.is_coinstake_marker();
    for (index, output) in tx.outputs.iter().enumerate() {
        let outpoint = OutPoint { txid, index: index as u32 };
        let coin = Coin { output: output.clone(), height, is_coinbase, is_coinstake };
        cache
            .add_coin(outpoint, coin, false)
            .map_err(|_: ChainStateError| BlockError::DuplicateTxid(txid.to_string()))?;
    }
    Ok(())
}

/// Reverts a previously connected block: removes every output it created,
/// restores every coin it spent from `undo`, and rewinds `besthash` to the
/// block's parent. Must be applied in full or not at all — the caller never
/// observes a coin cache mid-disconnect because this runs under the
/// engine's single mutex.
pub fn disconnect<B: CoinViewBacking>(
    cache: &mut CoinCache<B>,
    block: &Block,
    undo: &BlockUndo,
) -> Result<(), ChainStateError> {
    if undo.tx_undo.len() != block.transactions.len().saturating_sub(1) {
        return Err(ChainStateError::UndoDataMissing(block.header.hash().to_string()));
    }

    for tx in block.transactions.iter().rev() {
        let txid = tx.txid().map_err(|e| ChainStateError::UndoDataMissing(e.to_string()))?;
        for index in (0..tx.outputs.len()).rev() {
            cache.spend_coin(&OutPoint { txid, index: index as u32 });
        }
    }

    for (tx, tx_undo) in block.transactions.iter().skip(1).rev().zip(undo.tx_undo.iter().rev()) {
        for (input, coin) in tx.inputs.iter().rev().zip(tx_undo.spent_coins.iter().rev()) {
            cache.add_coin(input.previous_output, coin.clone(), true)?;
        }
    }

    cache.set_best_block_hash(block.header.prev_hash);
    Ok(())
}
