//! Genesis block definition for the Meridian network.
//!
//! The genesis block is the first block in the chain (height 0): a single
//! coinbase transaction funding the treasury, mined under the easiest
//! difficulty target. All values are hardcoded and deterministic so every
//! node computes the identical block and hash.

use std::sync::LazyLock;

use crate::constants::COIN;
use crate::merkle;
use crate::types::{Block, BlockHeader, Hash256, OutPoint, ScriptPubKey, Transaction, TxInput, TxOutput};

/// Genesis block timestamp: January 1, 2026 00:00:00 UTC.
pub const GENESIS_TIMESTAMP: u64 = 1_767_225_600;

/// Message embedded in the genesis coinbase (like Bitcoin's "The Times" headline).
pub const GENESIS_MESSAGE: &[u8] = b"Meridian genesis 2026: a line drawn once, held by consensus.";

/// Treasury seed funding minted in the genesis block.
pub const GENESIS_TREASURY_SEED: u64 = 100_000 * COIN;

struct GenesisData {
    block: Block,
    hash: Hash256,
    coinbase_txid: Hash256,
}

static GENESIS: LazyLock<GenesisData> = LazyLock::new(build_genesis);

fn build_genesis() -> GenesisData {
    let coinbase = build_genesis_coinbase();
    let coinbase_txid = coinbase
        .txid()
        .expect("genesis coinbase is hardcoded valid data");
    let mr = merkle::merkle_root(&[coinbase_txid]);

    let block = Block {
        header: BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: mr,
            timestamp: GENESIS_TIMESTAMP,
            difficulty_target: u64::MAX,
            nonce: 0,
        },
        transactions: vec![coinbase],
        block_signature: Vec::new(),
    };
    let hash = block.header.hash();

    GenesisData { block, hash, coinbase_txid }
}

/// Build the genesis coinbase transaction: the genesis message in the
/// coinbase input's signature field, and a single treasury-funding output.
fn build_genesis_coinbase() -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            signature: GENESIS_MESSAGE.to_vec(),
            public_key: vec![],
        }],
        outputs: vec![TxOutput {
            value: GENESIS_TREASURY_SEED,
            script_pubkey: ScriptPubKey::Treasury,
        }],
        lock_time: 0,
    }
}

/// The genesis block (height 0).
pub fn genesis_block() -> &'static Block {
    &GENESIS.block
}

/// The genesis block header hash.
pub fn genesis_hash() -> Hash256 {
    GENESIS.hash
}

/// The transaction ID of the genesis coinbase.
pub fn genesis_coinbase_txid() -> Hash256 {
    GENESIS.coinbase_txid
}

/// Check whether a block is the genesis block by comparing header hashes.
pub fn is_genesis(block: &Block) -> bool {
    block.header.hash() == GENESIS.hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_timestamp_is_jan_1_2026() {
        assert_eq!(GENESIS_TIMESTAMP, 20454 * 86400);
    }

    #[test]
    fn genesis_message_not_empty() {
        assert!(!GENESIS_MESSAGE.is_empty());
        assert!(GENESIS_MESSAGE.starts_with(b"Meridian"));
    }

    #[test]
    fn genesis_block_deterministic() {
        assert_eq!(genesis_block(), genesis_block());
    }

    #[test]
    fn genesis_block_has_one_transaction() {
        assert_eq!(genesis_block().transactions.len(), 1);
    }

    #[test]
    fn genesis_coinbase_is_coinbase() {
        assert!(genesis_block().coinbase().unwrap().is_coinbase());
    }

    #[test]
    fn genesis_coinbase_has_message() {
        let coinbase = &genesis_block().transactions[0];
        assert_eq!(coinbase.inputs[0].signature, GENESIS_MESSAGE);
    }

    #[test]
    fn genesis_coinbase_funds_treasury() {
        let coinbase = &genesis_block().transactions[0];
        assert_eq!(coinbase.outputs.len(), 1);
        assert_eq!(coinbase.outputs[0].value, GENESIS_TREASURY_SEED);
        assert_eq!(coinbase.outputs[0].script_pubkey, ScriptPubKey::Treasury);
    }

    #[test]
    fn genesis_coinbase_total_value() {
        let total = genesis_block().transactions[0].total_output_value().unwrap();
        assert_eq!(total, GENESIS_TREASURY_SEED);
    }

    #[test]
    fn genesis_header_prev_hash_zero() {
        assert!(genesis_block().header.prev_hash.is_zero());
    }

    #[test]
    fn genesis_header_max_difficulty() {
        assert_eq!(genesis_block().header.difficulty_target, u64::MAX);
    }

    #[test]
    fn genesis_merkle_root_correct() {
        let block = genesis_block();
        let txid = block.transactions[0].txid().unwrap();
        assert_eq!(block.header.merkle_root, merkle::merkle_root(&[txid]));
    }

    #[test]
    fn genesis_merkle_root_nonzero() {
        assert!(!genesis_block().header.merkle_root.is_zero());
    }

    #[test]
    fn genesis_hash_deterministic() {
        assert_eq!(genesis_hash(), genesis_hash());
    }

    #[test]
    fn genesis_hash_matches_header() {
        assert_eq!(genesis_hash(), genesis_block().header.hash());
    }

    #[test]
    fn genesis_coinbase_txid_matches_computation() {
        let txid = genesis_block().transactions[0].txid().unwrap();
        assert_eq!(genesis_coinbase_txid(), txid);
    }

    #[test]
    fn is_genesis_true_for_genesis() {
        assert!(is_genesis(genesis_block()));
    }

    #[test]
    fn is_genesis_false_for_other_block() {
        let other = Block {
            header: BlockHeader {
                version: 1,
                prev_hash: genesis_hash(),
                merkle_root: Hash256::ZERO,
                timestamp: GENESIS_TIMESTAMP + 60,
                difficulty_target: u64::MAX,
                nonce: 0,
            },
            transactions: vec![],
            block_signature: Vec::new(),
        };
        assert!(!is_genesis(&other));
    }

    #[test]
    fn is_genesis_false_for_modified_genesis() {
        let mut modified = genesis_block().clone();
        modified.header.nonce = 999;
        assert!(!is_genesis(&modified));
    }
}
