//! Core protocol types: transactions, blocks, coins, scripts.
//!
//! All monetary values are in satoshis (1 MER = 10^8 satoshis).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::TransactionError;

/// A 32-byte hash value.
///
/// Used for transaction IDs, block header hashes, and Merkle roots (all
/// SHA-256d, see [`crypto::sha256d`](crate::crypto::sha256d)).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. Used for coinbase previous outpoints and the genesis
    /// parent reference.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    /// The null outpoint, used for coinbase (and coinstake) transaction
    /// inputs that do not spend a prior output.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u32::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// The spending condition attached to an output.
///
/// Real script interpreters evaluate an arbitrary byte program; this engine
/// models only the handful of output shapes that consensus rules inspect
/// directly (payee scripts, superblock payout scripts), following the
/// project's existing choice of a fixed signature scheme over a general VM.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum ScriptPubKey {
    /// Pay to the holder of the Ed25519 key whose hash is given.
    PayToPubkeyHash(Hash256),
    /// Pay to a redemption script whose hash is given; sigops are counted
    /// against [`MAX_P2SH_SIGOPS`](crate::constants::MAX_BLOCK_SIGOPS) as a
    /// fixed per-output cost rather than by interpreting the redemption
    /// script, since no script VM is modeled.
    PayToScriptHash(Hash256),
    /// Masternode-tier staking vault payee.
    StakeVault(Hash256),
    /// Treasury superblock payee.
    Treasury,
    /// Charity superblock payee.
    Charity,
    /// Unspendable marker output (e.g. the coinstake's zero-value marker).
    NullData,
}

impl ScriptPubKey {
    /// Legacy and P2SH sigop cost contributed by an output carrying this
    /// script, used toward the block sigop limit.
    pub fn sig_op_count(&self) -> usize {
        match self {
            ScriptPubKey::PayToPubkeyHash(_) => 1,
            ScriptPubKey::StakeVault(_) => 1,
            ScriptPubKey::PayToScriptHash(_) => 15,
            ScriptPubKey::Treasury | ScriptPubKey::Charity | ScriptPubKey::NullData => 0,
        }
    }

    /// The pubkey hash a signature must match to spend this output, if any.
    pub fn pubkey_hash(&self) -> Option<Hash256> {
        match self {
            ScriptPubKey::PayToPubkeyHash(h) | ScriptPubKey::StakeVault(h) => Some(*h),
            _ => None,
        }
    }
}

/// A transaction input, spending a previous output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// The outpoint being spent. Null for coinbase and coinstake kernel
    /// inputs that mint rather than spend... actually the coinstake kernel
    /// input does spend a real prevout; only coinbase uses the null marker.
    pub previous_output: OutPoint,
    /// Ed25519 signature (64 bytes). Empty for coinbase inputs.
    pub signature: Vec<u8>,
    /// Ed25519 public key (32 bytes). Empty for coinbase inputs.
    pub public_key: Vec<u8>,
}

/// A transaction output, creating a new spendable (or marker) coin.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    pub value: u64,
    pub script_pubkey: ScriptPubKey,
}

/// A transaction transferring value between addresses.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Block height or Unix timestamp before which this transaction is
    /// invalid, per the same threshold convention as
    /// [`LOCKTIME_THRESHOLD`](crate::constants::LOCKTIME_THRESHOLD).
    pub lock_time: u64,
}

impl Transaction {
    /// Compute the transaction ID (SHA-256d of the canonical encoding).
    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TransactionError::Serialization(e.to_string()))?;
        Ok(crate::crypto::sha256d(&encoded))
    }

    /// A coinbase transaction has a single input with a null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// A coinstake transaction carries the zero-value marker output
    /// traditional in PoS coins: a non-coinbase transaction whose first
    /// output is an empty placeholder and which spends at least one real
    /// input (the kernel, at index 0).
    pub fn is_coinstake_marker(&self) -> bool {
        !self.is_coinbase()
            && self.outputs.first().is_some_and(|o| {
                o.value == 0 && matches!(o.script_pubkey, ScriptPubKey::NullData)
            })
            && !self.inputs.is_empty()
            && !self.inputs[0].previous_output.is_null()
    }

    /// Sum of all output values. Returns `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

/// Block header. Bits 0..28 of `version` above `VERSIONBITS_TOP_BITS` are
/// BIP9 deployment signal bits (component I); the remaining low bits and
/// `difficulty_target` carry the consensus-critical proof fields.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u64,
    /// Difficulty target. Higher is easier, as in
    /// [`difficulty`](crate::difficulty); for PoS blocks this is the kernel
    /// target base.
    pub difficulty_target: u64,
    pub nonce: u64,
}

impl BlockHeader {
    const HASH_SIZE: usize = 4 + 8 + 8 + 2 * 32;

    /// Compute the block header hash (SHA-256d over a fixed byte layout).
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.difficulty_target.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        crate::crypto::sha256d(&data)
    }

    /// Whether a BIP9 signal bit is set in this header's version field.
    pub fn signals_bit(&self, bit: u8) -> bool {
        if self.version & crate::constants::VERSIONBITS_TOP_MASK
            != crate::constants::VERSIONBITS_TOP_BITS
        {
            return false;
        }
        self.version & (1u32 << bit) != 0
    }
}

/// A complete block: header, transactions, and (for PoS blocks) a detached
/// signature over the header made by the kernel output's key.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// Ed25519 signature over `header.hash()`, empty for PoW blocks.
    pub block_signature: Vec<u8>,
}

impl Block {
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// The coinstake transaction, if this is a PoS block (second
    /// transaction, carrying the coinstake marker).
    pub fn coinstake(&self) -> Option<&Transaction> {
        self.transactions
            .get(1)
            .filter(|tx| tx.is_coinstake_marker())
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.coinstake().is_some()
    }
}

/// An entry in the unspent transaction output set.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Coin {
    pub output: TxOutput,
    pub height: u64,
    pub is_coinbase: bool,
    pub is_coinstake: bool,
}

impl Coin {
    /// Coinbase and coinstake outputs require
    /// [`COINBASE_MATURITY`](crate::constants::COINBASE_MATURITY)
    /// confirmations before they can be spent.
    pub fn is_mature(&self, current_height: u64) -> bool {
        if !self.is_coinbase && !self.is_coinstake {
            return true;
        }
        current_height.saturating_sub(self.height) >= crate::constants::COINBASE_MATURITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;

    fn sample_pubkey_hash() -> Hash256 {
        Hash256([0xAA; 32])
    }

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint { txid: Hash256([0x11; 32]), index: 0 },
                signature: vec![0u8; 64],
                public_key: vec![0u8; 32],
            }],
            outputs: vec![TxOutput {
                value: 50 * COIN,
                script_pubkey: ScriptPubKey::PayToPubkeyHash(sample_pubkey_hash()),
            }],
            lock_time: 0,
        }
    }

    fn sample_coinbase() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                signature: vec![],
                public_key: vec![],
            }],
            outputs: vec![TxOutput {
                value: 50 * COIN,
                script_pubkey: ScriptPubKey::PayToPubkeyHash(sample_pubkey_hash()),
            }],
            lock_time: 0,
        }
    }

    fn sample_coinstake() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint { txid: Hash256([0x22; 32]), index: 0 },
                signature: vec![0u8; 64],
                public_key: vec![0u8; 32],
            }],
            outputs: vec![
                TxOutput { value: 0, script_pubkey: ScriptPubKey::NullData },
                TxOutput {
                    value: 10 * COIN,
                    script_pubkey: ScriptPubKey::PayToPubkeyHash(sample_pubkey_hash()),
                },
            ],
            lock_time: 0,
        }
    }

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: Hash256::ZERO,
            timestamp: 1_700_000_000,
            difficulty_target: u64::MAX,
            nonce: 0,
        }
    }

    #[test]
    fn hash256_zero_is_zero() {
        assert!(Hash256::ZERO.is_zero());
        assert_eq!(Hash256::ZERO, Hash256::default());
    }

    #[test]
    fn hash256_display_hex() {
        let s = format!("{}", Hash256([0xAB; 32]));
        assert_eq!(s.len(), 64);
        assert_eq!(&s[0..2], "ab");
    }

    #[test]
    fn outpoint_null_detection() {
        assert!(OutPoint::null().is_null());
        assert!(!OutPoint { txid: Hash256([1; 32]), index: 0 }.is_null());
    }

    #[test]
    fn coinbase_detection() {
        assert!(sample_coinbase().is_coinbase());
        assert!(!sample_tx().is_coinbase());
        assert!(!sample_coinstake().is_coinbase());
    }

    #[test]
    fn coinstake_marker_detection() {
        assert!(sample_coinstake().is_coinstake_marker());
        assert!(!sample_tx().is_coinstake_marker());
        assert!(!sample_coinbase().is_coinstake_marker());
    }

    #[test]
    fn total_output_value_overflow_returns_none() {
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![
                TxOutput { value: u64::MAX, script_pubkey: ScriptPubKey::NullData },
                TxOutput { value: 1, script_pubkey: ScriptPubKey::NullData },
            ],
            lock_time: 0,
        };
        assert_eq!(tx.total_output_value(), None);
    }

    #[test]
    fn txid_deterministic_and_sensitive_to_data() {
        let tx1 = sample_tx();
        let mut tx2 = sample_tx();
        assert_eq!(tx1.txid().unwrap(), tx2.txid().unwrap());
        tx2.lock_time = 1;
        assert_ne!(tx1.txid().unwrap(), tx2.txid().unwrap());
    }

    #[test]
    fn block_header_hash_deterministic_and_nonce_sensitive() {
        let h1 = sample_header();
        let mut h2 = h1.clone();
        assert_eq!(h1.hash(), h1.hash());
        h2.nonce = 1;
        assert_ne!(h1.hash(), h2.hash());
    }

    #[test]
    fn version_bits_signal_requires_top_bits() {
        let mut h = sample_header();
        h.version = 1; // no top bits set
        assert!(!h.signals_bit(0));
        h.version = crate::constants::VERSIONBITS_TOP_BITS | 0b101;
        assert!(h.signals_bit(0));
        assert!(!h.signals_bit(1));
        assert!(h.signals_bit(2));
    }

    #[test]
    fn block_coinbase_and_coinstake_accessors() {
        let block = Block {
            header: sample_header(),
            transactions: vec![sample_coinbase(), sample_coinstake()],
            block_signature: vec![],
        };
        assert!(block.coinbase().unwrap().is_coinbase());
        assert!(block.coinstake().is_some());
        assert!(block.is_proof_of_stake());
    }

    #[test]
    fn coin_maturity() {
        let coin = Coin {
            output: TxOutput { value: 50 * COIN, script_pubkey: ScriptPubKey::NullData },
            height: 100,
            is_coinbase: true,
            is_coinstake: false,
        };
        assert!(!coin.is_mature(150));
        assert!(coin.is_mature(200));
        let spendable = Coin { is_coinbase: false, is_coinstake: false, ..coin };
        assert!(spendable.is_mature(100));
    }

    #[test]
    fn sig_op_counts() {
        assert_eq!(ScriptPubKey::PayToPubkeyHash(Hash256::ZERO).sig_op_count(), 1);
        assert_eq!(ScriptPubKey::PayToScriptHash(Hash256::ZERO).sig_op_count(), 15);
        assert_eq!(ScriptPubKey::Treasury.sig_op_count(), 0);
    }

    #[test]
    fn bincode_round_trip_block() {
        let block = Block {
            header: sample_header(),
            transactions: vec![sample_coinbase(), sample_tx()],
            block_signature: vec![1, 2, 3],
        };
        let encoded = bincode::encode_to_vec(&block, bincode::config::standard()).unwrap();
        let (decoded, _): (Block, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(block, decoded);
    }
}
