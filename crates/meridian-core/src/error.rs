//! Error types for the chain state engine.
//!
//! Every consensus-facing error carries an [`ErrorKind`]: a DoS weight, a
//! short reject code, and whether the offending block index entry should
//! be marked `FAILED`. `Transient`, `Corruption`, and `Shutdown` are never
//! peer-attributable.
use thiserror::Error;

/// Classification used by the block acceptance pipeline and reorg mediator
/// to decide DoS scoring and whether to mark a block index entry `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ContextFreeInvalid,
    ContextInvalid,
    InputsMissing,
    ScriptFail,
    PolicyFail,
    Transient,
    Corruption,
    Shutdown,
}

impl ErrorKind {
    /// DoS score attributable to the peer that relayed the offending data.
    /// `Transient`/`Corruption`/`Shutdown` are never peer-attributable.
    pub fn dos_weight(self) -> u32 {
        match self {
            ErrorKind::ContextFreeInvalid => 100,
            ErrorKind::ContextInvalid => 50,
            ErrorKind::InputsMissing => 0,
            ErrorKind::ScriptFail => 100,
            ErrorKind::PolicyFail => 100,
            ErrorKind::Transient | ErrorKind::Corruption | ErrorKind::Shutdown => 0,
        }
    }

    /// Whether the engine should ratchet the offending entry's status bit
    /// to `FAILED`.
    pub fn marks_failed(self) -> bool {
        matches!(
            self,
            ErrorKind::ContextFreeInvalid
                | ErrorKind::ContextInvalid
                | ErrorKind::ScriptFail
                | ErrorKind::PolicyFail
        )
    }

    pub fn reject_code(self) -> &'static str {
        match self {
            ErrorKind::ContextFreeInvalid => "bad-format",
            ErrorKind::ContextInvalid => "bad-context",
            ErrorKind::InputsMissing => "missing-inputs",
            ErrorKind::ScriptFail => "bad-script",
            ErrorKind::PolicyFail => "bad-policy",
            ErrorKind::Transient => "transient",
            ErrorKind::Corruption => "corrupt",
            ErrorKind::Shutdown => "shutdown",
        }
    }
}

/// Implemented by every consensus-facing error so pipeline code can decide
/// DoS scoring without matching on each concrete enum.
pub trait ConsensusError {
    fn kind(&self) -> ErrorKind;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("empty inputs or outputs")]
    EmptyInputsOrOutputs,
    #[error("duplicate input: {0}")]
    DuplicateInput(String),
    #[error("oversized: {size} > {max}")]
    OversizedTransaction { size: usize, max: usize },
    #[error("output value {0} out of range")]
    ValueOutOfRange(u64),
    #[error("value overflow")]
    ValueOverflow,
    #[error("invalid coinbase scriptSig length: {0}")]
    InvalidCoinbaseLength(usize),
    #[error("null outpoint in non-coinbase input {0}")]
    NullOutpointInRegularTx(usize),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("unknown UTXO at input {0}")]
    UnknownUtxo(usize),
    #[error("immature coin spent at input {index}")]
    ImmatureCoin { index: usize },
    #[error("invalid signature on input {index}")]
    InvalidSignature { index: usize },
    #[error("insufficient funds: inputs {have}, outputs {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("locktime not satisfied: {0}")]
    LocktimeNotSatisfied(u64),
    #[error("coinstake input 0 is not the kernel")]
    CoinstakeInputNotKernel,
    #[error("coinstake reward {got} below expected {expected}")]
    CoinstakeUnderpaid { got: u64, expected: u64 },
}

impl ConsensusError for TransactionError {
    fn kind(&self) -> ErrorKind {
        match self {
            TransactionError::UnknownUtxo(_) => ErrorKind::InputsMissing,
            TransactionError::Serialization(_) => ErrorKind::Transient,
            _ => ErrorKind::ContextFreeInvalid,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("no transactions")]
    NoTransactions,
    #[error("first transaction is not coinbase")]
    FirstTxNotCoinbase,
    #[error("multiple coinbase transactions")]
    MultipleCoinbase,
    #[error("proof-of-stake block missing coinstake as second transaction")]
    MissingCoinstake,
    #[error("duplicate txid: {0}")]
    DuplicateTxid(String),
    #[error("merkle tree has a duplicated trailing pair (CVE-2012-2459)")]
    DuplicateMerklePair,
    #[error("invalid merkle root")]
    InvalidMerkleRoot,
    #[error("invalid proof of work")]
    InvalidProofOfWork,
    #[error("invalid proof of stake kernel")]
    InvalidProofOfStake,
    #[error("missing or invalid block signature")]
    InvalidBlockSignature,
    #[error("oversized: {size} > {max}")]
    OversizedBlock { size: usize, max: usize },
    #[error("sigop limit exceeded: {got} > {max}")]
    TooManySigops { got: usize, max: usize },
    #[error("invalid prev hash")]
    InvalidPrevHash,
    #[error("timestamp {got} not after median-time-past {mtp}")]
    TimestampNotAfterMedian { got: u64, mtp: u64 },
    #[error("timestamp {got} too far in the future (limit {limit})")]
    TimestampTooFarInFuture { got: u64, limit: u64 },
    #[error("invalid difficulty: got {got}, expected {expected}")]
    InvalidDifficulty { got: u64, expected: u64 },
    #[error("double spend across transactions: {0}")]
    DoubleSpend(String),
    #[error("invalid reward: got {got}, expected {expected}")]
    InvalidReward { got: u64, expected: u64 },
    #[error("missing or incorrect superblock payout: {0}")]
    InvalidSuperblockPayout(String),
    #[error("masternode payee missing or below vote threshold")]
    InvalidMasternodePayee,
    #[error("tx error at index {index}: {source}")]
    TransactionError { index: usize, source: TransactionError },
    #[error("parent block is unknown")]
    ParentUnknown,
    #[error("ancestor marked FAILED_PARENT")]
    FailedParent,
    #[error("block at a checkpoint height does not match the pinned hash")]
    CheckpointMismatch,
}

impl ConsensusError for BlockError {
    fn kind(&self) -> ErrorKind {
        match self {
            BlockError::ParentUnknown => ErrorKind::ContextInvalid,
            BlockError::FailedParent => ErrorKind::ContextInvalid,
            BlockError::TimestampNotAfterMedian { .. }
            | BlockError::TimestampTooFarInFuture { .. }
            | BlockError::InvalidDifficulty { .. } => ErrorKind::ContextInvalid,
            BlockError::InvalidProofOfStake | BlockError::InvalidBlockSignature => {
                ErrorKind::ScriptFail
            }
            BlockError::InvalidReward { .. }
            | BlockError::InvalidSuperblockPayout(_)
            | BlockError::InvalidMasternodePayee => ErrorKind::PolicyFail,
            BlockError::TransactionError { source, .. } => source.kind(),
            BlockError::CheckpointMismatch => ErrorKind::ContextInvalid,
            _ => ErrorKind::ContextFreeInvalid,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PosKernelError {
    #[error("kernel stake target overflow treated as automatic pass")]
    TargetOverflow,
    #[error("hash proof does not meet stake target")]
    ProofAboveTarget,
    #[error("coin age below minimum stake age")]
    BelowMinimumAge,
    #[error("stake modifier unavailable within selection window")]
    ModifierUnavailable,
}

impl ConsensusError for PosKernelError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ScriptFail
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeploymentError {
    #[error("deployment bit {0} out of usable range (0..29)")]
    BitOutOfRange(u8),
    #[error("bit {0} already in use by another active deployment")]
    BitAlreadyInUse(u8),
    #[error("more than 29 simultaneous deployments")]
    TooManyDeployments,
    #[error("unknown deployment: {0}")]
    UnknownDeployment(String),
}

impl ConsensusError for DeploymentError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ContextFreeInvalid
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubsidyError {
    #[error("subsidy components do not sum to the full block value at height {height}: got {got}, expected {expected}")]
    SumMismatch { height: u64, got: u64, expected: u64 },
}

impl ConsensusError for SubsidyError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::PolicyFail
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid signature bytes")]
    InvalidSignature,
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("pubkey hash does not match expected")]
    PubkeyHashMismatch,
    #[error("input index out of bounds: {index} >= {len}")]
    InputIndexOutOfBounds { index: usize, len: usize },
}

impl ConsensusError for CryptoError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ScriptFail
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction already in pool: {0}")]
    AlreadyExists(String),
    #[error("conflicts with pool tx {existing_txid} on outpoint {outpoint}")]
    Conflict {
        new_txid: String,
        existing_txid: String,
        outpoint: String,
    },
    #[error("pool full")]
    PoolFull,
    #[error("fee too low: {fee} < minimum {minimum}")]
    FeeTooLow { fee: u64, minimum: u64 },
    #[error("internal mempool error: {0}")]
    Internal(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainStateError {
    #[error("empty chain: no blocks connected")]
    EmptyChain,
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("undo data missing for block: {0}")]
    UndoDataMissing(String),
    #[error("height mismatch: expected {expected}, got {got}")]
    HeightMismatch { expected: u64, got: u64 },
    #[error("duplicate block: {0}")]
    DuplicateBlock(String),
    #[error("coin view besthash disagrees with active tip")]
    BestHashMismatch,
}

impl ConsensusError for ChainStateError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ContextInvalid
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("i/o: {0}")]
    Io(String),
    #[error("checksum mismatch reading {what}: reindex required")]
    ChecksumMismatch { what: String },
    #[error("database corruption: {0}")]
    Corruption(String),
}

impl ConsensusError for StorageError {
    fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Io(_) => ErrorKind::Transient,
            StorageError::ChecksumMismatch { .. } | StorageError::Corruption(_) => {
                ErrorKind::Corruption
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum MeridianError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error(transparent)]
    PosKernel(#[from] PosKernelError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Subsidy(#[from] SubsidyError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    #[error(transparent)]
    ChainState(#[from] ChainStateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("shutdown requested")]
    Shutdown,
}

impl ConsensusError for MeridianError {
    fn kind(&self) -> ErrorKind {
        match self {
            MeridianError::Transaction(e) => e.kind(),
            MeridianError::Block(e) => e.kind(),
            MeridianError::PosKernel(e) => e.kind(),
            MeridianError::Deployment(e) => e.kind(),
            MeridianError::Subsidy(e) => e.kind(),
            MeridianError::Crypto(e) => e.kind(),
            MeridianError::Mempool(_) => ErrorKind::ContextFreeInvalid,
            MeridianError::ChainState(e) => e.kind(),
            MeridianError::Storage(e) => e.kind(),
            MeridianError::Shutdown => ErrorKind::Shutdown,
        }
    }
}
