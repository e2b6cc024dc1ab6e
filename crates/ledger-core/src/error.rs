use thiserror::Error;

/// Why a block was rejected. Carried inside [`LedgerError::StaleOrInvalidBlock`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("block index {found} does not follow head index (expected {expected})")]
    IndexMismatch { expected: u64, found: u64 },
    #[error("block {index} does not reference the hash of its predecessor")]
    PrevHashMismatch { index: u64 },
    #[error("block {index} carries a hash that does not match its contents")]
    HashMismatch { index: u64 },
    #[error("block {index} carries a merkle root that does not match its transactions")]
    MerkleRootMismatch { index: u64 },
    #[error("block {index} hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: u64, difficulty: u32 },
    #[error("genesis block must have index 0 and the zero previous hash")]
    MalformedGenesis,
    #[error("block {index} repeats transaction {tx}")]
    DuplicateTransaction { index: u64, tx: String },
    #[error("block {index} contains an invalid transaction: {reason}")]
    InvalidTransaction { index: u64, reason: String },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("mempool is full ({max} pending transactions)")]
    MempoolFull { max: usize },

    #[error("stale or invalid block: {0}")]
    StaleOrInvalidBlock(#[from] ValidationError),

    #[error("candidate genesis {candidate} does not match local genesis {local}")]
    ChainMismatch { local: String, candidate: String },

    #[error("candidate chain has {candidate} blocks, local chain has {local}")]
    CandidateNotLonger { local: usize, candidate: usize },

    #[error("chain contains no blocks")]
    EmptyChain,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    /// Append races and lost fork-choice contests are steady-state events.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidTransaction(_)
                | LedgerError::MempoolFull { .. }
                | LedgerError::StaleOrInvalidBlock(_)
                | LedgerError::ChainMismatch { .. }
                | LedgerError::CandidateNotLonger { .. }
        )
    }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
