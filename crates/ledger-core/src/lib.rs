//! Proof-of-work ledger core: mempool, Merkle commitment, nonce search,
//! chain validation and longest-chain fork choice.

pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod fork;
pub mod hashing;
pub mod mempool;
pub mod merkle;
pub mod mine;
pub mod pow;
pub mod store;
pub mod transaction;
pub mod validation;

pub use block::{block_hash, Block};
pub use chain::{genesis_block, import_json, Chain, MineOutcome};
pub use config::{ChainConfig, MempoolConfig};
pub use error::{LedgerError, ValidationError};
pub use hashing::{Hash, ZERO_HASH};
pub use mempool::Mempool;
pub use merkle::{merkle_proof, merkle_root, MerkleProof};
pub use pow::{meets_difficulty, CancelToken, MiningOutcome};
pub use store::{ChainStore, MemoryStore};
pub use transaction::Transaction;
pub use validation::{
    check_unconfirmed, is_valid_block, validate_block, validate_chain, validate_genesis,
};

pub use rust_decimal::Decimal;
