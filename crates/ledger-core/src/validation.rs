//! Stateless block and chain checks. Every check recomputes from the block's
//! own fields; nothing stored in a block is trusted.

use crate::block::Block;
use crate::config::ChainConfig;
use crate::error::ValidationError;
use crate::hashing::{Hash, ZERO_HASH};
use crate::merkle::merkle_root;
use crate::pow::meets_difficulty;
use std::collections::HashSet;

/// Checks `candidate` as the direct successor of `prev` under `difficulty`.
pub fn validate_block(candidate: &Block, prev: &Block, difficulty: u32) -> Result<(), ValidationError> {
    let expected = prev.index + 1;
    if candidate.index != expected {
        return Err(ValidationError::IndexMismatch {
            expected,
            found: candidate.index,
        });
    }
    if candidate.prev_hash != prev.hash {
        return Err(ValidationError::PrevHashMismatch {
            index: candidate.index,
        });
    }
    check_contents(candidate, difficulty)
}

pub fn is_valid_block(candidate: &Block, prev: &Block, difficulty: u32) -> bool {
    validate_block(candidate, prev, difficulty).is_ok()
}

/// Genesis needs no predecessor: index 0, zero `prev_hash`, sound contents.
pub fn validate_genesis(block: &Block, difficulty: u32) -> Result<(), ValidationError> {
    if block.index != 0 || block.prev_hash != ZERO_HASH {
        return Err(ValidationError::MalformedGenesis);
    }
    check_contents(block, difficulty)
}

/// Full re-verification of an ordered chain from genesis.
pub fn validate_chain(blocks: &[Block], config: &ChainConfig) -> Result<(), ValidationError> {
    let Some(genesis) = blocks.first() else {
        return Err(ValidationError::MalformedGenesis);
    };
    validate_genesis(genesis, config.genesis_difficulty)?;
    let mut confirmed: HashSet<Hash> = genesis.transactions.iter().map(|tx| tx.hash()).collect();
    for pair in blocks.windows(2) {
        validate_block(&pair[1], &pair[0], config.difficulty)?;
        check_unconfirmed(&pair[1], &confirmed)?;
        confirmed.extend(pair[1].transactions.iter().map(|tx| tx.hash()));
    }
    Ok(())
}

/// Rejects `block` if it carries a transaction already in `confirmed`.
pub fn check_unconfirmed(block: &Block, confirmed: &HashSet<Hash>) -> Result<(), ValidationError> {
    match block
        .transactions
        .iter()
        .map(|tx| tx.hash())
        .find(|hash| confirmed.contains(hash))
    {
        Some(hash) => Err(ValidationError::DuplicateTransaction {
            index: block.index,
            tx: hex::encode(hash),
        }),
        None => Ok(()),
    }
}

fn check_contents(block: &Block, difficulty: u32) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(block.transactions.len());
    for tx in &block.transactions {
        if let Err(e) = tx.validate() {
            return Err(ValidationError::InvalidTransaction {
                index: block.index,
                reason: e.to_string(),
            });
        }
        let hash = tx.hash();
        if !seen.insert(hash) {
            return Err(ValidationError::DuplicateTransaction {
                index: block.index,
                tx: hex::encode(hash),
            });
        }
    }
    if merkle_root(&block.transactions) != block.merkle_root {
        return Err(ValidationError::MerkleRootMismatch { index: block.index });
    }
    if block.compute_hash() != block.hash {
        return Err(ValidationError::HashMismatch { index: block.index });
    }
    if !meets_difficulty(&block.hash, difficulty) {
        return Err(ValidationError::InsufficientWork {
            index: block.index,
            difficulty,
        });
    }
    Ok(())
}
