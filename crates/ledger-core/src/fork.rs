//! Longest-valid-chain fork choice.

use crate::block::Block;
use crate::config::ChainConfig;
use crate::error::{LedgerError, Result};
use crate::validation::validate_chain;

/// Decides whether `candidate` should replace a local chain of `local_len`
/// blocks rooted at `local_genesis`. The candidate wins only when it shares
/// the genesis block, validates from end to end, and is strictly longer.
pub fn check_candidate(
    local_genesis: &Block,
    local_len: usize,
    candidate: &[Block],
    config: &ChainConfig,
) -> Result<()> {
    let Some(genesis) = candidate.first() else {
        return Err(LedgerError::EmptyChain);
    };
    check_genesis(local_genesis, genesis)?;
    check_length(local_len, candidate.len())?;
    validate_chain(candidate, config)?;
    Ok(())
}

pub(crate) fn check_genesis(local: &Block, candidate: &Block) -> Result<()> {
    if local != candidate {
        return Err(LedgerError::ChainMismatch {
            local: local.hash_hex(),
            candidate: candidate.hash_hex(),
        });
    }
    Ok(())
}

pub(crate) fn check_length(local: usize, candidate: usize) -> Result<()> {
    if candidate <= local {
        return Err(LedgerError::CandidateNotLonger { local, candidate });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::genesis_block;
    use crate::error::ValidationError;
    use crate::pow::{mine_block, CancelToken};

    fn extend(mut blocks: Vec<Block>, n: usize, difficulty: u32) -> Vec<Block> {
        for _ in 0..n {
            let prev = blocks.last().unwrap().clone();
            let block = mine_block(&prev, vec![], difficulty, &CancelToken::new())
                .block()
                .unwrap();
            blocks.push(block);
        }
        blocks
    }

    #[test]
    fn longer_valid_chain_wins() {
        let config = ChainConfig::with_difficulty(1);
        let g = genesis_block(0);
        let candidate = extend(vec![g.clone()], 3, 1);
        assert!(check_candidate(&g, 2, &candidate, &config).is_ok());
    }

    #[test]
    fn tie_keeps_local() {
        let config = ChainConfig::with_difficulty(1);
        let g = genesis_block(0);
        let candidate = extend(vec![g.clone()], 2, 1);
        assert!(matches!(
            check_candidate(&g, 3, &candidate, &config),
            Err(LedgerError::CandidateNotLonger { local: 3, candidate: 3 })
        ));
    }

    #[test]
    fn foreign_genesis_is_mismatch() {
        let config = ChainConfig::with_difficulty(1);
        let ours = genesis_block(0);
        let theirs = crate::pow::solve(
            Block::candidate(0, 42, crate::hashing::ZERO_HASH, vec![]),
            0,
            &CancelToken::new(),
        )
        .block()
        .unwrap();
        let candidate = extend(vec![theirs], 3, 1);
        assert!(matches!(
            check_candidate(&ours, 1, &candidate, &config),
            Err(LedgerError::ChainMismatch { .. })
        ));
    }

    #[test]
    fn invalid_block_anywhere_rejects_all() {
        let config = ChainConfig::with_difficulty(1);
        let g = genesis_block(0);
        let mut candidate = extend(vec![g.clone()], 4, 1);
        candidate[3].nonce = candidate[3].nonce.wrapping_add(1);
        assert!(matches!(
            check_candidate(&g, 1, &candidate, &config),
            Err(LedgerError::StaleOrInvalidBlock(ValidationError::HashMismatch { index: 3 }))
        ));
    }

    #[test]
    fn empty_candidate() {
        let g = genesis_block(0);
        assert!(matches!(
            check_candidate(&g, 1, &[], &ChainConfig::default()),
            Err(LedgerError::EmptyChain)
        ));
    }
}
