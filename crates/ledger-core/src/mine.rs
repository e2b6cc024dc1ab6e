use crate::{
    block::{Block, HEADER_BYTES_LEN},
    hashing::Hash,
    pow::{advance_timestamp, meets_difficulty, CancelToken, MiningOutcome},
    transaction::{unix_now, Transaction},
};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// Same contract as [`crate::pow::mine_block`], but the nonce space is split
/// across the rayon pool. Whichever worker finds a valid nonce first wins, so
/// the nonce is not necessarily the smallest one.
pub fn mine_block_parallel(
    prev: &Block,
    txs: Vec<Transaction>,
    difficulty: u32,
    cancel: &CancelToken,
) -> MiningOutcome {
    let template = Block::candidate(prev.index + 1, unix_now(), prev.hash, txs);
    solve_parallel(template, difficulty, cancel)
}

pub fn solve_parallel(mut block: Block, difficulty: u32, cancel: &CancelToken) -> MiningOutcome {
    loop {
        // Everything but the trailing nonce is fixed for one sweep.
        let mut prefix = block.header_bytes();
        prefix.truncate(HEADER_BYTES_LEN - 8);

        let found = (0u64..u64::MAX).into_par_iter().find_map_any(|nonce| {
            if cancel.is_cancelled() {
                return Some(None);
            }
            let hash = header_hash(&prefix, nonce);
            meets_difficulty(&hash, difficulty).then_some(Some(nonce))
        });

        match found {
            Some(Some(nonce)) => {
                block.nonce = nonce;
                block.hash = block.compute_hash();
                info!(
                    index = block.index,
                    nonce,
                    hash = %block.hash_hex(),
                    "mined block in parallel"
                );
                return MiningOutcome::Found(block);
            }
            Some(None) => return MiningOutcome::Cancelled,
            None => {
                warn!(index = block.index, "nonce space exhausted, advancing timestamp");
                advance_timestamp(&mut block);
            }
        }
    }
}

fn header_hash(prefix: &[u8], nonce: u64) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(prefix);
    hasher.update(nonce.to_le_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}
