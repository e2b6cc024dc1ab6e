use crate::block::Block;
use crate::constants::{BITS_PER_HEX_DIGIT, CANCEL_POLL_INTERVAL};
use crate::hashing::Hash;
use crate::transaction::{unix_now, Transaction};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 8;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}

/// Number of leading `'0'` characters in the hex form of `hash`.
pub fn leading_zero_hex_digits(hash: &Hash) -> u32 {
    count_leading_zero_bits(hash) / BITS_PER_HEX_DIGIT
}

/// True when the hex digest starts with at least `difficulty` zeros.
pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
    leading_zero_hex_digits(hash) >= difficulty
}

/// Cooperative stop flag shared between a miner and whoever may abort it.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MiningOutcome {
    Found(Block),
    Cancelled,
}

impl MiningOutcome {
    pub fn block(self) -> Option<Block> {
        match self {
            MiningOutcome::Found(block) => Some(block),
            MiningOutcome::Cancelled => None,
        }
    }
}

/// Assembles the successor of `prev` and searches nonces 0, 1, 2, ... until its
/// hash meets `difficulty`. Touches neither mempool nor chain.
pub fn mine_block(
    prev: &Block,
    txs: Vec<Transaction>,
    difficulty: u32,
    cancel: &CancelToken,
) -> MiningOutcome {
    let candidate = Block::candidate(prev.index + 1, unix_now(), prev.hash, txs);
    solve(candidate, difficulty, cancel)
}

/// Nonce search over an assembled block. The token is checked every
/// [`CANCEL_POLL_INTERVAL`] nonces. If the nonce space runs out the timestamp
/// moves forward and the search restarts at 0.
pub fn solve(mut block: Block, difficulty: u32, cancel: &CancelToken) -> MiningOutcome {
    block.nonce = 0;
    let mut attempts: u64 = 0;
    loop {
        if block.nonce % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
            debug!(index = block.index, attempts, "nonce search cancelled");
            return MiningOutcome::Cancelled;
        }
        let hash = block.compute_hash();
        attempts += 1;
        if meets_difficulty(&hash, difficulty) {
            block.hash = hash;
            debug!(index = block.index, nonce = block.nonce, attempts, "nonce found");
            return MiningOutcome::Found(block);
        }
        if block.nonce == u64::MAX {
            advance_timestamp(&mut block);
            block.nonce = 0;
        } else {
            block.nonce += 1;
        }
    }
}

/// Moves the block to a fresh timestamp once its nonce space is spent.
pub(crate) fn advance_timestamp(block: &mut Block) {
    block.timestamp = unix_now().max(block.timestamp.saturating_add(1));
}
