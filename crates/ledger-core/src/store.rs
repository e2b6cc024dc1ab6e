use crate::block::Block;
use crate::hashing::Hash;
use anyhow::Result;
use parking_lot::Mutex;

/// Trait the storage backends implement for the chain to persist blocks.
/// This lives in `ledger-core` to avoid a circular dependency.
///
/// The chain calls `put_block` and `replace_blocks` while holding its own
/// write lock, so implementations see writes in chain order.
pub trait ChainStore: Send + Sync {
    fn put_block(&self, block: &Block) -> Result<()>;
    fn get_block(&self, index: u64) -> Result<Option<Block>>;
    /// Every stored block, ordered by index.
    fn load_blocks(&self) -> Result<Vec<Block>>;
    /// Swaps the whole stored chain for `blocks`.
    fn replace_blocks(&self, blocks: &[Block]) -> Result<()>;
    /// `None` when nothing has been stored yet.
    fn tip_height(&self) -> Result<Option<u64>>;
    fn tip_hash(&self) -> Result<Option<Hash>>;
    fn close(&self) -> Result<()>;
}

/// Volatile store for tests and for chains nobody needs to reload.
#[derive(Default)]
pub struct MemoryStore {
    blocks: Mutex<Vec<Block>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainStore for MemoryStore {
    fn put_block(&self, block: &Block) -> Result<()> {
        let mut blocks = self.blocks.lock();
        let at = block.index as usize;
        if at < blocks.len() {
            blocks[at] = block.clone();
            blocks.truncate(at + 1);
        } else if at == blocks.len() {
            blocks.push(block.clone());
        } else {
            anyhow::bail!("block {} leaves a gap after height {}", block.index, blocks.len());
        }
        Ok(())
    }

    fn get_block(&self, index: u64) -> Result<Option<Block>> {
        Ok(self.blocks.lock().get(index as usize).cloned())
    }

    fn load_blocks(&self) -> Result<Vec<Block>> {
        Ok(self.blocks.lock().clone())
    }

    fn replace_blocks(&self, blocks: &[Block]) -> Result<()> {
        *self.blocks.lock() = blocks.to_vec();
        Ok(())
    }

    fn tip_height(&self) -> Result<Option<u64>> {
        Ok(self.blocks.lock().last().map(|b| b.index))
    }

    fn tip_hash(&self) -> Result<Option<Hash>> {
        Ok(self.blocks.lock().last().map(|b| b.hash))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::ZERO_HASH;

    #[test]
    fn memory_store_tracks_tip() -> Result<()> {
        let store = MemoryStore::new();
        assert_eq!(store.tip_height()?, None);
        let g = Block::candidate(0, 0, ZERO_HASH, vec![]);
        let b1 = Block::candidate(1, 1, g.hash, vec![]);
        store.put_block(&g)?;
        store.put_block(&b1)?;
        assert_eq!(store.tip_height()?, Some(1));
        assert_eq!(store.tip_hash()?, Some(b1.hash));
        assert_eq!(store.get_block(0)?, Some(g));
        assert_eq!(store.get_block(5)?, None);
        Ok(())
    }

    #[test]
    fn memory_store_rejects_gaps() {
        let store = MemoryStore::new();
        let b = Block::candidate(3, 0, ZERO_HASH, vec![]);
        assert!(store.put_block(&b).is_err());
    }

    #[test]
    fn memory_store_replace() -> Result<()> {
        let store = MemoryStore::new();
        store.put_block(&Block::candidate(0, 0, ZERO_HASH, vec![]))?;
        let other = vec![Block::candidate(0, 9, ZERO_HASH, vec![])];
        store.replace_blocks(&other)?;
        assert_eq!(store.load_blocks()?, other);
        Ok(())
    }
}
