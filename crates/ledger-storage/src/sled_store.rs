use anyhow::{Context, Result};
use ledger_core::{Block, ChainStore, Hash, Transaction};
use sled::{Batch, Db, IVec, Tree};
use std::path::Path;
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";
const TREE_PENDING: &str = "pending";

/// Blocks keyed by big-endian index so sled's key order is chain order.
/// The tip is always the last key, which keeps it consistent with the
/// blocks without a second write.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
  pending: Tree,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let db = sled::open(path).with_context(|| format!("open sled db at {}", path.display()))?;
    let blocks = db.open_tree(TREE_BLOCKS)?;
    let pending = db.open_tree(TREE_PENDING)?;
    info!(path = %path.display(), "sled store opened");
    Ok(Self { db, blocks, pending })
  }

  /// Replaces the persisted mempool snapshot with `txs`, keeping their order.
  pub fn save_pending(&self, txs: &[Transaction]) -> Result<()> {
    let mut batch = Batch::default();
    for key in self.pending.iter().keys() {
      batch.remove(key?);
    }
    for (seq, tx) in txs.iter().enumerate() {
      batch.insert((seq as u64).to_be_bytes().to_vec(), bincode::serialize(tx)?);
    }
    self.pending.apply_batch(batch)?;
    self.db.flush()?;
    debug!(count = txs.len(), "saved pending transactions");
    Ok(())
  }

  pub fn load_pending(&self) -> Result<Vec<Transaction>> {
    self
      .pending
      .iter()
      .values()
      .map(|v| {
        let v = v?;
        bincode::deserialize(&v).context("decode pending transaction")
      })
      .collect()
  }

  /// Drops every block and pending transaction.
  pub fn clear(&self) -> Result<()> {
    self.blocks.clear()?;
    self.pending.clear()?;
    self.db.flush()?;
    Ok(())
  }

  fn decode_block(bytes: &IVec) -> Result<Block> {
    bincode::deserialize(bytes).context("decode stored block")
  }
}

impl ChainStore for SledStore {
  fn put_block(&self, block: &Block) -> Result<()> {
    let key = block.index.to_be_bytes();
    let mut batch = Batch::default();
    // Overwriting an index discards everything stored above it.
    for stale in self.blocks.range(key..).keys() {
      batch.remove(stale?);
    }
    batch.insert(key.to_vec(), bincode::serialize(block)?);
    self.blocks.apply_batch(batch)?;
    self.db.flush()?;
    Ok(())
  }

  fn get_block(&self, index: u64) -> Result<Option<Block>> {
    self
      .blocks
      .get(index.to_be_bytes())?
      .map(|v| Self::decode_block(&v))
      .transpose()
  }

  fn load_blocks(&self) -> Result<Vec<Block>> {
    self
      .blocks
      .iter()
      .values()
      .map(|v| Self::decode_block(&v?))
      .collect()
  }

  fn replace_blocks(&self, blocks: &[Block]) -> Result<()> {
    let mut batch = Batch::default();
    for key in self.blocks.iter().keys() {
      batch.remove(key?);
    }
    for block in blocks {
      batch.insert(block.index.to_be_bytes().to_vec(), bincode::serialize(block)?);
    }
    self.blocks.apply_batch(batch)?;
    self.db.flush()?;
    info!(count = blocks.len(), "replaced stored chain");
    Ok(())
  }

  fn tip_height(&self) -> Result<Option<u64>> {
    Ok(self.blocks.last()?.map(|(k, _)| {
      let mut arr = [0u8; 8];
      arr.copy_from_slice(&k);
      u64::from_be_bytes(arr)
    }))
  }

  fn tip_hash(&self) -> Result<Option<Hash>> {
    self
      .blocks
      .last()?
      .map(|(_, v)| Self::decode_block(&v).map(|b| b.hash))
      .transpose()
  }

  fn close(&self) -> Result<()> {
    self.db.flush()?;
    Ok(())
  }
}
