//! Pending transactions waiting for a block.
//!
//! Every mutation takes the single pool lock, so a transaction handed out by
//! one [`Mempool::drain_all`] can never be handed out by a concurrent one.

use crate::block::Block;
use crate::config::MempoolConfig;
use crate::error::{LedgerError, Result};
use crate::hashing::Hash;
use crate::transaction::Transaction;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Default)]
struct Pending {
    order: Vec<(Hash, Transaction)>,
    seen: HashSet<Hash>,
}

impl Pending {
    fn insert(&mut self, hash: Hash, tx: Transaction) -> bool {
        if !self.seen.insert(hash) {
            return false;
        }
        self.order.push((hash, tx));
        true
    }
}

#[derive(Default)]
pub struct Mempool {
    pending: RwLock<Pending>,
    config: MempoolConfig,
}

impl Mempool {
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            pending: RwLock::new(Pending::default()),
            config,
        }
    }

    /// Restores a pool from a persisted snapshot. Invalid and duplicate
    /// entries are dropped, and so is everything past `max_pending`.
    pub fn from_transactions(config: MempoolConfig, txs: Vec<Transaction>) -> Self {
        let pool = Self::new(config);
        let mut dropped = 0usize;
        {
            let mut pending = pool.pending.write();
            for tx in txs {
                if tx.validate().is_err() {
                    continue;
                }
                if pool.config.max_pending > 0 && pending.order.len() >= pool.config.max_pending {
                    dropped += 1;
                    continue;
                }
                pending.insert(tx.hash(), tx);
            }
        }
        if dropped > 0 {
            warn!(dropped, max = pool.config.max_pending, "restored pool truncated to capacity");
        }
        pool
    }

    /// Creates a transaction stamped now and submits it.
    pub fn submit(&self, sender: &str, receiver: &str, amount: Decimal) -> Result<Hash> {
        self.submit_transaction(Transaction::new(sender, receiver, amount))
    }

    /// Adds `tx` keyed by its hash. Re-submitting a pending transaction is a no-op.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<Hash> {
        tx.validate()?;
        let hash = tx.hash();
        let mut pending = self.pending.write();
        if pending.seen.contains(&hash) {
            debug!(tx = %hex::encode(hash), "duplicate submission ignored");
            return Ok(hash);
        }
        if self.config.max_pending > 0 && pending.order.len() >= self.config.max_pending {
            return Err(LedgerError::MempoolFull {
                max: self.config.max_pending,
            });
        }
        pending.insert(hash, tx);
        debug!(tx = %hex::encode(hash), size = pending.order.len(), "transaction accepted");
        Ok(hash)
    }

    /// Removes and returns every pending transaction in submission order.
    pub fn drain_all(&self) -> Vec<Transaction> {
        let mut pending = self.pending.write();
        pending.seen.clear();
        let drained: Vec<Transaction> = std::mem::take(&mut pending.order)
            .into_iter()
            .map(|(_, tx)| tx)
            .collect();
        debug!(count = drained.len(), "mempool drained");
        drained
    }

    /// Puts transactions from a failed mining attempt back at the front,
    /// ahead of anything submitted meanwhile. Capacity is not enforced here.
    pub fn requeue(&self, txs: Vec<Transaction>) {
        if txs.is_empty() {
            return;
        }
        let mut pending = self.pending.write();
        let newer = std::mem::take(&mut pending.order);
        pending.seen.clear();
        for tx in txs {
            pending.insert(tx.hash(), tx);
        }
        for (hash, tx) in newer {
            pending.insert(hash, tx);
        }
        debug!(size = pending.order.len(), "transactions requeued");
    }

    /// Drops pending transactions already included in `blocks`.
    /// Returns how many were removed.
    pub fn remove_confirmed(&self, blocks: &[Block]) -> usize {
        let confirmed: HashSet<Hash> = blocks
            .iter()
            .flat_map(|b| b.transactions.iter().map(Transaction::hash))
            .collect();
        let mut pending = self.pending.write();
        let before = pending.order.len();
        pending.order.retain(|(hash, _)| !confirmed.contains(hash));
        let Pending { order, seen } = &mut *pending;
        seen.retain(|hash| !confirmed.contains(hash));
        debug_assert_eq!(order.len(), seen.len());
        before - order.len()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.pending.read().seen.contains(hash)
    }

    pub fn size(&self) -> usize {
        self.pending.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Pending transactions in order, without removing them.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.pending.read().order.iter().map(|(_, tx)| tx.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Arc;

    fn tx(from: &str, to: &str, amount: u64, ts: u64) -> Transaction {
        Transaction::with_timestamp(from, to, Decimal::from(amount), ts)
    }

    #[test]
    fn duplicate_submission_is_idempotent() {
        let pool = Mempool::default();
        let t = tx("A", "B", 10, 1);
        let h1 = pool.submit_transaction(t.clone()).unwrap();
        let h2 = pool.submit_transaction(t).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn submit_rejects_invalid() {
        let pool = Mempool::default();
        let negative = Decimal::from_str("-1").unwrap();
        assert!(matches!(
            pool.submit("A", "B", negative),
            Err(LedgerError::InvalidTransaction(_))
        ));
        assert!(matches!(
            pool.submit("", "B", Decimal::ONE),
            Err(LedgerError::InvalidTransaction(_))
        ));
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn drain_preserves_order_and_empties() {
        let pool = Mempool::default();
        let txs: Vec<_> = (0..5).map(|i| tx("A", "B", i, i)).collect();
        for t in &txs {
            pool.submit_transaction(t.clone()).unwrap();
        }
        assert_eq!(pool.drain_all(), txs);
        assert_eq!(pool.size(), 0);
        assert!(pool.drain_all().is_empty());
    }

    // The pool only tracks pending hashes; `Chain` discards confirmed ones
    // when mining.
    #[test]
    fn drain_forgets_pending_hashes() {
        let pool = Mempool::default();
        let t = tx("A", "B", 1, 1);
        pool.submit_transaction(t.clone()).unwrap();
        pool.drain_all();
        pool.submit_transaction(t).unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn requeue_goes_to_front() {
        let pool = Mempool::default();
        let first = vec![tx("A", "B", 1, 1), tx("A", "B", 2, 2)];
        for t in &first {
            pool.submit_transaction(t.clone()).unwrap();
        }
        let drained = pool.drain_all();
        let late = tx("C", "D", 3, 3);
        pool.submit_transaction(late.clone()).unwrap();
        pool.requeue(drained);
        assert_eq!(pool.snapshot(), vec![first[0].clone(), first[1].clone(), late]);
    }

    #[test]
    fn requeue_skips_duplicates() {
        let pool = Mempool::default();
        let t = tx("A", "B", 1, 1);
        pool.submit_transaction(t.clone()).unwrap();
        pool.requeue(vec![t]);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn capacity_is_enforced_but_duplicates_pass() {
        let pool = Mempool::new(MempoolConfig { max_pending: 2 });
        pool.submit_transaction(tx("A", "B", 1, 1)).unwrap();
        pool.submit_transaction(tx("A", "B", 2, 2)).unwrap();
        assert!(pool.submit_transaction(tx("A", "B", 1, 1)).is_ok());
        assert!(matches!(
            pool.submit_transaction(tx("A", "B", 3, 3)),
            Err(LedgerError::MempoolFull { max: 2 })
        ));
    }

    #[test]
    fn remove_confirmed_drops_included() {
        let pool = Mempool::default();
        let a = tx("A", "B", 1, 1);
        let b = tx("A", "B", 2, 2);
        pool.submit_transaction(a.clone()).unwrap();
        pool.submit_transaction(b.clone()).unwrap();
        let block = Block::candidate(1, 0, [0u8; 32], vec![a.clone()]);
        assert_eq!(pool.remove_confirmed(&[block]), 1);
        assert!(!pool.contains(&a.hash()));
        assert_eq!(pool.snapshot(), vec![b]);
    }

    #[test]
    fn from_transactions_filters() {
        let good = tx("A", "B", 1, 1);
        let bad = tx("", "B", 1, 1);
        let pool = Mempool::from_transactions(
            MempoolConfig::default(),
            vec![good.clone(), bad, good.clone()],
        );
        assert_eq!(pool.snapshot(), vec![good]);
    }

    #[test]
    fn from_transactions_respects_capacity() {
        let txs: Vec<_> = (0..5).map(|i| tx("A", "B", i, i)).collect();
        let pool = Mempool::from_transactions(MempoolConfig { max_pending: 3 }, txs.clone());
        assert_eq!(pool.snapshot(), txs[..3].to_vec());
        assert!(matches!(
            pool.submit_transaction(tx("C", "D", 9, 9)),
            Err(LedgerError::MempoolFull { max: 3 })
        ));

        let unbounded = Mempool::from_transactions(MempoolConfig { max_pending: 0 }, txs.clone());
        assert_eq!(unbounded.size(), 5);
    }

    #[test]
    fn concurrent_submits_then_drain_is_union() {
        let pool = Arc::new(Mempool::new(MempoolConfig { max_pending: 0 }));
        let handles: Vec<_> = ["alice", "bob"]
            .into_iter()
            .map(|who| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for i in 0..500u64 {
                        pool.submit_transaction(tx(who, "carol", i, i)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let drained = pool.drain_all();
        assert_eq!(drained.len(), 1000);
        let unique: HashSet<Hash> = drained.iter().map(Transaction::hash).collect();
        assert_eq!(unique.len(), 1000);
        assert_eq!(pool.size(), 0);
    }
}
