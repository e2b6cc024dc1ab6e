use anyhow::Result;
use ledger_core::{
    Block, CancelToken, Chain, ChainConfig, ChainStore, Decimal, Hash, LedgerError, Mempool,
    MempoolConfig, MineOutcome,
};
use ledger_storage::SledStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub(crate) struct NodeConfig {
    pub data_dir: PathBuf,
    pub chain: ChainConfig,
    pub mempool: MempoolConfig,
}

/// Pool changes caused by adopting an imported chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Imported {
    pub confirmed: usize,
    pub restored: usize,
}

/// Chain, mempool and store shared by the miner task and the command loop.
/// Blocking methods must run on the blocking pool.
pub(crate) struct Node {
    store: Arc<SledStore>,
    chain: Chain<SledStore>,
    pool: Mempool,
    cancel: CancelToken,
    stopping: AtomicBool,
}

impl Node {
    pub fn open(config: &NodeConfig) -> Result<Self> {
        let store = Arc::new(SledStore::open(&config.data_dir)?);
        let chain = Chain::open(Arc::clone(&store), config.chain.clone())?;
        let restored = store.load_pending()?;
        let pool = Mempool::from_transactions(config.mempool.clone(), restored);
        info!(
            height = chain.height(),
            pending = pool.size(),
            difficulty = chain.difficulty(),
            "node state loaded"
        );
        Ok(Self {
            store,
            chain,
            pool,
            cancel: CancelToken::new(),
            stopping: AtomicBool::new(false),
        })
    }

    pub fn chain(&self) -> &Chain<SledStore> {
        &self.chain
    }

    pub fn pool(&self) -> &Mempool {
        &self.pool
    }

    pub fn submit(&self, from: &str, to: &str, amount: Decimal) -> Result<Hash> {
        Ok(self.pool.submit(from, to, amount)?)
    }

    /// One mining round over everything pending. Blocking.
    pub fn mine_once(&self) -> Result<MineOutcome> {
        self.cancel.reset();
        // `stop` raises the flag before cancelling, so a stop racing the
        // reset above is seen either here or by the search.
        if self.stopping.load(Ordering::SeqCst) {
            return Ok(MineOutcome::Cancelled);
        }
        let outcome = self.chain.mine(&self.pool, &self.cancel);
        match &outcome {
            Ok(MineOutcome::Mined(block)) => {
                info!(index = block.index, hash = %block.hash_hex(), "mined block");
            }
            Ok(MineOutcome::Cancelled) | Err(LedgerError::StaleOrInvalidBlock(_)) => {
                // The head moved under us; requeued transactions may already be on it.
                let confirmed = self.pool.remove_confirmed(&self.chain.blocks());
                if confirmed > 0 {
                    info!(confirmed, "dropped requeued transactions already on chain");
                }
            }
            Ok(MineOutcome::NothingToMine) | Err(_) => {}
        }
        Ok(outcome?)
    }

    /// Adopts `candidate` when it is longer and valid and interrupts any
    /// search running against the old head. Transactions only the discarded
    /// blocks carried go back to the pool; pending ones the new chain
    /// confirms are pruned. Blocking.
    pub fn import(&self, candidate: Vec<Block>) -> Result<Imported> {
        let orphaned = self.chain.try_replace(candidate)?;
        self.cancel.cancel();
        let restored = orphaned.len();
        self.pool.requeue(orphaned);
        let confirmed = self.pool.remove_confirmed(&self.chain.blocks());
        info!(height = self.chain.height(), confirmed, restored, "imported chain");
        Ok(Imported { confirmed, restored })
    }

    /// Stops the current search and refuses new ones.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    /// Persists the pending pool and flushes the store.
    pub fn shutdown(&self) -> Result<()> {
        let pending = self.pool.snapshot();
        self.store.save_pending(&pending)?;
        self.store.close()?;
        if !pending.is_empty() {
            warn!(count = pending.len(), "pending transactions saved for next start");
        }
        Ok(())
    }
}
