use crate::block::Block;
use crate::config::ChainConfig;
use crate::constants::{GENESIS_TIMESTAMP, MAX_DIFFICULTY};
use crate::error::{LedgerError, Result};
use crate::fork::{check_candidate, check_genesis, check_length};
use crate::hashing::{Hash, ZERO_HASH};
use crate::mempool::Mempool;
use crate::mine::mine_block_parallel;
use crate::pow::{meets_difficulty, mine_block, CancelToken, MiningOutcome};
use crate::store::{ChainStore, MemoryStore};
use crate::transaction::Transaction;
use crate::validation::{check_unconfirmed, is_valid_block, validate_block, validate_chain};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one [`Chain::mine`] attempt that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MineOutcome {
    /// The block was appended and is the new head.
    Mined(Block),
    /// The pool was empty and empty blocks are disabled.
    NothingToMine,
    /// The token fired; drained transactions went back to the pool.
    Cancelled,
}

/// Blocks plus the hashes of every transaction they carry.
struct History {
    blocks: Vec<Block>,
    confirmed: HashSet<Hash>,
}

impl History {
    fn new(blocks: Vec<Block>) -> Self {
        let confirmed = transaction_hashes(&blocks);
        Self { blocks, confirmed }
    }
}

fn transaction_hashes(blocks: &[Block]) -> HashSet<Hash> {
    blocks
        .iter()
        .flat_map(|b| b.transactions.iter().map(Transaction::hash))
        .collect()
}

/// The accepted history: an append-only, fully validated block sequence in
/// which no transaction appears twice.
///
/// Appends and replacements serialize on one write lock and go through the
/// [`ChainStore`] before the in-memory head moves, so a store failure leaves
/// both untouched.
pub struct Chain<S: ChainStore> {
    history: RwLock<History>,
    store: Arc<S>,
    genesis: Block,
    config: ChainConfig,
}

impl Chain<MemoryStore> {
    pub fn in_memory(config: ChainConfig) -> Result<Self> {
        Self::open(Arc::new(MemoryStore::new()), config)
    }
}

impl<S: ChainStore> Chain<S> {
    /// Loads and re-verifies whatever `store` holds, or writes the genesis
    /// block into an empty store.
    pub fn open(store: Arc<S>, config: ChainConfig) -> Result<Self> {
        config.validate()?;
        let genesis = genesis_block(config.genesis_difficulty);
        let mut blocks = store.load_blocks()?;
        if blocks.is_empty() {
            store.put_block(&genesis)?;
            blocks.push(genesis.clone());
            info!(hash = %genesis.hash_hex(), "wrote genesis block");
        } else {
            check_genesis(&genesis, &blocks[0])?;
            validate_chain(&blocks, &config)?;
            info!(height = blocks.len() - 1, "loaded chain from store");
        }
        Ok(Self {
            history: RwLock::new(History::new(blocks)),
            store,
            genesis,
            config,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn genesis(&self) -> &Block {
        &self.genesis
    }

    pub fn head(&self) -> Block {
        self.history
            .read()
            .blocks
            .last()
            .cloned()
            .unwrap_or_else(|| self.genesis.clone())
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.history.read().blocks.clone()
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        self.history.read().blocks.get(index as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.history.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the head block.
    pub fn height(&self) -> u64 {
        self.head().index
    }

    /// Whether a transaction with this hash is already on the chain.
    pub fn is_confirmed(&self, tx_hash: &Hash) -> bool {
        self.history.read().confirmed.contains(tx_hash)
    }

    /// Checks `candidate` against `prev` under the active difficulty.
    pub fn validate(&self, candidate: &Block, prev: &Block) -> bool {
        is_valid_block(candidate, prev, self.config.difficulty)
    }

    /// Re-verifies the whole local chain.
    pub fn verify(&self) -> Result<()> {
        let history = self.history.read();
        validate_chain(&history.blocks, &self.config)?;
        Ok(())
    }

    /// Appends `candidate` if it extends the current head and confirms no
    /// transaction twice. A block mined against an older head fails with
    /// `StaleOrInvalidBlock`; re-mine it.
    pub fn append(&self, candidate: Block) -> Result<()> {
        let mut history = self.history.write();
        let head = history.blocks.last().unwrap_or(&self.genesis);
        let checked = validate_block(&candidate, head, self.config.difficulty)
            .and_then(|()| check_unconfirmed(&candidate, &history.confirmed));
        if let Err(reason) = checked {
            warn!(index = candidate.index, %reason, "rejected block");
            return Err(reason.into());
        }
        self.store.put_block(&candidate)?;
        info!(
            index = candidate.index,
            txs = candidate.transactions.len(),
            hash = %candidate.hash_hex(),
            "appended block"
        );
        history
            .confirmed
            .extend(candidate.transactions.iter().map(Transaction::hash));
        history.blocks.push(candidate);
        Ok(())
    }

    /// Drains the pool, mines a block over its contents at the active
    /// difficulty and appends it.
    pub fn mine(&self, mempool: &Mempool, cancel: &CancelToken) -> Result<MineOutcome> {
        self.mine_with_difficulty(mempool, self.config.difficulty, cancel)
    }

    /// As [`Chain::mine`] with a caller-chosen difficulty, which may not be
    /// below the active one. Drained transactions that are already on the
    /// chain are discarded. The rest go back to the pool when the search is
    /// cancelled or the block loses the append race.
    pub fn mine_with_difficulty(
        &self,
        mempool: &Mempool,
        difficulty: u32,
        cancel: &CancelToken,
    ) -> Result<MineOutcome> {
        if difficulty < self.config.difficulty || difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidConfig(format!(
                "mining difficulty {difficulty} outside {}..={MAX_DIFFICULTY}",
                self.config.difficulty
            )));
        }
        let txs = self.without_confirmed(mempool.drain_all());
        if txs.is_empty() && !self.config.mine_empty_blocks {
            debug!("nothing to mine");
            return Ok(MineOutcome::NothingToMine);
        }

        let head = self.head();
        let outcome = if self.config.parallel_mining {
            mine_block_parallel(&head, txs.clone(), difficulty, cancel)
        } else {
            mine_block(&head, txs.clone(), difficulty, cancel)
        };

        match outcome {
            MiningOutcome::Cancelled => {
                mempool.requeue(txs);
                Ok(MineOutcome::Cancelled)
            }
            MiningOutcome::Found(block) => match self.append(block.clone()) {
                Ok(()) => Ok(MineOutcome::Mined(block)),
                Err(e) => {
                    mempool.requeue(txs);
                    Err(e)
                }
            },
        }
    }

    fn without_confirmed(&self, txs: Vec<Transaction>) -> Vec<Transaction> {
        let history = self.history.read();
        let before = txs.len();
        let fresh: Vec<Transaction> = txs
            .into_iter()
            .filter(|tx| !history.confirmed.contains(&tx.hash()))
            .collect();
        if fresh.len() < before {
            debug!(dropped = before - fresh.len(), "discarded already confirmed transactions");
        }
        fresh
    }

    /// Adopts `candidate` if it is a strictly longer, fully valid chain on the
    /// same genesis. Returns whether the local chain was replaced.
    pub fn replace(&self, candidate: Vec<Block>) -> bool {
        match self.try_replace(candidate) {
            Ok(_) => true,
            Err(e) => {
                warn!(reason = %e, "candidate chain rejected");
                false
            }
        }
    }

    /// [`Chain::replace`] with the rejection reason. All-or-nothing.
    ///
    /// On success returns the transactions of the discarded local blocks that
    /// the adopted chain does not carry, in chain order, so the caller can
    /// hand them back to its mempool.
    pub fn try_replace(&self, candidate: Vec<Block>) -> Result<Vec<Transaction>> {
        // Validation is pure, so run it before taking the write lock.
        check_candidate(&self.genesis, self.len(), &candidate, &self.config)?;

        let mut history = self.history.write();
        // The local chain may have grown while we validated.
        check_length(history.blocks.len(), candidate.len())?;
        self.store.replace_blocks(&candidate)?;
        let adopted = History::new(candidate);
        let orphaned: Vec<Transaction> = history
            .blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .filter(|tx| !adopted.confirmed.contains(&tx.hash()))
            .cloned()
            .collect();
        info!(
            old_height = history.blocks.len() - 1,
            new_height = adopted.blocks.len() - 1,
            orphaned = orphaned.len(),
            "replaced chain"
        );
        *history = adopted;
        Ok(orphaned)
    }

    /// Pretty JSON array of persisted block records.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.history.read().blocks)?)
    }
}

/// Parses a chain exported by [`Chain::export_json`]. No validation happens
/// here; hand the result to [`Chain::replace`].
pub fn import_json(json: &str) -> Result<Vec<Block>> {
    Ok(serde_json::from_str(json)?)
}

/// The deterministic genesis block: fixed timestamp, no transactions, zero
/// previous hash, smallest nonce meeting `difficulty`.
pub fn genesis_block(difficulty: u32) -> Block {
    let mut genesis = Block::candidate(0, GENESIS_TIMESTAMP, ZERO_HASH, vec![]);
    while !meets_difficulty(&genesis.hash, difficulty) {
        genesis.nonce += 1;
        genesis.hash = genesis.compute_hash();
    }
    genesis
}
