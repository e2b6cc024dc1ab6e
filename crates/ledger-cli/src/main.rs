use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ledger_core::constants::{DEFAULT_DIFFICULTY, DEFAULT_MAX_PENDING};
use ledger_core::{
    import_json, CancelToken, Chain, ChainConfig, ChainStore, Decimal, Mempool, MempoolConfig,
    MineOutcome,
};
use ledger_storage::SledStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::{signal, task};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger")]
#[command(about = "Inspect and extend a local proof-of-work ledger")]
struct Cli {
    #[command(flatten)]
    opts: Options,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug, Clone)]
struct Options {
    /// Data directory for sled
    #[arg(long, global = true, env = "LEDGER_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,
    /// Leading hex zeros required of every mined block hash
    #[arg(long, global = true, env = "LEDGER_DIFFICULTY", default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,
    /// Mine a block even when no transactions are pending
    #[arg(long, global = true, env = "LEDGER_MINE_EMPTY")]
    mine_empty: bool,
    /// Search nonces on all cores
    #[arg(long, global = true, env = "LEDGER_PARALLEL")]
    parallel: bool,
    /// Pending transaction limit, 0 for none
    #[arg(long, global = true, env = "LEDGER_MAX_PENDING", default_value_t = DEFAULT_MAX_PENDING)]
    max_pending: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Queue a transaction for the next block
    Submit {
        /// Sender
        #[arg(long)]
        from: String,
        /// Recipient
        #[arg(long)]
        to: String,
        /// Decimal amount, e.g. 10.50
        #[arg(long)]
        amount: Decimal,
    },
    /// Mine every pending transaction into one block (Ctrl-C cancels)
    Mine,
    /// Print the head block
    Head,
    /// List blocks
    Blocks {
        /// Print full block records as JSON
        #[arg(long)]
        json: bool,
    },
    /// List pending transactions
    Pending,
    /// Re-verify the stored chain
    Verify,
    /// Write the chain as JSON
    Export { file: PathBuf },
    /// Adopt a JSON chain if it is longer and valid
    Import { file: PathBuf },
}

struct Ledger {
    store: Arc<SledStore>,
    chain: Arc<Chain<SledStore>>,
    pool: Arc<Mempool>,
}

impl Ledger {
    fn open(opts: &Options) -> Result<Self> {
        let store = Arc::new(SledStore::open(&opts.data_dir)?);
        let config = ChainConfig::with_difficulty(opts.difficulty)
            .mine_empty_blocks(opts.mine_empty)
            .parallel_mining(opts.parallel);
        let chain = Arc::new(Chain::open(Arc::clone(&store), config)?);
        let pool = Mempool::from_transactions(
            MempoolConfig {
                max_pending: opts.max_pending,
            },
            store.load_pending()?,
        );
        Ok(Self {
            store,
            chain,
            pool: Arc::new(pool),
        })
    }

    fn save_pending(&self) -> Result<()> {
        self.store.save_pending(&self.pool.snapshot())
    }

    fn close(&self) -> Result<()> {
        self.save_pending()?;
        self.store.close()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .pretty()
        .init();

    let cli = Cli::parse();
    run(cli.opts, cli.cmd).await
}

async fn run(opts: Options, cmd: Command) -> Result<()> {
    let ledger = Ledger::open(&opts)?;
    match cmd {
        Command::Submit { from, to, amount } => {
            let hash = ledger.pool.submit(&from, &to, amount)?;
            println!("queued {} ({} pending)", hex::encode(hash), ledger.pool.size());
        }
        Command::Mine => mine(&ledger).await?,
        Command::Head => {
            let head = ledger.chain.head();
            println!("height: {}", head.index);
            println!("hash:   {}", head.hash_hex());
            println!("txs:    {}", head.transactions.len());
        }
        Command::Blocks { json } => {
            if json {
                println!("{}", ledger.chain.export_json()?);
            } else {
                for block in ledger.chain.blocks() {
                    println!(
                        "{:>6}  {}  {:>4} tx  nonce {}",
                        block.index,
                        block.hash_hex(),
                        block.transactions.len(),
                        block.nonce
                    );
                }
            }
        }
        Command::Pending => {
            for tx in ledger.pool.snapshot() {
                println!(
                    "{}  {} -> {}  {}",
                    hex::encode(tx.hash()),
                    tx.sender,
                    tx.receiver,
                    tx.canonical_amount()
                );
            }
        }
        Command::Verify => {
            ledger.chain.verify()?;
            println!("ok: {} blocks", ledger.chain.len());
        }
        Command::Export { file } => {
            let json = ledger.chain.export_json()?;
            tokio::fs::write(&file, json)
                .await
                .with_context(|| format!("write {}", file.display()))?;
            println!("exported {} blocks to {}", ledger.chain.len(), file.display());
        }
        Command::Import { file } => {
            let json = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("read {}", file.display()))?;
            let candidate = import_json(&json)?;
            let orphaned = ledger.chain.try_replace(candidate)?;
            let restored = orphaned.len();
            ledger.pool.requeue(orphaned);
            let dropped = ledger.pool.remove_confirmed(&ledger.chain.blocks());
            println!(
                "adopted chain at height {} ({dropped} pending confirmed, {restored} restored to pool)",
                ledger.chain.height()
            );
        }
    }
    ledger.close()
}

async fn mine(ledger: &Ledger) -> Result<()> {
    let cancel = CancelToken::new();
    let mut search = {
        let chain = Arc::clone(&ledger.chain);
        let pool = Arc::clone(&ledger.pool);
        let cancel = cancel.clone();
        task::spawn_blocking(move || chain.mine(&pool, &cancel))
    };
    let outcome = tokio::select! {
        res = &mut search => res??,
        _ = signal::ctrl_c() => {
            info!("interrupt received, cancelling search");
            cancel.cancel();
            search.await??
        }
    };
    match outcome {
        MineOutcome::Mined(block) => println!(
            "mined block {} with {} tx: {}",
            block.index,
            block.transactions.len(),
            block.hash_hex()
        ),
        MineOutcome::NothingToMine => println!("nothing to mine"),
        MineOutcome::Cancelled => println!("cancelled, {} pending", ledger.pool.size()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    fn opts(dir: &std::path::Path) -> Options {
        Options {
            data_dir: dir.to_path_buf(),
            difficulty: 1,
            mine_empty: false,
            parallel: false,
            max_pending: 0,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_decimal_amount_and_global_flags() {
        let cli = Cli::try_parse_from([
            "ledger", "submit", "--from", "Alice", "--to", "Bob", "--amount", "10.50",
            "--difficulty", "3",
        ])
        .unwrap();
        assert_eq!(cli.opts.difficulty, 3);
        match cli.cmd {
            Command::Submit { amount, .. } => assert_eq!(amount, Decimal::new(1050, 2)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from(["ledger", "submit", "--from", "a", "--to", "b", "--amount", "ten"]).is_err());
    }

    #[tokio::test]
    async fn pending_survives_between_runs_and_mine_clears_it() -> Result<()> {
        let dir = tempdir()?;
        let opts = opts(dir.path());
        for (from, to) in [("Alice", "Bob"), ("Bob", "Charlie")] {
            run(
                opts.clone(),
                Command::Submit {
                    from: from.into(),
                    to: to.into(),
                    amount: Decimal::from(5u64),
                },
            )
            .await?;
        }
        {
            let ledger = Ledger::open(&opts)?;
            assert_eq!(ledger.pool.size(), 2);
        }
        run(opts.clone(), Command::Mine).await?;
        let ledger = Ledger::open(&opts)?;
        assert!(ledger.pool.is_empty());
        assert_eq!(ledger.chain.height(), 1);
        assert_eq!(ledger.chain.head().transactions.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn import_adopts_longer_export() -> Result<()> {
        let ours = tempdir()?;
        let theirs = tempdir()?;
        let file = theirs.path().join("chain.json");
        let their_opts = Options {
            mine_empty: true,
            ..opts(&theirs.path().join("db"))
        };
        run(their_opts.clone(), Command::Mine).await?;
        run(their_opts.clone(), Command::Mine).await?;
        run(their_opts, Command::Export { file: file.clone() }).await?;

        run(opts(ours.path()), Command::Import { file: file.clone() }).await?;
        let ledger = Ledger::open(&opts(ours.path()))?;
        assert_eq!(ledger.chain.height(), 2);

        // Same length again is not an improvement.
        drop(ledger);
        assert!(run(opts(ours.path()), Command::Import { file }).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn import_restores_transactions_of_replaced_blocks() -> Result<()> {
        let ours = tempdir()?;
        let theirs = tempdir()?;
        let file = theirs.path().join("chain.json");
        let their_opts = Options {
            mine_empty: true,
            ..opts(&theirs.path().join("db"))
        };
        for _ in 0..2 {
            run(their_opts.clone(), Command::Mine).await?;
        }
        run(their_opts, Command::Export { file: file.clone() }).await?;

        run(
            opts(ours.path()),
            Command::Submit {
                from: "Alice".into(),
                to: "Bob".into(),
                amount: Decimal::from(7u64),
            },
        )
        .await?;
        run(opts(ours.path()), Command::Mine).await?;
        run(opts(ours.path()), Command::Import { file }).await?;

        let ledger = Ledger::open(&opts(ours.path()))?;
        assert_eq!(ledger.chain.height(), 2);
        let pending = ledger.pool.snapshot();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sender, "Alice");
        Ok(())
    }
}
