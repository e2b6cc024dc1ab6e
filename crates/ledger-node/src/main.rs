mod commands;
mod node;

use anyhow::Context;
use clap::Parser;
use commands::{NodeCommand, USAGE};
use ledger_core::constants::{DEFAULT_DIFFICULTY, DEFAULT_MAX_PENDING};
use ledger_core::{import_json, ChainConfig, MempoolConfig, MineOutcome};
use node::{Node, NodeConfig};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tokio::{signal, task};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "ledger-node")]
#[command(about = "Long-running ledger node: background miner plus a stdin console")]
struct Args {
    /// Data directory for sled
    #[arg(long, env = "LEDGER_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Leading hex zeros required of every mined block hash
    #[arg(long, env = "LEDGER_DIFFICULTY", default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,

    /// Seconds between background mining rounds
    #[arg(long, env = "LEDGER_MINE_INTERVAL", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: u64,

    /// Mine blocks even when nothing is pending
    #[arg(long, env = "LEDGER_MINE_EMPTY")]
    mine_empty: bool,

    /// Search nonces on all cores
    #[arg(long, env = "LEDGER_PARALLEL")]
    parallel: bool,

    /// Pending transaction limit, 0 for none
    #[arg(long, env = "LEDGER_MAX_PENDING", default_value_t = DEFAULT_MAX_PENDING)]
    max_pending: usize,
}

impl Args {
    fn node_config(&self) -> NodeConfig {
        NodeConfig {
            data_dir: self.data_dir.clone(),
            chain: ChainConfig::with_difficulty(self.difficulty)
                .mine_empty_blocks(self.mine_empty)
                .parallel_mining(self.parallel),
            mempool: MempoolConfig {
                max_pending: self.max_pending,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let node = Arc::new(Node::open(&args.node_config())?);
    let (stop_tx, stop_rx) = watch::channel(false);
    let miner = tokio::spawn(miner_loop(
        Arc::clone(&node),
        Duration::from_secs(args.interval_secs),
        stop_rx,
    ));
    info!(interval_secs = args.interval_secs, "ledger-node running; {USAGE}");

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if !handle_line(&node, &line).await {
                        break;
                    }
                }
                None => {
                    info!("stdin closed; running until interrupted");
                    stdin_open = false;
                }
            },
            _ = signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
        }
    }

    let _ = stop_tx.send(true);
    node.stop();
    if let Err(e) = miner.await {
        error!(error = %e, "miner task failed");
    }
    let shutdown = Arc::clone(&node);
    task::spawn_blocking(move || shutdown.shutdown()).await??;
    info!("ledger-node stopped");
    Ok(())
}

async fn miner_loop(node: Arc<Node>, period: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.changed() => break,
        }
        let worker = Arc::clone(&node);
        match task::spawn_blocking(move || worker.mine_once()).await {
            Ok(Ok(MineOutcome::Mined(_) | MineOutcome::NothingToMine)) => {}
            Ok(Ok(MineOutcome::Cancelled)) => info!("mining round cancelled"),
            Ok(Err(e)) => warn!(error = %e, "mining round failed"),
            Err(e) => {
                error!(error = %e, "mining task panicked");
                break;
            }
        }
    }
}

/// Runs one console command. Returns false when the node should exit.
async fn handle_line(node: &Arc<Node>, line: &str) -> bool {
    let cmd = match line.parse::<NodeCommand>() {
        Ok(cmd) => cmd,
        Err(e) => {
            println!("error: {e}\n{USAGE}");
            return true;
        }
    };
    if cmd == NodeCommand::Quit {
        return false;
    }
    if let Err(e) = run_command(node, cmd).await {
        println!("error: {e:#}");
    }
    true
}

async fn run_command(node: &Arc<Node>, cmd: NodeCommand) -> anyhow::Result<()> {
    match cmd {
        NodeCommand::Submit { from, to, amount } => {
            let hash = node.submit(&from, &to, amount)?;
            println!("queued {} ({} pending)", hex::encode(hash), node.pool().size());
        }
        NodeCommand::Mine => {
            let worker = Arc::clone(node);
            match task::spawn_blocking(move || worker.mine_once()).await?? {
                MineOutcome::Mined(block) => println!(
                    "mined block {} with {} tx: {}",
                    block.index,
                    block.transactions.len(),
                    block.hash_hex()
                ),
                MineOutcome::NothingToMine => println!("nothing to mine"),
                MineOutcome::Cancelled => println!("cancelled"),
            }
        }
        NodeCommand::Head => {
            let head = node.chain().head();
            println!(
                "height {} hash {} pending {}",
                head.index,
                head.hash_hex(),
                node.pool().size()
            );
        }
        NodeCommand::Pending => {
            for tx in node.pool().snapshot() {
                println!(
                    "{}  {} -> {}  {}",
                    hex::encode(tx.hash()),
                    tx.sender,
                    tx.receiver,
                    tx.canonical_amount()
                );
            }
        }
        NodeCommand::Import(file) => {
            let json = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("read {}", file.display()))?;
            let candidate = import_json(&json)?;
            let worker = Arc::clone(node);
            let imported = task::spawn_blocking(move || worker.import(candidate)).await??;
            println!(
                "adopted chain at height {} ({} pending confirmed, {} restored to pool)",
                node.chain().height(),
                imported.confirmed,
                imported.restored
            );
        }
        NodeCommand::Quit => {}
    }
    Ok(())
}
