#![allow(dead_code)]

use std::fs;

use ledger_core::{pow::mine_block, Block, CancelToken, Decimal, Transaction};
use ledger_storage::SledStore;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledStore) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (
        temp_dir,
        SledStore::open(&db_path).expect("Failed to open SledStore"),
    )
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}

/// Mines `n` blocks at difficulty 1 on top of `prev`, one transaction each.
pub fn mine_on(prev: &Block, n: u64) -> Vec<Block> {
    let mut out = Vec::new();
    let mut prev = prev.clone();
    for i in 0..n {
        let tx = Transaction::with_timestamp("alice", "bob", Decimal::from(i + 1), 1_600_000_000 + i);
        let block = mine_block(&prev, vec![tx], 1, &CancelToken::new())
            .block()
            .expect("uncancelled mining finds a block");
        out.push(block.clone());
        prev = block;
    }
    out
}
