//! Merkle commitment over a block's transactions.
//!
//! Leaves are the transaction hashes. Adjacent digests are paired left to
//! right; when a level has an odd count the last digest is promoted to the
//! next level unchanged rather than paired with a copy of itself.

use crate::hashing::{hash_pair, Hash, ZERO_HASH};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

pub fn merkle_root(txs: &[Transaction]) -> Hash {
    let leaves: Vec<Hash> = txs.iter().map(Transaction::hash).collect();
    merkle_root_from_leaves(&leaves)
}

/// Root over precomputed leaf digests; [`ZERO_HASH`] when there are none.
pub fn merkle_root_from_leaves(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return ZERO_HASH;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Sibling needed to climb one level of the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofStep {
    /// Sibling sits to the left of the running digest.
    Left(Hash),
    /// Sibling sits to the right of the running digest.
    Right(Hash),
}

/// Inclusion proof for one transaction. Levels where the node was promoted
/// contribute no step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    pub fn verify(&self, leaf: &Hash, root: &Hash) -> bool {
        let computed = self.steps.iter().fold(*leaf, |acc, step| match step {
            ProofStep::Left(sibling) => hash_pair(sibling, &acc),
            ProofStep::Right(sibling) => hash_pair(&acc, sibling),
        });
        computed == *root
    }

    pub fn verify_transaction(&self, tx: &Transaction, root: &Hash) -> bool {
        self.verify(&tx.hash(), root)
    }
}

pub fn merkle_proof(txs: &[Transaction], index: usize) -> Option<MerkleProof> {
    let leaves: Vec<Hash> = txs.iter().map(Transaction::hash).collect();
    merkle_proof_from_leaves(&leaves, index)
}

pub fn merkle_proof_from_leaves(leaves: &[Hash], index: usize) -> Option<MerkleProof> {
    if index >= leaves.len() {
        return None;
    }
    let mut steps = Vec::new();
    let mut level = leaves.to_vec();
    let mut position = index;
    while level.len() > 1 {
        if position % 2 == 1 {
            steps.push(ProofStep::Left(level[position - 1]));
        } else if let Some(right) = level.get(position + 1) {
            steps.push(ProofStep::Right(*right));
        }
        level = next_level(&level);
        position /= 2;
    }
    Some(MerkleProof {
        leaf_index: index,
        steps,
    })
}
