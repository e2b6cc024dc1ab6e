use crate::hashing::{serde_hex, sha256, Hash, ZERO_HASH};
use crate::merkle::merkle_root;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Bytes hashed for a block: index, timestamp, merkle root, previous hash, nonce.
pub const HEADER_BYTES_LEN: usize = 8 + 8 + 32 + 32 + 8;

/// One ledger entry. The JSON form is the persisted record
/// `{index, timestamp, transactions, prevHash, hash, merkleRoot, nonce}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    #[serde(with = "serde_hex")]
    pub prev_hash: Hash,
    #[serde(with = "serde_hex")]
    pub hash: Hash,
    #[serde(with = "serde_hex")]
    pub merkle_root: Hash,
    pub nonce: u64,
}

impl Block {
    /// Builds an unmined block: merkle root filled in, nonce 0, hash computed for nonce 0.
    pub fn candidate(index: u64, timestamp: u64, prev_hash: Hash, transactions: Vec<Transaction>) -> Self {
        let mut block = Self {
            index,
            timestamp,
            merkle_root: merkle_root(&transactions),
            transactions,
            prev_hash,
            hash: ZERO_HASH,
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_BYTES_LEN);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.merkle_root);
        bytes.extend_from_slice(&self.prev_hash);
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// Recomputes the hash from the block's fields; ignores the stored `hash`.
    pub fn compute_hash(&self) -> Hash {
        sha256(&self.header_bytes())
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}

/// The block hash as any verifier would compute it.
pub fn block_hash(block: &Block) -> Hash {
    block.compute_hash()
}
