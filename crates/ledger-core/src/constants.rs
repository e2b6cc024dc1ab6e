pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Leading zero bits represented by one leading `'0'` hex character.
pub const BITS_PER_HEX_DIGIT: u32 = 4;
/// Largest difficulty expressible in hex digits of a 256-bit digest.
pub const MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;
pub const DEFAULT_DIFFICULTY: u32 = 2;
pub const GENESIS_DIFFICULTY: u32 = 0;
/// Fixed genesis timestamp (2024-01-01T00:00:00Z) so every node derives the same genesis block.
pub const GENESIS_TIMESTAMP: u64 = 1_704_067_200;
/// How many nonces the sequential miner tries between cancellation checks.
pub const CANCEL_POLL_INTERVAL: u64 = 1024;
pub const DEFAULT_MAX_PENDING: usize = 10_000;
