use crate::constants::{DEFAULT_DIFFICULTY, DEFAULT_MAX_PENDING, GENESIS_DIFFICULTY, MAX_DIFFICULTY};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Consensus and mining knobs for one chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading hex zeros every non-genesis block hash must carry.
    pub difficulty: u32,
    /// Leading hex zeros of the genesis hash. 0 keeps genesis at nonce 0.
    pub genesis_difficulty: u32,
    /// When false, mining an empty mempool reports `NothingToMine`.
    pub mine_empty_blocks: bool,
    /// Search nonces on the rayon pool instead of the calling thread.
    pub parallel_mining: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            genesis_difficulty: GENESIS_DIFFICULTY,
            mine_empty_blocks: false,
            parallel_mining: false,
        }
    }
}

impl ChainConfig {
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    pub fn mine_empty_blocks(mut self, yes: bool) -> Self {
        self.mine_empty_blocks = yes;
        self
    }

    pub fn parallel_mining(mut self, yes: bool) -> Self {
        self.parallel_mining = yes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("difficulty", self.difficulty),
            ("genesis_difficulty", self.genesis_difficulty),
        ] {
            if value > MAX_DIFFICULTY {
                return Err(LedgerError::InvalidConfig(format!(
                    "{name} {value} exceeds {MAX_DIFFICULTY} hex digits"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Upper bound on pending transactions; 0 disables the bound.
    pub max_pending: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ChainConfig::default();
        assert_eq!(cfg.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(cfg.genesis_difficulty, 0);
        assert!(!cfg.mine_empty_blocks);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_impossible_difficulty() {
        let cfg = ChainConfig::with_difficulty(MAX_DIFFICULTY + 1);
        assert!(matches!(cfg.validate(), Err(LedgerError::InvalidConfig(_))));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: ChainConfig = serde_json::from_str(r#"{"difficulty":1}"#).unwrap();
        assert_eq!(cfg, ChainConfig::with_difficulty(1));
        let pool: MempoolConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(pool.max_pending, DEFAULT_MAX_PENDING);
    }
}
