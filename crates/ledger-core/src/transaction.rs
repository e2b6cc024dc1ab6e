use crate::error::{LedgerError, Result};
use crate::hashing::{put_length_prefixed, serde_hex_opt, sha256, Hash};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// A value transfer between two opaque identifiers.
///
/// The identity of a transaction is [`Transaction::hash`], computed over
/// sender, receiver, amount and timestamp. The optional signature signs those
/// same bytes and is therefore not part of the identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    #[serde(with = "serde_decimal")]
    pub amount: Decimal,
    pub timestamp: u64,
    #[serde(default, with = "serde_hex_opt")]
    pub signature: Option<Vec<u8>>,
}

impl Transaction {
    /// Creates an unsigned transaction stamped with the current time.
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: Decimal) -> Self {
        Self::with_timestamp(sender, receiver, amount, unix_now())
    }

    pub fn with_timestamp(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: Decimal,
        timestamp: u64,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            timestamp,
            signature: None,
        }
    }

    pub fn signed(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Amount in its canonical textual form: no trailing zeros, no negative zero.
    pub fn canonical_amount(&self) -> String {
        if self.amount.is_zero() {
            "0".to_string()
        } else {
            self.amount.normalize().to_string()
        }
    }

    /// Canonical hash input: length-prefixed sender, receiver and amount
    /// string, then the timestamp as little-endian u64.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let amount = self.canonical_amount();
        let mut bytes =
            Vec::with_capacity(8 * 4 + self.sender.len() + self.receiver.len() + amount.len());
        put_length_prefixed(&mut bytes, self.sender.as_bytes());
        put_length_prefixed(&mut bytes, self.receiver.as_bytes());
        put_length_prefixed(&mut bytes, amount.as_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes
    }

    pub fn hash(&self) -> Hash {
        sha256(&self.canonical_bytes())
    }

    /// Rejects negative amounts and blank identifiers.
    pub fn validate(&self) -> Result<()> {
        if self.sender.trim().is_empty() {
            return Err(LedgerError::InvalidTransaction("sender is empty".into()));
        }
        if self.receiver.trim().is_empty() {
            return Err(LedgerError::InvalidTransaction("receiver is empty".into()));
        }
        if self.amount < Decimal::ZERO {
            return Err(LedgerError::InvalidTransaction(format!(
                "amount {} is negative",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Decimals travel as strings so both JSON and bincode keep every digit.
mod serde_decimal {
    use rust_decimal::Decimal;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let s = String::deserialize(deserializer)?;
        Decimal::from_str(&s).map_err(D::Error::custom)
    }
}
