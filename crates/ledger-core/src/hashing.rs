//! SHA-256 helpers shared by block hashing and the Merkle tree.

use crate::constants::HASH_SIZE;
use sha2::{Digest, Sha256};

pub type Hash = [u8; HASH_SIZE];

/// All-zero digest: the genesis `prev_hash` and the Merkle root of an empty block.
pub const ZERO_HASH: Hash = [0u8; HASH_SIZE];

pub fn sha256(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

/// Parent digest of two Merkle children: `SHA-256(left || right)`.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

/// Appends a u64 length prefix followed by the bytes, so adjacent
/// variable-length fields cannot run into each other.
pub(crate) fn put_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Serde adapter writing a [`Hash`] as a lowercase hex string.
pub mod serde_hex {
    use super::Hash;
    use crate::constants::HASH_HEX_SIZE;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.len() != HASH_HEX_SIZE {
            return Err(D::Error::custom(format!(
                "expected {HASH_HEX_SIZE} hex characters, got {}",
                s.len()
            )));
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(&s, &mut out).map_err(D::Error::custom)?;
        Ok(out)
    }
}

/// Serde adapter for an optional byte blob carried as hex.
pub mod serde_hex_opt {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| hex::decode(s).map_err(D::Error::custom)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_pair_is_not_commutative() {
        let a = sha256(b"a");
        let b = sha256(b"b");
        assert_ne!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn hash_pair_matches_concatenation() {
        let a = sha256(b"left");
        let b = sha256(b"right");
        let mut joined = a.to_vec();
        joined.extend_from_slice(&b);
        assert_eq!(hash_pair(&a, &b), sha256(&joined));
    }

    #[test]
    fn length_prefix_separates_fields() {
        let mut one = Vec::new();
        put_length_prefixed(&mut one, b"ab");
        put_length_prefixed(&mut one, b"c");
        let mut two = Vec::new();
        put_length_prefixed(&mut two, b"a");
        put_length_prefixed(&mut two, b"bc");
        assert_ne!(one, two);
    }
}
