//! 32-byte hash values and the domain-separated hash functions used by
//! the sparse Merkle trees.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{Result, WalletError};

const LEAF_PREFIX: u8 = 0x01;
const NODE_PREFIX: u8 = 0x02;
const STATE_PREFIX: u8 = 0x03;
const INDEX_PREFIX: u8 = 0x04;

/// A SHA-256 output.
///
/// Serialized as lowercase hex in human-readable formats (JSON) and as raw
/// bytes otherwise (bincode).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The all-zero hash, used as the empty leaf.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// SHA-256 over the concatenation of `parts`.
    pub fn digest(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes =
            hex::decode(s).map_err(|e| WalletError::SerializationError(format!("hash hex: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| WalletError::SerializationError("hash must be 32 bytes".into()))?;
        Ok(Self(arr))
    }

    /// First eight bytes read as a big-endian integer.
    pub fn prefix_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[..8]);
        u64::from_be_bytes(buf)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct HashVisitor;

        impl<'de> Visitor<'de> for HashVisitor {
            type Value = Hash;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 32-byte hash as hex string or bytes")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Hash, E> {
                Hash::from_hex(v).map_err(E::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Hash, E> {
                let arr: [u8; 32] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(Hash(arr))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Hash, E> {
                self.visit_bytes(&v)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(HashVisitor)
        } else {
            deserializer.deserialize_bytes(HashVisitor)
        }
    }
}

/// Hash of a populated leaf: `H(0x01 || key_be || value)`.
pub fn hash_leaf(key: u64, value: &Hash) -> Hash {
    Hash::digest(&[&[LEAF_PREFIX], &key.to_be_bytes(), value.as_bytes()])
}

/// Hash of an inner node: `H(0x02 || left || right)`.
pub fn hash_node(left: &Hash, right: &Hash) -> Hash {
    Hash::digest(&[&[NODE_PREFIX], left.as_bytes(), right.as_bytes()])
}

/// Identity state: `H(0x03 || claims_root || revocation_root || roots_root)`.
pub fn hash_state(claims_root: &Hash, revocation_root: &Hash, roots_root: &Hash) -> Hash {
    Hash::digest(&[
        &[STATE_PREFIX],
        claims_root.as_bytes(),
        revocation_root.as_bytes(),
        roots_root.as_bytes(),
    ])
}

/// Leaf index of `key` in a tree of the given depth: `H(key) mod 2^depth`.
///
/// Pure function of its inputs, so independent processes always agree on
/// where a nonce lands.
pub fn leaf_index(key: u64, depth: u8) -> u64 {
    let h = Hash::digest(&[&[INDEX_PREFIX], &key.to_be_bytes()]).prefix_u64();
    h & index_mask(depth)
}

/// Mask selecting the low `depth` bits.
pub fn index_mask(depth: u8) -> u64 {
    if depth >= 64 {
        u64::MAX
    } else {
        (1u64 << depth) - 1
    }
}

/// Hashes of empty subtrees, indexed by height (0 = empty leaf).
pub fn empty_hashes(depth: u8) -> Vec<Hash> {
    let mut out = Vec::with_capacity(depth as usize + 1);
    out.push(Hash::ZERO);
    for h in 1..=depth as usize {
        let below = out[h - 1];
        out.push(hash_node(&below, &below));
    }
    out
}
