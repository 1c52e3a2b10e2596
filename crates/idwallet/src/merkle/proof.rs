//! Merkle proofs over a [`SparseMerkleTree`](super::smt::SparseMerkleTree).

use serde::{Deserialize, Serialize};

use crate::error::{Result, WalletError};

use super::hash::{hash_node, index_mask, leaf_index, Hash};
use super::smt::{Leaf, MAX_DEPTH};

/// A path proof for one leaf position.
///
/// `siblings` are ordered bottom-up: `siblings[0]` is the neighbour of the
/// leaf, the last entry is a child of the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    /// True when the proven key is present.
    pub existence: bool,
    pub depth: u8,
    pub index: u64,
    pub siblings: Vec<Hash>,
    /// Root of the tree at the time the proof was produced.
    pub root: Hash,
    /// The leaf occupying `index`. For an exclusion proof this is the
    /// auxiliary leaf of a different key, or `None` for an empty slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf: Option<Leaf>,
}

impl MerkleProof {
    /// Recompute the root implied by the path. Index bits above 64 read
    /// as zero.
    pub fn compute_root(&self) -> Hash {
        let mut current = self.leaf.map(|l| l.hash()).unwrap_or(Hash::ZERO);
        for (height, sibling) in self.siblings.iter().enumerate() {
            let bit = u32::try_from(height)
                .ok()
                .and_then(|h| self.index.checked_shr(h))
                .unwrap_or(0);
            current = if bit & 1 == 0 {
                hash_node(&current, sibling)
            } else {
                hash_node(sibling, &current)
            };
        }
        current
    }

    /// Check the proof against `root` for `key`.
    ///
    /// With `Some(value)` this verifies inclusion of `(key, value)`; with
    /// `None` it verifies that `key` is absent.
    pub fn verify(&self, root: &Hash, key: u64, value: Option<&Hash>) -> bool {
        if self.depth == 0
            || self.depth > MAX_DEPTH
            || self.siblings.len() != self.depth as usize
            || self.index & !index_mask(self.depth) != 0
            || self.index != leaf_index(key, self.depth)
            || self.compute_root() != *root
        {
            return false;
        }
        match (value, self.leaf) {
            (Some(value), Some(leaf)) => {
                self.existence && leaf.key == key && leaf.value == *value
            }
            (Some(_), None) => false,
            (None, Some(leaf)) => !self.existence && leaf.key != key,
            (None, None) => !self.existence,
        }
    }

    /// [`verify`](Self::verify) as a `Result`, for `?` chains.
    pub fn ensure(&self, root: &Hash, key: u64, value: Option<&Hash>) -> Result<()> {
        if self.verify(root, key, value) {
            Ok(())
        } else {
            let what = if value.is_some() { "inclusion" } else { "exclusion" };
            Err(WalletError::InvalidProof(format!(
                "{what} proof for key {key} does not verify against root {root}"
            )))
        }
    }

    /// Whether the proof reports `key` as present. Used by resolvers once
    /// the proof has been verified against the expected root.
    pub fn includes(&self, key: u64) -> bool {
        self.existence && self.leaf.map(|l| l.key == key).unwrap_or(false)
    }
}
