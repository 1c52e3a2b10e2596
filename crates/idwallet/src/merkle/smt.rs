//! Fixed-depth sparse Merkle tree.
//!
//! Leaves sit at height 0 and are addressed by `leaf_index(key, depth)`.
//! Only non-empty nodes are stored; everything else hashes to the
//! precomputed empty subtree for its height. Insertion rehashes a single
//! root-to-leaf path, so updates are O(depth).

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WalletError};

use super::hash::{empty_hashes, hash_leaf, hash_node, index_mask, leaf_index, Hash};
use super::proof::MerkleProof;

/// Largest supported depth: leaf indices are `u64`.
pub const MAX_DEPTH: u8 = 64;

/// A populated leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    /// Entry key (a revocation nonce, or a root prefix in the roots tree).
    pub key: u64,
    /// Entry value hash.
    pub value: Hash,
}

impl Leaf {
    pub fn hash(&self) -> Hash {
        hash_leaf(self.key, &self.value)
    }
}

/// Outcome of checking whether an entry can be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The leaf is empty; inserting will change the root.
    Vacant(u64),
    /// The identical entry is already present; inserting is a no-op.
    Occupied(u64),
}

/// A node exported for publication to a node mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Middle { hash: Hash, left: Hash, right: Hash },
    Leaf { hash: Hash, key: u64, value: Hash },
    State {
        hash: Hash,
        claims_root: Hash,
        revocation_root: Hash,
        roots_root: Hash,
    },
}

impl TreeNode {
    /// Hash this node is addressed by.
    pub fn hash(&self) -> Hash {
        match self {
            Self::Middle { hash, .. } | Self::Leaf { hash, .. } | Self::State { hash, .. } => *hash,
        }
    }
}

/// A sparse Merkle tree of fixed depth.
#[derive(Debug, Clone)]
pub struct SparseMerkleTree {
    name: &'static str,
    depth: u8,
    leaves: BTreeMap<u64, Leaf>,
    /// Non-empty node hashes keyed by `(height, position)`.
    nodes: HashMap<(u8, u64), Hash>,
    empty: Vec<Hash>,
}

impl SparseMerkleTree {
    /// Create an empty tree. `name` appears in collision errors.
    pub fn new(name: &'static str, depth: u8) -> Result<Self> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(WalletError::InvalidConfig(format!(
                "tree depth must be within 1..={MAX_DEPTH}, got {depth}"
            )));
        }
        Ok(Self {
            name,
            depth,
            leaves: BTreeMap::new(),
            nodes: HashMap::new(),
            empty: empty_hashes(depth),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Number of populated leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn root(&self) -> Hash {
        self.node(self.depth, 0)
    }

    /// Hash of an empty tree of this depth.
    pub fn empty_root(&self) -> Hash {
        self.empty[self.depth as usize]
    }

    /// Leaf index for `key`.
    pub fn index_of(&self, key: u64) -> u64 {
        leaf_index(key, self.depth)
    }

    /// The leaf stored at `index`, if any.
    pub fn leaf_at(&self, index: u64) -> Option<&Leaf> {
        self.leaves.get(&(index & index_mask(self.depth)))
    }

    /// Whether `key` is present (regardless of value).
    pub fn contains_key(&self, key: u64) -> bool {
        self.leaf_at(self.index_of(key))
            .map(|l| l.key == key)
            .unwrap_or(false)
    }

    /// Check where `(key, value)` would land without mutating anything.
    ///
    /// Fails with `ClaimCollision` if the target leaf holds a different entry.
    pub fn check(&self, key: u64, value: &Hash) -> Result<Slot> {
        let index = self.index_of(key);
        match self.leaves.get(&index) {
            None => Ok(Slot::Vacant(index)),
            Some(leaf) if leaf.key == key && leaf.value == *value => Ok(Slot::Occupied(index)),
            Some(_) => Err(WalletError::ClaimCollision {
                tree: self.name,
                index,
            }),
        }
    }

    /// Insert an entry. Returns the leaf index and whether the tree changed.
    pub fn insert(&mut self, key: u64, value: Hash) -> Result<(u64, bool)> {
        let index = match self.check(key, &value)? {
            Slot::Occupied(index) => return Ok((index, false)),
            Slot::Vacant(index) => index,
        };
        let leaf = Leaf { key, value };
        self.leaves.insert(index, leaf);
        self.nodes.insert((0, index), leaf.hash());

        let mut pos = index;
        for height in 1..=self.depth {
            pos >>= 1;
            let left = self.node(height - 1, pos << 1);
            let right = self.node(height - 1, (pos << 1) | 1);
            self.nodes.insert((height, pos), hash_node(&left, &right));
        }
        Ok((index, true))
    }

    /// Root the tree would have after inserting `(key, value)` into a vacant
    /// leaf. Does not check for collisions.
    pub fn root_after_insert(&self, key: u64, value: &Hash) -> Hash {
        let index = self.index_of(key);
        let mut current = hash_leaf(key, value);
        for height in 0..self.depth {
            let sibling = self.node(height, (index >> height) ^ 1);
            current = if (index >> height) & 1 == 0 {
                hash_node(&current, &sibling)
            } else {
                hash_node(&sibling, &current)
            };
        }
        current
    }

    /// Proof for the leaf position at `index`.
    ///
    /// `existence` is true when any leaf occupies the position.
    pub fn prove_index(&self, index: u64) -> MerkleProof {
        let index = index & index_mask(self.depth);
        let leaf = self.leaves.get(&index).copied();
        MerkleProof {
            depth: self.depth,
            index,
            existence: leaf.is_some(),
            leaf,
            siblings: self.siblings(index),
            root: self.root(),
        }
    }

    /// Proof of presence or absence of `key`.
    ///
    /// `existence` is true only when the leaf at the key's index belongs to
    /// `key`; a foreign leaf is carried along as the auxiliary node.
    pub fn prove_key(&self, key: u64) -> MerkleProof {
        let index = self.index_of(key);
        let leaf = self.leaves.get(&index).copied();
        MerkleProof {
            depth: self.depth,
            index,
            existence: leaf.map(|l| l.key == key).unwrap_or(false),
            leaf,
            siblings: self.siblings(index),
            root: self.root(),
        }
    }

    /// Iterate populated leaves in index order.
    pub fn leaves(&self) -> impl Iterator<Item = (&u64, &Leaf)> {
        self.leaves.iter()
    }

    /// Export every non-empty node so a mirror can serve proofs.
    pub fn export_nodes(&self) -> Vec<TreeNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for (&(height, pos), &hash) in &self.nodes {
            if height == 0 {
                if let Some(leaf) = self.leaves.get(&pos) {
                    out.push(TreeNode::Leaf {
                        hash,
                        key: leaf.key,
                        value: leaf.value,
                    });
                }
            } else {
                out.push(TreeNode::Middle {
                    hash,
                    left: self.node(height - 1, pos << 1),
                    right: self.node(height - 1, (pos << 1) | 1),
                });
            }
        }
        out
    }

    fn node(&self, height: u8, pos: u64) -> Hash {
        self.nodes
            .get(&(height, pos))
            .copied()
            .unwrap_or(self.empty[height as usize])
    }

    fn siblings(&self, index: u64) -> Vec<Hash> {
        (0..self.depth)
            .map(|height| self.node(height, (index >> height) ^ 1))
            .collect()
    }
}
