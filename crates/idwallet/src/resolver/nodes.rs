//! Tree node mirrors and the proof walk over them.
//!
//! Issuers push the nodes of their revocation tree (plus the state node that
//! links a state hash to its sub-roots) to one or more mirrors. A holder can
//! then rebuild a non-revocation proof for any nonce from the state hash
//! alone, without asking the issuer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;

use crate::error::{Result, WalletError};
use crate::merkle::hash::{empty_hashes, hash_leaf, hash_node, leaf_index};
use crate::merkle::{Hash, Leaf, MerkleProof, TreeNode, TreeState};

/// Read side of a node mirror.
#[async_trait]
pub trait NodeSource: Send + Sync {
    /// The node addressed by `hash`, if the mirror has it.
    async fn node(&self, hash: &Hash) -> Result<Option<TreeNode>>;
}

/// Write side of a node mirror.
#[async_trait]
pub trait NodePublisher: Send + Sync {
    async fn publish(&self, nodes: &[TreeNode]) -> Result<()>;
}

// ── InMemoryRhs ──────────────────────────────────────────────────────────────

/// In-process reverse hash service.
#[derive(Default)]
pub struct InMemoryRhs {
    nodes: RwLock<HashMap<Hash, TreeNode>>,
    offline: AtomicBool,
    latency_ms: AtomicU64,
}

impl InMemoryRhs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    async fn reachable(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(WalletError::RhsUnreachable("reverse hash service offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeSource for InMemoryRhs {
    async fn node(&self, hash: &Hash) -> Result<Option<TreeNode>> {
        self.reachable().await?;
        Ok(self.nodes.read().await.get(hash).cloned())
    }
}

#[async_trait]
impl NodePublisher for InMemoryRhs {
    async fn publish(&self, nodes: &[TreeNode]) -> Result<()> {
        self.reachable().await?;
        let mut map = self.nodes.write().await;
        for node in nodes {
            map.insert(node.hash(), node.clone());
        }
        debug!("rhs stored {} nodes ({} total)", nodes.len(), map.len());
        Ok(())
    }
}

// ── Walk ─────────────────────────────────────────────────────────────────────

async fn fetch(source: &dyn NodeSource, hash: &Hash) -> Result<TreeNode> {
    source
        .node(hash)
        .await?
        .ok_or_else(|| WalletError::Storage(format!("node {hash} not published")))
}

/// Rebuild the proof for `nonce` in the revocation tree of `state`.
///
/// Every fetched node is rehashed, so a mirror can withhold nodes but
/// cannot forge them.
pub async fn walk_proof(
    source: &dyn NodeSource,
    state: &Hash,
    nonce: u64,
    depth: u8,
) -> Result<(TreeState, MerkleProof)> {
    let tree_state = match fetch(source, state).await? {
        TreeNode::State {
            hash,
            claims_root,
            revocation_root,
            roots_root,
        } => {
            let ts = TreeState::from_roots(claims_root, revocation_root, roots_root);
            if ts.value != hash || hash != *state {
                return Err(WalletError::InvalidProof(format!(
                    "state node {state} does not hash to its sub-roots"
                )));
            }
            ts
        }
        _ => {
            return Err(WalletError::InvalidProof(format!(
                "node {state} is not a state node"
            )))
        }
    };

    let empty = empty_hashes(depth);
    let index = leaf_index(nonce, depth);
    let mut current = tree_state.revocation_tree_root;
    // Top-down while walking, reversed at the end.
    let mut siblings = Vec::with_capacity(depth as usize);
    let mut height = depth;

    while height > 0 && current != empty[height as usize] {
        let (left, right) = match fetch(source, &current).await? {
            TreeNode::Middle { hash, left, right } if hash == current && hash_node(&left, &right) == hash => {
                (left, right)
            }
            _ => {
                return Err(WalletError::InvalidProof(format!(
                    "bad middle node {current} at height {height}"
                )))
            }
        };
        if (index >> (height - 1)) & 1 == 0 {
            siblings.push(right);
            current = left;
        } else {
            siblings.push(left);
            current = right;
        }
        height -= 1;
    }

    let leaf = if height > 0 {
        // Reached an empty subtree: every sibling below is empty too.
        for h in (0..height).rev() {
            siblings.push(empty[h as usize]);
        }
        None
    } else if current == Hash::ZERO {
        None
    } else {
        match fetch(source, &current).await? {
            TreeNode::Leaf { hash, key, value } if hash == current && hash_leaf(key, &value) == hash => {
                Some(Leaf { key, value })
            }
            _ => {
                return Err(WalletError::InvalidProof(format!("bad leaf node {current}")))
            }
        }
    };
    siblings.reverse();

    let proof = MerkleProof {
        existence: leaf.map(|l| l.key == nonce).unwrap_or(false),
        depth,
        index,
        siblings,
        root: tree_state.revocation_tree_root,
        leaf,
    };
    Ok((tree_state, proof))
}
