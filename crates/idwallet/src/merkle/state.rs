//! Per-identity state: the claims, revocation and roots trees.
//!
//! `state = H(claimsRoot || revocationRoot || rootsRoot)`. Every claim
//! insertion also inserts the resulting claims root into the roots tree, so
//! the three sub-roots always move together. All mutations are appended to
//! a history log that [`IdentityStateTree::replay`] turns back into the
//! same state.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::claim::Claim;
use crate::error::{Result, WalletError};

use super::hash::{hash_state, Hash};
use super::proof::MerkleProof;
use super::smt::{Slot, SparseMerkleTree, TreeNode};

/// Depth used when no configuration says otherwise.
pub const DEFAULT_TREE_DEPTH: u8 = 40;

/// How revoking an already revoked nonce is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationPolicy {
    /// Revoking twice succeeds without changing the tree.
    #[default]
    Idempotent,
    /// Revoking twice fails with `AlreadyRevoked`.
    Strict,
}

/// The three sub-roots and the state hash derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeState {
    pub claims_tree_root: Hash,
    pub revocation_tree_root: Hash,
    pub root_of_roots: Hash,
    /// `H(claimsTreeRoot || revocationTreeRoot || rootOfRoots)`.
    pub value: Hash,
}

impl TreeState {
    pub fn from_roots(claims: Hash, revocation: Hash, roots: Hash) -> Self {
        Self {
            claims_tree_root: claims,
            revocation_tree_root: revocation,
            root_of_roots: roots,
            value: hash_state(&claims, &revocation, &roots),
        }
    }

    /// Whether `value` matches the sub-roots.
    pub fn is_consistent(&self) -> bool {
        self.value
            == hash_state(
                &self.claims_tree_root,
                &self.revocation_tree_root,
                &self.root_of_roots,
            )
    }

    /// Node linking the state hash to its sub-roots, as served by mirrors.
    pub fn node(&self) -> TreeNode {
        TreeNode::State {
            hash: self.value,
            claims_root: self.claims_tree_root,
            revocation_root: self.revocation_tree_root,
            roots_root: self.root_of_roots,
        }
    }
}

/// One entry of the append-only mutation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeEvent {
    ClaimInserted { claim: Claim },
    NonceRevoked { nonce: u64 },
}

/// The state trees of one identity.
#[derive(Debug, Clone)]
pub struct IdentityStateTree {
    depth: u8,
    policy: RevocationPolicy,
    claims: SparseMerkleTree,
    revocation: SparseMerkleTree,
    roots: SparseMerkleTree,
    claims_by_index: BTreeMap<u64, Claim>,
    history: Vec<TreeEvent>,
    states: Vec<TreeState>,
}

impl IdentityStateTree {
    pub fn new(depth: u8, policy: RevocationPolicy) -> Result<Self> {
        Ok(Self {
            depth,
            policy,
            claims: SparseMerkleTree::new("claims", depth)?,
            revocation: SparseMerkleTree::new("revocation", depth)?,
            roots: SparseMerkleTree::new("roots", depth)?,
            claims_by_index: BTreeMap::new(),
            history: Vec::new(),
            states: Vec::new(),
        })
    }

    /// Rebuild a tree by applying `history` in order.
    pub fn replay(depth: u8, policy: RevocationPolicy, history: &[TreeEvent]) -> Result<Self> {
        let mut tree = Self::new(depth, policy)?;
        for event in history {
            tree.apply(event.clone())?;
        }
        debug!(
            "replayed {} events into state {}",
            history.len(),
            tree.current_state().value
        );
        Ok(tree)
    }

    /// Apply one logged event.
    pub fn apply(&mut self, event: TreeEvent) -> Result<()> {
        match event {
            TreeEvent::ClaimInserted { claim } => self.insert_claim(claim).map(|_| ()),
            TreeEvent::NonceRevoked { nonce } => self.revoke(nonce).map(|_| ()),
        }
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn policy(&self) -> RevocationPolicy {
        self.policy
    }

    // ── Mutation ─────────────────────────────────────────────────────────

    /// Insert a claim keyed by its revocation nonce. Returns the leaf index.
    ///
    /// All three trees are checked before any of them is touched, so a
    /// failed insert leaves the state unchanged.
    pub fn insert_claim(&mut self, claim: Claim) -> Result<u64> {
        let key = claim.revocation_nonce;
        let value = claim.hash();
        if let Slot::Occupied(index) = self.claims.check(key, &value)? {
            debug!("claim {value} already present at index {index}");
            return Ok(index);
        }

        let next_claims_root = self.claims.root_after_insert(key, &value);
        self.roots
            .check(next_claims_root.prefix_u64(), &next_claims_root)?;

        let (index, _) = self.claims.insert(key, value)?;
        self.roots
            .insert(next_claims_root.prefix_u64(), next_claims_root)?;

        self.claims_by_index.insert(index, claim.clone());
        self.history.push(TreeEvent::ClaimInserted { claim });
        self.record_state();
        debug!("inserted claim {value} at index {index}");
        Ok(index)
    }

    /// Mark `nonce` revoked. Returns whether the tree changed.
    pub fn revoke(&mut self, nonce: u64) -> Result<bool> {
        if let Slot::Occupied(_) = self.revocation.check(nonce, &Hash::ZERO)? {
            return match self.policy {
                RevocationPolicy::Idempotent => Ok(false),
                RevocationPolicy::Strict => Err(WalletError::AlreadyRevoked(nonce)),
            };
        }
        self.revocation.insert(nonce, Hash::ZERO)?;
        self.history.push(TreeEvent::NonceRevoked { nonce });
        self.record_state();
        debug!("revoked nonce {nonce}");
        Ok(true)
    }

    fn record_state(&mut self) {
        let state = self.current_state();
        self.states.push(state);
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn current_state(&self) -> TreeState {
        TreeState::from_roots(
            self.claims.root(),
            self.revocation.root(),
            self.roots.root(),
        )
    }

    /// Proof for the claims-tree leaf at `index`, against the claims root.
    pub fn prove_inclusion(&self, index: u64) -> MerkleProof {
        self.claims.prove_index(index)
    }

    /// Proof for `claim` in the claims tree.
    pub fn prove_claim(&self, claim: &Claim) -> MerkleProof {
        self.claims.prove_key(claim.revocation_nonce)
    }

    /// Proof for `nonce` against the revocation root. Reports existence
    /// when the nonce is revoked.
    pub fn prove_exclusion(&self, nonce: u64) -> MerkleProof {
        self.revocation.prove_key(nonce)
    }

    /// Whether a claim with this revocation nonce has been issued.
    pub fn contains_nonce(&self, nonce: u64) -> bool {
        self.claims.contains_key(nonce)
    }

    pub fn is_revoked(&self, nonce: u64) -> bool {
        self.revocation.contains_key(nonce)
    }

    pub fn claim_at(&self, index: u64) -> Option<&Claim> {
        self.claims_by_index.get(&index)
    }

    /// Issued claims in leaf-index order.
    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims_by_index.values()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    pub fn revoked_count(&self) -> usize {
        self.revocation.len()
    }

    pub fn history(&self) -> &[TreeEvent] {
        &self.history
    }

    /// State after each applied event, oldest first.
    pub fn states(&self) -> &[TreeState] {
        &self.states
    }

    /// The tree as it was when its state was `state`, rebuilt from history.
    pub fn rewind(&self, state: &Hash) -> Result<Option<Self>> {
        let Some(pos) = self.states.iter().position(|s| s.value == *state) else {
            return Ok(None);
        };
        Self::replay(self.depth, self.policy, &self.history[..=pos]).map(Some)
    }

    /// Whether `state` was ever the state of this tree.
    pub fn had_state(&self, state: &Hash) -> bool {
        self.states.iter().any(|s| s.value == *state)
    }

    /// Nodes a mirror needs to answer non-revocation queries: the current
    /// state node plus every revocation tree node.
    pub fn revocation_nodes(&self) -> Vec<TreeNode> {
        let mut nodes = vec![self.current_state().node()];
        nodes.extend(self.revocation.export_nodes());
        nodes
    }
}
