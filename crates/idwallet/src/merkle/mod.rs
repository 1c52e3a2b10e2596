//! Sparse Merkle trees and the per-identity state built from them.

pub mod hash;
pub mod proof;
pub mod smt;
pub mod state;

pub use hash::Hash;
pub use proof::MerkleProof;
pub use smt::{Leaf, SparseMerkleTree, TreeNode};
pub use state::{IdentityStateTree, RevocationPolicy, TreeEvent, TreeState, DEFAULT_TREE_DEPTH};
