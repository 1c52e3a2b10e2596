//! Scale test: large identity state trees.
//!
//! Validates that proofs stay valid as trees grow, that replaying the
//! mutation log reproduces the state, and that a mirror can walk proofs
//! for thousands of revocations.

use idwallet::claim::{Claim, SchemaHash};
use idwallet::merkle::{IdentityStateTree, RevocationPolicy, SparseMerkleTree};
use idwallet::resolver::{walk_proof, NodePublisher};
use idwallet::{Hash, InMemoryRhs};

const DEPTH: u8 = 40;

fn claim(nonce: u64) -> Claim {
    let mut claim = Claim::new(SchemaHash::from_schema(
        "https://schema.example/scale.json",
        "ScaleCredential",
    ))
    .with_revocation_nonce(nonce);
    claim.index_data[0] = *Hash::digest(&[&nonce.to_be_bytes()[..]]).as_bytes();
    claim
}

#[test]
fn stress_2k_claims_all_prove() {
    let mut tree = IdentityStateTree::new(DEPTH, RevocationPolicy::Idempotent).unwrap();
    let claims: Vec<Claim> = (1..=2_000u64).map(|n| claim(n * 7_919)).collect();
    for c in &claims {
        tree.insert_claim(c.clone()).unwrap();
    }
    assert_eq!(tree.claim_count(), 2_000);

    let state = tree.current_state();
    assert!(state.is_consistent());
    for c in &claims {
        let proof = tree.prove_claim(c);
        assert!(
            proof.verify(&state.claims_tree_root, c.revocation_nonce, Some(&c.hash())),
            "claim with nonce {} does not prove",
            c.revocation_nonce
        );
    }

    // Absent nonces prove absent.
    for n in 1..=200u64 {
        let proof = tree.prove_exclusion(n * 7_919 + 1);
        assert!(proof.verify(&state.revocation_tree_root, n * 7_919 + 1, None));
    }
}

#[test]
fn stress_replay_reproduces_every_state() {
    let mut tree = IdentityStateTree::new(DEPTH, RevocationPolicy::Idempotent).unwrap();
    for n in 0..1_000u64 {
        tree.insert_claim(claim(n)).unwrap();
        if n % 3 == 0 {
            tree.revoke(n).unwrap();
        }
    }

    let replayed =
        IdentityStateTree::replay(DEPTH, RevocationPolicy::Idempotent, tree.history()).unwrap();
    assert_eq!(replayed.current_state(), tree.current_state());
    assert_eq!(replayed.states(), tree.states());
    assert_eq!(replayed.revoked_count(), 334);
}

#[test]
fn stress_insert_order_does_not_matter() {
    let mut forward = SparseMerkleTree::new("forward", DEPTH).unwrap();
    let mut backward = SparseMerkleTree::new("backward", DEPTH).unwrap();
    for n in 0..5_000u64 {
        forward.insert(n, Hash::ZERO).unwrap();
    }
    for n in (0..5_000u64).rev() {
        backward.insert(n, Hash::ZERO).unwrap();
    }
    assert_eq!(forward.root(), backward.root());
    assert_eq!(forward.len(), 5_000);
}

#[tokio::test]
async fn stress_mirror_walks_5k_revocations() {
    let mut tree = IdentityStateTree::new(DEPTH, RevocationPolicy::Idempotent).unwrap();
    for n in 0..5_000u64 {
        tree.revoke(n * 3).unwrap();
    }
    let rhs = InMemoryRhs::new();
    rhs.publish(&tree.revocation_nodes()).await.unwrap();

    let state = tree.current_state();
    for n in (0..5_000u64).step_by(50) {
        let (walked, proof) = walk_proof(&rhs, &state.value, n * 3, DEPTH).await.unwrap();
        assert_eq!(walked, state);
        assert!(proof.includes(n * 3));
        assert_eq!(proof, tree.prove_exclusion(n * 3));

        let (_, absent) = walk_proof(&rhs, &state.value, n * 3 + 1, DEPTH).await.unwrap();
        assert!(!absent.includes(n * 3 + 1));
        assert!(absent.verify(&state.revocation_tree_root, n * 3 + 1, None));
    }
}
