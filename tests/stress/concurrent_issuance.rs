//! Stress test: many tasks issue, revoke and publish against shared
//! wallets. Every mutation must land exactly once and the resulting
//! state must match a sequential replay.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use idwallet::kms::InMemoryPrivateKeyStore;
use idwallet::merkle::{IdentityStateTree, RevocationPolicy};
use idwallet::storage::{CredentialStore, KeyValueStore, MemoryStore};
use idwallet::{
    CreateIdentityOptions, CredentialRequest, CredentialWallet, DataStorage, Did, IdentityWallet,
    KeyCustodian, LocalLedger, PublishOutcome, ResolverRegistry, RevocationOptions, StatusType,
    WalletConfig,
};

const DEPTH: u8 = 40;

fn wallet(ledger: Arc<LocalLedger>) -> Arc<IdentityWallet> {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let kms = Arc::new(KeyCustodian::with_store(Arc::new(InMemoryPrivateKeyStore::new())));
    let credentials = Arc::new(CredentialWallet::new(
        CredentialStore::new(kv.clone()),
        Arc::new(ResolverRegistry::new()),
    ));
    let config = WalletConfig {
        tree_depth: DEPTH,
        ..WalletConfig::default()
    };
    Arc::new(IdentityWallet::new(kms, DataStorage::new(kv, ledger), credentials, config).unwrap())
}

async fn identity(wallet: &IdentityWallet) -> Did {
    wallet
        .create_identity(CreateIdentityOptions::new(
            "iden3",
            "polygon",
            "amoy",
            RevocationOptions::new(StatusType::Issuer, "https://issuer.example"),
        ))
        .await
        .unwrap()
        .did
}

fn request(i: usize) -> CredentialRequest {
    let mut subject = Map::new();
    subject.insert("serial".into(), Value::from(i as u64));
    CredentialRequest::new("https://schema.example/ticket.json", "Ticket", subject)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_64_concurrent_issues_one_identity() {
    let wallet = wallet(Arc::new(LocalLedger::new(1)));
    let did = identity(&wallet).await;

    let mut handles = Vec::new();
    for i in 0..64 {
        let wallet = wallet.clone();
        let did = did.clone();
        handles.push(tokio::spawn(async move {
            wallet.issue_credential(&did, request(i)).await
        }));
    }

    let mut nonces = HashSet::new();
    for handle in handles {
        let credential = handle.await.unwrap().unwrap();
        credential.verify_proofs().unwrap();
        assert!(nonces.insert(credential.credential_status.revocation_nonce));
    }
    assert_eq!(nonces.len(), 64);

    let info = wallet.identity_info(&did).await.unwrap();
    assert_eq!(info.claims, 65, "auth claim plus every issued claim");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_concurrent_revocations_match_sequential_replay() {
    let wallet = wallet(Arc::new(LocalLedger::new(1)));
    let did = identity(&wallet).await;

    let mut handles = Vec::new();
    for nonce in 1000..1100u64 {
        let wallet = wallet.clone();
        let did = did.clone();
        handles.push(tokio::spawn(async move {
            wallet.revoke_credential(&did, nonce).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let info = wallet.identity_info(&did).await.unwrap();
    assert_eq!(info.revoked, 100);

    // Revocation order does not change the revocation root.
    let mut sequential = IdentityStateTree::new(DEPTH, RevocationPolicy::Idempotent).unwrap();
    for nonce in 1000..1100u64 {
        sequential.revoke(nonce).unwrap();
    }
    assert_eq!(
        info.current_state.revocation_tree_root,
        sequential.current_state().revocation_tree_root
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_concurrent_publish_commits_once() {
    let ledger = Arc::new(LocalLedger::new(1));
    let wallet = wallet(ledger.clone());
    let did = identity(&wallet).await;
    wallet.revoke_credential(&did, 5).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let wallet = wallet.clone();
        let did = did.clone();
        handles.push(tokio::spawn(async move { wallet.publish_state(&did).await }));
    }

    let mut published = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            PublishOutcome::Published(_) => published += 1,
            PublishOutcome::AlreadyPublished => {}
        }
    }
    assert_eq!(published, 1);
    assert_eq!(ledger.history(&did).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_many_identities_in_parallel() {
    let ledger = Arc::new(LocalLedger::new(1));
    let wallet = wallet(ledger.clone());

    let mut handles = Vec::new();
    for i in 0..16 {
        let wallet = wallet.clone();
        handles.push(tokio::spawn(async move {
            let did = identity(&wallet).await;
            for j in 0..4 {
                wallet.issue_credential(&did, request(i * 10 + j)).await?;
            }
            wallet.publish_state(&did).await?;
            Ok::<_, idwallet::WalletError>(did)
        }));
    }

    let mut dids = HashSet::new();
    for handle in handles {
        let did = handle.await.unwrap().unwrap();
        assert_eq!(ledger.history(&did).await.unwrap().len(), 1);
        assert_eq!(wallet.identity_info(&did).await.unwrap().claims, 5);
        dids.insert(did.to_string());
    }
    assert_eq!(dids.len(), 16);
}
