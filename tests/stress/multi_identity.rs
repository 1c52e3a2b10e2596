//! Stress test: create 50 identities across key types and method
//! combinations, verify all have unique DIDs and valid auth credentials.

use std::collections::HashSet;
use std::sync::Arc;

use idwallet::kms::InMemoryPrivateKeyStore;
use idwallet::storage::{CredentialStore, KeyValueStore, MemoryStore};
use idwallet::{
    CreateIdentityOptions, CredentialWallet, DataStorage, IdentityWallet, KeyCustodian, KeyType,
    LocalLedger, ResolverRegistry, RevocationOptions, StatusType, WalletConfig,
};

const COMBINATIONS: [(&str, &str, &str); 4] = [
    ("iden3", "polygon", "main"),
    ("iden3", "polygon", "amoy"),
    ("iden3", "ethereum", "main"),
    ("polygonid", "polygon", "amoy"),
];

fn wallet() -> IdentityWallet {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let kms = Arc::new(KeyCustodian::with_store(Arc::new(InMemoryPrivateKeyStore::new())));
    let credentials = Arc::new(CredentialWallet::new(
        CredentialStore::new(kv.clone()),
        Arc::new(ResolverRegistry::new()),
    ));
    let config = WalletConfig {
        tree_depth: 32,
        ..WalletConfig::default()
    };
    IdentityWallet::new(
        kms,
        DataStorage::new(kv, Arc::new(LocalLedger::new(1))),
        credentials,
        config,
    )
    .unwrap()
}

fn options(i: usize) -> CreateIdentityOptions {
    let (method, blockchain, network) = COMBINATIONS[i % COMBINATIONS.len()];
    let key_type = if i % 2 == 0 {
        KeyType::Ed25519
    } else {
        KeyType::Secp256k1
    };
    CreateIdentityOptions::new(
        method,
        blockchain,
        network,
        RevocationOptions::new(StatusType::ReverseHashService, "https://rhs.example"),
    )
    .key_type(key_type)
}

#[tokio::test]
async fn stress_50_unique_identities() {
    let wallet = wallet();
    let mut dids = HashSet::new();

    for i in 0..50 {
        let created = wallet.create_identity(options(i)).await.unwrap();
        assert!(
            dids.insert(created.did.to_string()),
            "Duplicate DID found: {}",
            created.did
        );
        created
            .credential
            .verify_proofs()
            .unwrap_or_else(|e| panic!("auth credential {i} invalid: {e}"));
    }

    assert_eq!(dids.len(), 50);
    assert_eq!(wallet.identities().await.unwrap().len(), 50);
}

#[tokio::test]
async fn stress_identities_do_not_share_state() {
    let wallet = wallet();
    let mut created = Vec::new();
    for i in 0..20 {
        created.push(wallet.create_identity(options(i)).await.unwrap().did);
    }

    // Revoke one nonce in every other identity.
    for did in created.iter().step_by(2) {
        wallet.revoke_credential(did, 1234).await.unwrap();
    }

    for (i, did) in created.iter().enumerate() {
        let info = wallet.identity_info(did).await.unwrap();
        assert_eq!(info.claims, 1);
        assert_eq!(info.revoked, usize::from(i % 2 == 0), "identity {i}");
        let status = wallet.generate_non_revocation_proof(did, 1234).await.unwrap();
        assert_eq!(status.revoked, i % 2 == 0, "identity {i}");
    }
}
