//! Integration test: full end-to-end workflow.
//!
//! Tests the complete lifecycle over the reverse hash service strategy:
//! 1. Create an issuer identity on iden3/polygon/main
//! 2. Issue a credential and hand it to a separate holder wallet
//! 3. Publish the issuer state and resolve the credential as valid
//! 4. Revoke, publish again and resolve the credential as revoked

use std::sync::Arc;

use serde_json::{Map, Value};

use idwallet::kms::InMemoryPrivateKeyStore;
use idwallet::storage::{CredentialFilter, CredentialStore, IdentityStatus, KeyValueStore, MemoryStore};
use idwallet::{
    CachePolicy, CreateIdentityOptions, CredentialRequest, CredentialWallet, DataStorage,
    IdentityWallet, InMemoryRhs, KeyCustodian, LocalLedger, PublishOutcome, ResolverRegistry,
    RevocationOptions, RevocationResolver, RhsResolver, StatusType, WalletConfig,
};

const RHS_URL: &str = "https://rhs-staging.polygonid.me";
const DEPTH: u8 = 32;

fn config() -> WalletConfig {
    WalletConfig {
        tree_depth: DEPTH,
        ..WalletConfig::default()
    }
}

fn issuer_wallet(ledger: Arc<LocalLedger>, rhs: Arc<InMemoryRhs>) -> IdentityWallet {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let kms = Arc::new(KeyCustodian::with_store(Arc::new(InMemoryPrivateKeyStore::new())));
    let credentials = Arc::new(CredentialWallet::new(
        CredentialStore::new(kv.clone()),
        Arc::new(ResolverRegistry::new()),
    ));
    IdentityWallet::new(kms, DataStorage::new(kv, ledger), credentials, config())
        .unwrap()
        .with_node_publisher(rhs)
}

async fn holder_wallet(ledger: Arc<LocalLedger>, rhs: Arc<InMemoryRhs>) -> CredentialWallet {
    let resolvers = Arc::new(ResolverRegistry::new());
    resolvers
        .register(
            StatusType::ReverseHashService,
            RevocationResolver::ReverseHashService(RhsResolver::new(rhs, ledger, DEPTH)),
        )
        .await
        .unwrap();
    CredentialWallet::new(CredentialStore::new(Arc::new(MemoryStore::new())), resolvers)
}

fn kyc_subject(holder: &str) -> Map<String, Value> {
    let mut subject = Map::new();
    subject.insert("id".into(), Value::String(holder.into()));
    subject.insert("birthday".into(), Value::from(19960424));
    subject.insert("documentType".into(), Value::from(2));
    subject
}

#[tokio::test]
async fn full_workflow_issue_publish_revoke() {
    let ledger = Arc::new(LocalLedger::new(137));
    let rhs = Arc::new(InMemoryRhs::new());
    let issuer = issuer_wallet(ledger.clone(), rhs.clone());
    let holder = holder_wallet(ledger.clone(), rhs.clone()).await;

    // ── Step 1: Create the issuer ───────────────────────────────────────
    let created = issuer
        .create_identity(CreateIdentityOptions::new(
            "iden3",
            "polygon",
            "main",
            RevocationOptions::new(StatusType::ReverseHashService, RHS_URL),
        ))
        .await
        .expect("identity creation should succeed");
    let did = created.did.clone();
    let did_str = did.to_string();
    assert!(did_str.starts_with("did:iden3:polygon:main:"));
    assert_eq!(
        created.credential.credential_status.status_type,
        StatusType::ReverseHashService
    );
    assert_eq!(created.credential.credential_status.id, RHS_URL);
    created.credential.verify_proofs().unwrap();
    assert!(!rhs.is_empty().await, "genesis nodes should be mirrored");

    // The auth credential resolves before anything is anchored.
    let auth_status = holder
        .get_revocation_status(&created.credential, CachePolicy::Refresh)
        .await
        .unwrap();
    assert!(!auth_status.revoked);
    assert!(did.is_genesis_state(&auth_status.issuer_state.value));

    // ── Step 2: Issue and hand over ─────────────────────────────────────
    let credential = issuer
        .issue_credential(
            &did,
            CredentialRequest::new(
                "https://schema.example/kyc-v4.json",
                "KYCAgeCredential",
                kyc_subject("did:example:holder"),
            ),
        )
        .await
        .unwrap();
    credential.verify_proofs().unwrap();
    assert_eq!(credential.issuer, did_str);
    assert_eq!(credential.credential_status.id, RHS_URL);
    holder.save(&credential).await.unwrap();
    let listed = holder
        .list(&CredentialFilter::default().issuer(did_str.clone()))
        .await
        .unwrap();
    assert_eq!(listed, vec![credential.clone()]);

    // ── Step 3: Publish and resolve ─────────────────────────────────────
    let outcome = issuer.publish_state(&did).await.unwrap();
    let record = match outcome {
        PublishOutcome::Published(record) => record,
        other => panic!("expected a new anchored state, got {other:?}"),
    };
    assert_eq!(record.seq, 0);
    assert_eq!(
        issuer.identity_info(&did).await.unwrap().status,
        IdentityStatus::Published
    );

    let status = holder
        .get_revocation_status(&credential, CachePolicy::Refresh)
        .await
        .unwrap();
    assert!(!status.revoked);
    assert_eq!(status.nonce, credential.credential_status.revocation_nonce);
    assert_eq!(status.issuer_state, record.state);
    status.verify().unwrap();

    // ── Step 4: Revoke ──────────────────────────────────────────────────
    let nonce = credential.credential_status.revocation_nonce;
    let local = issuer.revoke_credential(&did, nonce).await.unwrap();
    assert_ne!(local.value, record.state.value);

    // Not yet published: resolvers still see the anchored state.
    let before = holder
        .get_revocation_status(&credential, CachePolicy::Refresh)
        .await
        .unwrap();
    assert!(!before.revoked);

    issuer.publish_state(&did).await.unwrap();
    let history = ledger.history(&did).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].previous, Some(record.state.value));

    // A cached answer is served until a refresh is asked for.
    let cached = holder
        .get_revocation_status(&credential, CachePolicy::PreferCached)
        .await
        .unwrap();
    assert!(!cached.revoked);

    let after = holder
        .get_revocation_status(&credential, CachePolicy::Refresh)
        .await
        .unwrap();
    assert!(after.revoked, "revocation should be visible after publish");
    assert_eq!(after.issuer_state, local);
    after.verify().unwrap();

    let revoked = holder.refresh_all(CachePolicy::Refresh).await.unwrap();
    assert_eq!(revoked.len(), 1);
    assert_eq!(revoked[0].id, credential.id);
}

#[tokio::test]
async fn full_workflow_profiles_and_reload() {
    let ledger = Arc::new(LocalLedger::new(137));
    let rhs = Arc::new(InMemoryRhs::new());
    let issuer = issuer_wallet(ledger, rhs);

    let did = issuer
        .create_identity(CreateIdentityOptions::new(
            "polygonid",
            "polygon",
            "amoy",
            RevocationOptions::new(StatusType::ReverseHashService, RHS_URL),
        ))
        .await
        .unwrap()
        .did;
    assert!(did.to_string().starts_with("did:polygonid:polygon:amoy:"));

    let a = issuer.create_profile(&did, 1, "verifier-a").await.unwrap();
    let b = issuer.create_profile(&did, 2, "verifier-b").await.unwrap();
    assert_ne!(a.did, b.did);
    assert_ne!(a.did, did);
    assert!(a.is_linked());

    let profiles = issuer.profiles(&did).await.unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(issuer.load_all().await.unwrap(), 1);
}
