//! Edge case tests: configuration bounds, malformed identifiers, nonce
//! collisions, revocation policies, tampered credentials, profiles and
//! agent message handling.

use std::sync::Arc;

use serde_json::{Map, Value};

use idwallet::kms::InMemoryPrivateKeyStore;
use idwallet::resolver::{AgentMessage, InMemoryRhs};
use idwallet::storage::{CredentialStore, KeyValueStore, MemoryStore};
use idwallet::{
    CreateIdentityOptions, CredentialRequest, CredentialWallet, DataStorage, Did, ErrorKind,
    IdentityWallet, KeyCustodian, LocalLedger, ProofState, PublishOutcome, ResolverRegistry,
    RevocationOptions, RevocationPolicy, RevocationResolver, RhsResolver, StatusType,
    WalletConfig, WalletError,
};

fn wallet_with(config: WalletConfig) -> Result<IdentityWallet, WalletError> {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let kms = Arc::new(KeyCustodian::with_store(Arc::new(InMemoryPrivateKeyStore::new())));
    let credentials = Arc::new(CredentialWallet::new(
        CredentialStore::new(kv.clone()),
        Arc::new(ResolverRegistry::new()),
    ));
    IdentityWallet::new(
        kms,
        DataStorage::new(kv, Arc::new(LocalLedger::new(1))),
        credentials,
        config,
    )
}

fn config() -> WalletConfig {
    WalletConfig {
        tree_depth: 16,
        ..WalletConfig::default()
    }
}

fn opts() -> CreateIdentityOptions {
    CreateIdentityOptions::new(
        "iden3",
        "polygon",
        "amoy",
        RevocationOptions::new(StatusType::Issuer, "https://issuer.example"),
    )
}

fn subject(value: i64) -> Map<String, Value> {
    let mut subject = Map::new();
    subject.insert("value".into(), Value::from(value));
    subject
}

// === Configuration ===

#[test]
fn edge_tree_depth_out_of_range() {
    for depth in [0u8, 65, 255] {
        let err = wallet_with(WalletConfig {
            tree_depth: depth,
            ..WalletConfig::default()
        })
        .err()
        .expect("depth out of range must be rejected");
        assert!(matches!(err, WalletError::InvalidConfig(_)), "depth {depth}: {err}");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}

#[test]
fn edge_missing_w3c_context_rejected() {
    let err = wallet_with(WalletConfig {
        credential_context: vec!["https://schema.iden3.io/core/jsonld/iden3proofs.jsonld".into()],
        ..config()
    })
    .err()
    .expect("context without the W3C base must be rejected");
    assert!(matches!(err, WalletError::InvalidConfig(_)));
}

#[tokio::test]
async fn edge_unknown_method_combination() {
    let wallet = wallet_with(config()).unwrap();
    for (method, chain, network) in [
        ("iden3", "solana", "main"),
        ("polygonid", "ethereum", "main"),
        ("web", "polygon", "main"),
    ] {
        let err = wallet
            .create_identity(CreateIdentityOptions::new(
                method,
                chain,
                network,
                RevocationOptions::new(StatusType::Issuer, "https://issuer.example"),
            ))
            .await
            .unwrap_err();
        assert!(
            matches!(err, WalletError::InvalidMethodConfig(_)),
            "{method}:{chain}:{network}: {err}"
        );
    }
    assert!(wallet.identities().await.unwrap().is_empty());
}

// === Identifiers ===

#[tokio::test]
async fn edge_malformed_dids_rejected() {
    let wallet = wallet_with(config()).unwrap();
    let did = wallet.create_identity(opts()).await.unwrap().did.to_string();

    let mut tampered = did.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'z' { 'y' } else { 'z' });
    let wrong_network = did.replace("amoy", "main");

    for bad in [
        "",
        "did",
        "did:iden3:polygon:amoy",
        "iden3:polygon:amoy:abc:def",
        "did:iden3:polygon:amoy:0OIl",
        &wrong_network,
        &tampered,
    ] {
        let err = Did::parse(bad).err().unwrap_or_else(|| panic!("{bad:?} parsed"));
        assert_eq!(err.kind(), ErrorKind::Validation, "{bad:?}: {err}");
    }
    assert_eq!(Did::parse(&did).unwrap().to_string(), did);
}

// === Issuance ===

#[tokio::test]
async fn edge_invalid_requests_rejected() {
    let wallet = wallet_with(config()).unwrap();
    let did = wallet.create_identity(opts()).await.unwrap().did;

    let empty_schema = CredentialRequest::new("", "T", subject(1));
    assert!(matches!(
        wallet.issue_credential(&did, empty_schema).await,
        Err(WalletError::InvalidCredential(_))
    ));

    let expired = CredentialRequest::new("https://s.example", "T", subject(1))
        .expires(chrono::Utc::now() - chrono::Duration::days(1));
    assert!(matches!(
        wallet.issue_credential(&did, expired).await,
        Err(WalletError::InvalidCredential(_))
    ));

    assert_eq!(wallet.identity_info(&did).await.unwrap().claims, 1);
}

#[tokio::test]
async fn edge_fixed_nonce_collision() {
    let wallet = wallet_with(config()).unwrap();
    let did = wallet.create_identity(opts()).await.unwrap().did;
    let fixed = RevocationOptions::new(StatusType::Issuer, "https://issuer.example").with_nonce(42);

    let first = wallet
        .issue_credential(
            &did,
            CredentialRequest::new("https://s.example", "T", subject(1)).revocation(fixed.clone()),
        )
        .await
        .unwrap();
    assert_eq!(first.credential_status.revocation_nonce, 42);
    let state = wallet.identity_info(&did).await.unwrap().current_state;

    let err = wallet
        .issue_credential(
            &did,
            CredentialRequest::new("https://s.example", "T", subject(2)).revocation(fixed),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::ClaimCollision { .. }), "got {err}");
    assert!(!err.is_retryable());
    assert_eq!(wallet.identity_info(&did).await.unwrap().current_state, state);
}

#[tokio::test]
async fn edge_tampered_credential_fails_verification() {
    let wallet = wallet_with(config()).unwrap();
    let did = wallet.create_identity(opts()).await.unwrap().did;
    let credential = wallet
        .issue_credential(&did, CredentialRequest::new("https://s.example", "T", subject(7)))
        .await
        .unwrap();
    credential.verify_proofs().unwrap();

    let mut altered = credential.clone();
    altered.credential_subject = subject(8);
    assert!(altered.verify_proofs().is_err());

    let mut reissued = credential.clone();
    reissued.issuer = wallet.create_identity(opts()).await.unwrap().did.to_string();
    assert!(reissued.verify_proofs().is_err());

    let mut renonced = credential;
    renonced.credential_status.revocation_nonce += 1;
    assert!(renonced.verify_proofs().is_err());
}

#[tokio::test]
async fn edge_pre_issuance_credentials_have_no_mtp() {
    let wallet = wallet_with(WalletConfig {
        proof_state: ProofState::PreIssuance,
        ..config()
    })
    .unwrap();
    let created = wallet.create_identity(opts()).await.unwrap();
    let credential = wallet
        .issue_credential(&created.did, CredentialRequest::new("https://s.example", "T", subject(1)))
        .await
        .unwrap();
    credential.verify_proofs().unwrap();
    assert!(credential.merkle_proof().is_none());
    assert!(credential.signature_proof().is_some());
    // The signature references the state before the claim went in.
    assert!(created
        .did
        .is_genesis_state(&credential.credential_status.state_hash.unwrap()));
}

// === Revocation ===

#[tokio::test]
async fn edge_revocation_policies() {
    let idempotent = wallet_with(config()).unwrap();
    let did = idempotent.create_identity(opts()).await.unwrap().did;
    let first = idempotent.revoke_credential(&did, 9).await.unwrap();
    let second = idempotent.revoke_credential(&did, 9).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(idempotent.identity_info(&did).await.unwrap().revoked, 1);

    let strict = wallet_with(WalletConfig {
        revocation_policy: RevocationPolicy::Strict,
        ..config()
    })
    .unwrap();
    let did = strict.create_identity(opts()).await.unwrap().did;
    strict.revoke_credential(&did, 9).await.unwrap();
    assert!(matches!(
        strict.revoke_credential(&did, 9).await,
        Err(WalletError::AlreadyRevoked(9))
    ));
}

#[tokio::test]
async fn edge_revoking_unissued_nonce_and_auth_claim() {
    let wallet = wallet_with(config()).unwrap();
    let created = wallet.create_identity(opts()).await.unwrap();
    let did = created.did;

    // Nonces can be revoked ahead of issuance.
    wallet.revoke_credential(&did, u64::MAX).await.unwrap();
    assert!(wallet.generate_non_revocation_proof(&did, u64::MAX).await.unwrap().revoked);

    // Revoking the auth claim is visible like any other nonce.
    let auth_nonce = created.credential.credential_status.revocation_nonce;
    wallet.revoke_credential(&did, auth_nonce).await.unwrap();
    assert!(wallet.generate_non_revocation_proof(&did, auth_nonce).await.unwrap().revoked);
}

#[tokio::test]
async fn edge_idempotent_revoke_then_publish_is_noop() {
    let wallet = wallet_with(config()).unwrap();
    let did = wallet.create_identity(opts()).await.unwrap().did;
    wallet.revoke_credential(&did, 1).await.unwrap();
    assert!(matches!(
        wallet.publish_state(&did).await.unwrap(),
        PublishOutcome::Published(_)
    ));
    wallet.revoke_credential(&did, 1).await.unwrap();
    assert_eq!(
        wallet.publish_state(&did).await.unwrap(),
        PublishOutcome::AlreadyPublished
    );
}

// === Profiles ===

#[tokio::test]
async fn edge_profile_rules() {
    let wallet = wallet_with(config()).unwrap();
    let did = wallet.create_identity(opts()).await.unwrap().did;

    assert!(matches!(
        wallet.create_profile(&did, 0, "v").await,
        Err(WalletError::InvalidDid(_))
    ));
    wallet.create_profile(&did, 5, "verifier-a").await.unwrap();
    assert!(matches!(
        wallet.create_profile(&did, 5, "verifier-b").await,
        Err(WalletError::ProfileExists(_))
    ));
    assert!(matches!(
        wallet.create_profile(&did, 6, "verifier-a").await,
        Err(WalletError::ProfileExists(_))
    ));
    assert_eq!(wallet.profiles(&did).await.unwrap().len(), 1);
}

// === Agent messages and registry ===

#[tokio::test]
async fn edge_agent_rejects_foreign_messages() {
    let wallet = wallet_with(config()).unwrap();
    let did = wallet.create_identity(opts()).await.unwrap().did;

    let mut request = AgentMessage::revocation_request(&did, 3).unwrap();
    request.message_type = "https://didcomm.org/basicmessage/2.0/message".into();
    assert!(matches!(
        wallet.handle_revocation_status_request(&request).await,
        Err(WalletError::InvalidProof(_))
    ));

    let mut request = AgentMessage::revocation_request(&did, 3).unwrap();
    request.to = None;
    assert!(matches!(
        wallet.handle_revocation_status_request(&request).await,
        Err(WalletError::InvalidDid(_))
    ));

    let request = AgentMessage::revocation_request(&did, 3).unwrap();
    let response = wallet.handle_revocation_status_request(&request).await.unwrap();
    assert_eq!(response.thid, request.thid);
}

#[tokio::test]
async fn edge_registry_rejects_mismatched_strategy() {
    let registry = ResolverRegistry::new();
    let rhs = RevocationResolver::ReverseHashService(RhsResolver::new(
        Arc::new(InMemoryRhs::new()),
        Arc::new(LocalLedger::new(1)),
        16,
    ));
    let err = registry.register(StatusType::OnChain, rhs).await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidConfig(_)));
    assert!(registry.registered().await.is_empty());
}
