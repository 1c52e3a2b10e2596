//! Integration test: the four revocation strategies agree.
//!
//! One issuer publishes to a local ledger (which also mirrors nodes as the
//! on-chain backend) and to a reverse hash service. A holder resolves the
//! same nonces through the issuer, reverse hash service, on-chain and
//! agent strategies and must get the same answer from each.

use std::sync::Arc;

use idwallet::credential::CredentialStatus;
use idwallet::kms::InMemoryPrivateKeyStore;
use idwallet::storage::{CredentialStore, KeyValueStore, MemoryStore};
use idwallet::{
    AgentResolver, ChainEndpoint, CreateIdentityOptions, CredentialRequest, CredentialWallet,
    DataStorage, Did, ErrorKind, IdentityWallet, InMemoryRhs, IssuerResolver, KeyCustodian,
    LocalAgentTransport, LocalIssuerClient, LocalLedger, OnChainResolver, PublishOutcome,
    ResolveOptions, ResolverRegistry, RevocationOptions, RevocationResolver, RhsResolver,
    StatusType, WalletConfig, WalletError,
};

const CHAIN_ID: u64 = 80002;
const DEPTH: u8 = 24;

struct Fixture {
    issuer: Arc<IdentityWallet>,
    ledger: Arc<LocalLedger>,
    resolvers: Arc<ResolverRegistry>,
    did: Did,
}

fn descriptor(status_type: StatusType, nonce: u64, state: Option<idwallet::Hash>) -> CredentialStatus {
    let id = match status_type {
        StatusType::Issuer => "https://issuer.example/v1/credentials/revocation/status".to_string(),
        StatusType::ReverseHashService => "https://rhs.example".to_string(),
        StatusType::OnChain => format!(
            "https://issuer.example/status?contractAddress={CHAIN_ID}:0x49b84b9Dd137de488924b18299De8bf46fD11469"
        ),
        StatusType::Agent => "https://agent.example/api/agent".to_string(),
    };
    RevocationOptions::new(status_type, id).descriptor(nonce, state)
}

async fn fixture() -> Fixture {
    let ledger = Arc::new(LocalLedger::new(CHAIN_ID));
    let rhs = Arc::new(InMemoryRhs::new());

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
    let issuer = Arc::new(
        IdentityWallet::new(kms, DataStorage::new(kv, ledger.clone()), credentials, config)
            .unwrap()
            .with_node_publisher(ledger.clone())
            .with_node_publisher(rhs.clone()),
    );

    let resolvers = Arc::new(ResolverRegistry::new());
    resolvers
        .register(
            StatusType::Issuer,
            RevocationResolver::Issuer(IssuerResolver::new(
                Arc::new(LocalIssuerClient::new(&issuer)),
                DEPTH,
            )),
        )
        .await
        .unwrap();
    resolvers
        .register(
            StatusType::ReverseHashService,
            RevocationResolver::ReverseHashService(
                RhsResolver::new(rhs, ledger.clone(), DEPTH),
            ),
        )
        .await
        .unwrap();
    resolvers
        .register(
            StatusType::OnChain,
            RevocationResolver::OnChain(OnChainResolver::new(
                vec![ChainEndpoint {
                    chain_id: CHAIN_ID,
                    anchor: ledger.clone(),
                    nodes: ledger.clone(),
                }],
                DEPTH,
            )),
        )
        .await
        .unwrap();
    resolvers
        .register(
            StatusType::Agent,
            RevocationResolver::Agent(AgentResolver::new(
                Arc::new(LocalAgentTransport::new(&issuer)),
                DEPTH,
            )),
        )
        .await
        .unwrap();

    let did = issuer
        .create_identity(
            CreateIdentityOptions::new(
                "iden3",
                "polygon",
                "amoy",
                RevocationOptions::new(StatusType::OnChain, "unused"),
            )
            .publish_genesis(true),
        )
        .await
        .unwrap()
        .did;

    Fixture {
        issuer,
        ledger,
        resolvers,
        did,
    }
}

/// Resolve `nonce` through every strategy and return the answers.
async fn resolve_all(fx: &Fixture, nonce: u64) -> Vec<(StatusType, bool)> {
    let mut answers = Vec::new();
    for status_type in StatusType::ALL {
        let status = fx
            .resolvers
            .resolve(
                &fx.did,
                &descriptor(status_type, nonce, None),
                &ResolveOptions::default(),
            )
            .await
            .unwrap_or_else(|e| panic!("{status_type} failed: {e}"));
        assert_eq!(status.nonce, nonce);
        status.verify().unwrap();
        answers.push((status_type, status.revoked));
    }
    answers
}

#[tokio::test]
async fn never_revoked_is_valid_everywhere() {
    let fx = fixture().await;
    let credential = fx
        .issuer
        .issue_credential(
            &fx.did,
            CredentialRequest::new("https://schema.example/a.json", "Membership", Default::default())
                .revocation(RevocationOptions::new(StatusType::Issuer, "x").with_nonce(41)),
        )
        .await
        .unwrap();
    assert_eq!(credential.credential_status.revocation_nonce, 41);
    fx.issuer.publish_state(&fx.did).await.unwrap();

    for (status_type, revoked) in resolve_all(&fx, 41).await {
        assert!(!revoked, "{status_type} reported a never-revoked nonce as revoked");
    }
}

#[tokio::test]
async fn revoked_is_revoked_everywhere() {
    let fx = fixture().await;
    for nonce in [7, 8, 9] {
        fx.issuer.revoke_credential(&fx.did, nonce).await.unwrap();
    }
    fx.issuer.publish_state(&fx.did).await.unwrap();

    for nonce in [7, 8, 9] {
        for (status_type, revoked) in resolve_all(&fx, nonce).await {
            assert!(revoked, "{status_type} missed revoked nonce {nonce}");
        }
    }
    for (status_type, revoked) in resolve_all(&fx, 10).await {
        assert!(!revoked, "{status_type} reported nonce 10 as revoked");
    }
}

#[tokio::test]
async fn strategies_agree_on_the_anchored_state() {
    let fx = fixture().await;
    fx.issuer.revoke_credential(&fx.did, 5).await.unwrap();
    let PublishOutcome::Published(record) = fx.issuer.publish_state(&fx.did).await.unwrap() else {
        panic!("first revocation must anchor a new state");
    };

    let opts = ResolveOptions::default();
    for status_type in StatusType::ALL {
        let status = fx
            .resolvers
            .resolve(&fx.did, &descriptor(status_type, 5, None), &opts)
            .await
            .unwrap();
        assert_eq!(
            status.issuer_state, record.state,
            "{status_type} resolved against another state"
        );
    }
}

#[tokio::test]
async fn unanchored_snapshot_is_never_reported_valid() {
    let fx = fixture().await;
    // An identity that has never published anything.
    let did = fx
        .issuer
        .create_identity(CreateIdentityOptions::new(
            "iden3",
            "polygon",
            "amoy",
            RevocationOptions::new(StatusType::ReverseHashService, "https://rhs.example"),
        ))
        .await
        .unwrap()
        .did;
    let credential = fx
        .issuer
        .issue_credential(
            &did,
            CredentialRequest::new("https://schema.example/a.json", "Membership", Default::default()),
        )
        .await
        .unwrap();
    let nonce = credential.credential_status.revocation_nonce;
    fx.issuer.sync_nodes(&did).await.unwrap();
    fx.issuer.revoke_credential(&did, nonce).await.unwrap();
    fx.issuer.sync_nodes(&did).await.unwrap();

    let opts = ResolveOptions::default();
    let issuer_view = fx
        .resolvers
        .resolve(&did, &descriptor(StatusType::Issuer, nonce, None), &opts)
        .await
        .unwrap();
    assert!(issuer_view.revoked);

    // The descriptor snapshot predates the revocation and nothing is
    // anchored, so the mirror must not answer from it.
    let err = fx
        .resolvers
        .resolve(&did, &credential.credential_status, &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::RhsUnreachable(_)), "got {err}");

    fx.issuer.publish_state(&did).await.unwrap();
    let published = fx
        .resolvers
        .resolve(&did, &credential.credential_status, &opts)
        .await
        .unwrap();
    assert!(published.revoked);
}

#[tokio::test]
async fn unconfigured_chain_is_an_error() {
    let fx = fixture().await;
    let mut status = descriptor(StatusType::OnChain, 1, None);
    status.id = "https://issuer.example/status?contractAddress=1:0x49b84b9Dd137de488924b18299De8bf46fD11469".into();

    let err = fx
        .resolvers
        .resolve(&fx.did, &status, &ResolveOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::UnknownChain(_)), "got {err}");
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[tokio::test]
async fn missing_resolver_is_an_error() {
    let fx = fixture().await;
    let empty = ResolverRegistry::new();
    let err = empty
        .resolve(
            &fx.did,
            &descriptor(StatusType::Agent, 1, None),
            &ResolveOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::NoResolverRegistered(_)));
}

#[tokio::test]
async fn double_publish_does_not_double_commit() {
    let fx = fixture().await;
    fx.issuer.revoke_credential(&fx.did, 3).await.unwrap();

    assert!(matches!(
        fx.issuer.publish_state(&fx.did).await.unwrap(),
        PublishOutcome::Published(_)
    ));
    assert_eq!(
        fx.issuer.publish_state(&fx.did).await.unwrap(),
        PublishOutcome::AlreadyPublished
    );
    // Genesis plus one update.
    assert_eq!(fx.ledger.history(&fx.did).await.unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_publishers_conflict() {
    let ledger = Arc::new(LocalLedger::new(CHAIN_ID));
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let kms = Arc::new(KeyCustodian::with_store(Arc::new(InMemoryPrivateKeyStore::new())));
    let config = WalletConfig {
        tree_depth: DEPTH,
        ..WalletConfig::default()
    };
    let wallet = |kv: Arc<dyn KeyValueStore>| {
        let credentials = Arc::new(CredentialWallet::new(
            CredentialStore::new(kv.clone()),
            Arc::new(ResolverRegistry::new()),
        ));
        IdentityWallet::new(
            kms.clone(),
            DataStorage::new(kv, ledger.clone()),
            credentials,
            config.clone(),
        )
        .unwrap()
    };
    let first = wallet(kv.clone());
    let second = wallet(kv);

    let did = first
        .create_identity(CreateIdentityOptions::new(
            "iden3",
            "polygon",
            "amoy",
            RevocationOptions::new(StatusType::Issuer, "https://issuer.example"),
        ))
        .await
        .unwrap()
        .did;
    second.load(&did).await.unwrap();

    // Both move the state apart from the same starting point.
    first.revoke_credential(&did, 100).await.unwrap();
    second.revoke_credential(&did, 200).await.unwrap();

    first.publish_state(&did).await.unwrap();
    let err = second.publish_state(&did).await.unwrap_err();
    assert!(matches!(err, WalletError::StaleState { .. }), "got {err}");
    assert!(!err.is_retryable());

    let history = ledger.history(&did).await.unwrap();
    assert_eq!(history.len(), 1, "the losing publisher must not commit");
    assert_eq!(
        history[0].state,
        first.identity_info(&did).await.unwrap().current_state
    );
}
