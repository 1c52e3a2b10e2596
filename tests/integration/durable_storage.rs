//! Integration test: wallets survive a restart.
//!
//! Everything is written to a temporary directory: keys through the
//! passphrase-protected key store, identities, trees and credentials
//! through the file-backed key-value store, and anchored states through a
//! ledger persisted alongside them. A second wallet opened over the same
//! directory must carry on where the first stopped.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use idwallet::kms::EncryptedFileKeyStore;
use idwallet::storage::{CredentialFilter, CredentialStore, FileStore, IdentityStatus, KeyValueStore};
use idwallet::{
    CreateIdentityOptions, CredentialRequest, CredentialWallet, DataStorage, IdentityWallet,
    KeyCustodian, KeyType, LocalLedger, PublishOutcome, ResolverRegistry, RevocationOptions,
    StatusType, WalletConfig, WalletError,
};

const PASSPHRASE: &str = "correct horse battery staple";

async fn open_wallet(home: &Path, passphrase: &str) -> Result<(IdentityWallet, Arc<LocalLedger>), WalletError> {
    let keys = EncryptedFileKeyStore::open(home.join("keys"), passphrase).await?;
    let kms = Arc::new(KeyCustodian::with_store(Arc::new(keys)));
    let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(home.join("data")).await?);
    let ledger_kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(home.join("ledger")).await?);
    let ledger = Arc::new(LocalLedger::open(31337, ledger_kv).await?);
    let credentials = Arc::new(CredentialWallet::new(
        CredentialStore::new(kv.clone()),
        Arc::new(ResolverRegistry::new()),
    ));
    let config = WalletConfig {
        tree_depth: 20,
        ..WalletConfig::default()
    };
    let wallet = IdentityWallet::new(kms, DataStorage::new(kv, ledger.clone()), credentials, config)?
        .with_node_publisher(ledger.clone());
    Ok((wallet, ledger))
}

fn request(n: i64) -> CredentialRequest {
    let mut subject = Map::new();
    subject.insert("id".into(), Value::String(format!("did:example:holder-{n}")));
    subject.insert("score".into(), Value::from(n));
    CredentialRequest::new("https://schema.example/score.json", "ScoreCredential", subject)
}

#[tokio::test]
async fn wallet_reloads_identities_and_keys() {
    let dir = tempfile::tempdir().unwrap();

    let (did, before, issued_id) = {
        let (wallet, _) = open_wallet(dir.path(), PASSPHRASE).await.unwrap();
        let did = wallet
            .create_identity(
                CreateIdentityOptions::new(
                    "iden3",
                    "polygon",
                    "main",
                    RevocationOptions::new(StatusType::OnChain, "https://issuer.example?contractAddress=31337:0x00"),
                )
                .key_type(KeyType::Secp256k1),
            )
            .await
            .unwrap()
            .did;
        let credential = wallet.issue_credential(&did, request(1)).await.unwrap();
        wallet.credentials().save(&credential).await.unwrap();
        wallet.revoke_credential(&did, 999).await.unwrap();
        wallet.publish_state(&did).await.unwrap();
        let info = wallet.identity_info(&did).await.unwrap();
        (did, info, credential.id)
    };

    let (wallet, ledger) = open_wallet(dir.path(), PASSPHRASE).await.unwrap();
    assert_eq!(wallet.load_all().await.unwrap(), 1);

    let after = wallet.identity_info(&did).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.status, IdentityStatus::Published);
    assert_eq!(after.key_type, KeyType::Secp256k1);
    assert_eq!(after.revoked, 1);
    assert_eq!(ledger.history(&did).await.unwrap().len(), 1);

    // Stored credentials came back too.
    let stored = wallet.credentials().get(&issued_id).await.unwrap();
    stored.verify_proofs().unwrap();
    let auth = wallet.credentials().find_auth_credential(&did).await.unwrap();
    assert!(auth.is_some());

    // The reloaded key still signs: issue and publish again.
    let second = wallet.issue_credential(&did, request(2)).await.unwrap();
    second.verify_proofs().unwrap();
    assert!(matches!(
        wallet.publish_state(&did).await.unwrap(),
        PublishOutcome::Published(r) if r.seq == 1
    ));
    assert_eq!(
        wallet
            .credentials()
            .list(&CredentialFilter::default().credential_type("ScoreCredential"))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn wrong_passphrase_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (wallet, _) = open_wallet(dir.path(), PASSPHRASE).await.unwrap();
        wallet
            .create_identity(CreateIdentityOptions::new(
                "iden3",
                "polygon",
                "main",
                RevocationOptions::new(StatusType::Issuer, "https://issuer.example"),
            ))
            .await
            .unwrap();
    }

    let err = open_wallet(dir.path(), "not the passphrase")
        .await
        .err()
        .expect("opening with the wrong passphrase must fail");
    assert!(matches!(err, WalletError::KeyAccessDenied(_)), "got {err}");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unknown_identity_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (wallet, _) = open_wallet(dir.path(), PASSPHRASE).await.unwrap();
    let root = wallet
        .create_identity(CreateIdentityOptions::new(
            "iden3",
            "polygon",
            "main",
            RevocationOptions::new(StatusType::Issuer, "https://issuer.example"),
        ))
        .await
        .unwrap()
        .did;
    // A profile is not a stored identity of its own.
    let did = root.profile(9);

    let err = wallet.identity_info(&did).await.unwrap_err();
    assert!(matches!(err, WalletError::IdentityNotFound(_)), "got {err}");
}
