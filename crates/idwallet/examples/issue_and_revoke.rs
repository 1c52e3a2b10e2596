//! Issue and revoke — create an issuer, issue a credential, anchor the
//! state and watch a holder resolve the credential before and after
//! revocation.
//!
//! Run with:
//!   cargo run --example issue_and_revoke -p idwallet

use std::sync::Arc;

use serde_json::{Map, Value};

use idwallet::kms::InMemoryPrivateKeyStore;
use idwallet::storage::{CredentialStore, KeyValueStore, MemoryStore};
use idwallet::{
    CachePolicy, CreateIdentityOptions, CredentialRequest, CredentialWallet, DataStorage,
    IdentityWallet, InMemoryRhs, KeyCustodian, LocalLedger, PublishOutcome, ResolverRegistry,
    RevocationOptions, RevocationResolver, RhsResolver, StatusType, WalletConfig,
};

const RHS_URL: &str = "https://rhs-staging.polygonid.me";

#[tokio::main]
async fn main() -> idwallet::Result<()> {
    let config = WalletConfig::default();
    let depth = config.tree_depth;
    let ledger = Arc::new(LocalLedger::new(137));
    let rhs = Arc::new(InMemoryRhs::new());

    // ── 1. Wire up the issuer wallet ────────────────────────────────────────
    //
    // Keys live in memory here; use EncryptedFileKeyStore and FileStore for
    // a wallet that survives restarts.
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let kms = Arc::new(KeyCustodian::with_store(Arc::new(InMemoryPrivateKeyStore::new())));
    let issuer_credentials = Arc::new(CredentialWallet::new(
        CredentialStore::new(kv.clone()),
        Arc::new(ResolverRegistry::new()),
    ));
    let issuer = IdentityWallet::new(
        kms,
        DataStorage::new(kv, ledger.clone()),
        issuer_credentials,
        config,
    )?
    .with_node_publisher(rhs.clone());

    let created = issuer
        .create_identity(CreateIdentityOptions::new(
            "iden3",
            "polygon",
            "main",
            RevocationOptions::new(StatusType::ReverseHashService, RHS_URL),
        ))
        .await?;
    let did = created.did;
    println!("Issuer created");
    println!("  DID:     {did}");
    println!("  Genesis: {}", issuer.identity_info(&did).await?.genesis_state);
    println!();

    // ── 2. Issue a credential ───────────────────────────────────────────────
    let mut subject = Map::new();
    subject.insert("id".into(), Value::String("did:example:holder".into()));
    subject.insert("birthday".into(), Value::from(19960424));
    let credential = issuer
        .issue_credential(
            &did,
            CredentialRequest::new("https://schema.example/kyc.json", "KYCAgeCredential", subject),
        )
        .await?;
    credential.verify_proofs()?;
    println!("Credential issued");
    println!("  ID:    {}", credential.id);
    println!("  Nonce: {}", credential.credential_status.revocation_nonce);
    println!();

    if let PublishOutcome::Published(record) = issuer.publish_state(&did).await? {
        println!("State {} anchored as #{}", record.state.value, record.seq);
    }

    // ── 3. The holder resolves through the reverse hash service ─────────────
    let resolvers = Arc::new(ResolverRegistry::new());
    resolvers
        .register(
            StatusType::ReverseHashService,
            RevocationResolver::ReverseHashService(RhsResolver::new(rhs, ledger, depth)),
        )
        .await?;
    let holder = CredentialWallet::new(CredentialStore::new(Arc::new(MemoryStore::new())), resolvers);
    holder.save(&credential).await?;

    let status = holder
        .get_revocation_status(&credential, CachePolicy::Refresh)
        .await?;
    println!("Holder sees revoked = {}", status.revoked);

    // ── 4. Revoke and publish ───────────────────────────────────────────────
    //
    // Revocation only becomes visible to resolvers once the new state is
    // anchored.
    issuer
        .revoke_credential(&did, credential.credential_status.revocation_nonce)
        .await?;
    issuer.publish_state(&did).await?;

    let status = holder
        .get_revocation_status(&credential, CachePolicy::Refresh)
        .await?;
    println!("Holder sees revoked = {}", status.revoked);
    Ok(())
}
