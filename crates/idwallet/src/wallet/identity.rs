//! Issuer-side identity wallet.
//!
//! Owns one [`IdentityStateTree`] per identity. Every mutation is computed
//! on a clone, persisted, and only then swapped into the live entry, so a
//! failed or cancelled call leaves the previous state in place.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};

use crate::anchor::{GenesisProof, StateAnchor, StateRecord, StateTransition};
use crate::claim::{Claim, SchemaHash};
use crate::config::{ProofState, WalletConfig};
use crate::credential::{
    subject_commitment, CredentialProof, CredentialSchema, IssuerData, RevocationOptions,
    SignatureProof, SparseMerkleTreeProof, W3CCredential,
};
use crate::crypto::random::random_revocation_nonce;
use crate::did::{Did, DidMethodRegistry, Profile};
use crate::error::{Result, WalletError};
use crate::kms::{KeyCustodian, KeyType};
use crate::merkle::{Hash, IdentityStateTree, TreeState};
use crate::resolver::agent::{
    AgentMessage, AgentStatusBody, RevocationRequestBody, REVOCATION_REQUEST_TYPE,
};
use crate::resolver::{NodePublisher, RevocationStatus};
use crate::storage::{IdentityRecord, IdentityStatus, IdentityStore, KeyValueStore, TreeStorage};

use super::credential::CredentialWallet;

pub const AUTH_CREDENTIAL_TYPE: &str = "AuthKeyCredential";
pub const AUTH_SCHEMA_URL: &str = "https://schema.iden3.io/core/json/auth.json";
pub const JSON_SCHEMA_TYPE: &str = "JsonSchema2023";

/// Attempts at drawing a random nonce whose leaf is free.
const NONCE_ATTEMPTS: usize = 8;

// ── Requests and results ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CreateIdentityOptions {
    pub method: String,
    pub blockchain: String,
    pub network_id: String,
    /// Descriptor template for the auth credential and, by default, for
    /// every credential this identity issues. Its nonce, if any, is used
    /// for the auth claim.
    pub revocation: RevocationOptions,
    pub key_type: KeyType,
    /// Anchor the genesis state right away.
    pub publish_genesis: bool,
}

impl CreateIdentityOptions {
    pub fn new(
        method: impl Into<String>,
        blockchain: impl Into<String>,
        network_id: impl Into<String>,
        revocation: RevocationOptions,
    ) -> Self {
        Self {
            method: method.into(),
            blockchain: blockchain.into(),
            network_id: network_id.into(),
            revocation,
            key_type: KeyType::Ed25519,
            publish_genesis: false,
        }
    }

    pub fn key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }

    pub fn publish_genesis(mut self, publish: bool) -> Self {
        self.publish_genesis = publish;
        self
    }
}

/// A new identity and its self-issued auth credential.
#[derive(Debug, Clone)]
pub struct CreatedIdentity {
    pub did: Did,
    pub credential: W3CCredential,
}

#[derive(Debug, Clone)]
pub struct CredentialRequest {
    /// `credentialSchema.id`.
    pub credential_schema: String,
    pub credential_type: String,
    pub credential_subject: Map<String, Value>,
    pub expiration: Option<DateTime<Utc>>,
    /// Overrides the issuer's default revocation descriptor.
    pub revocation: Option<RevocationOptions>,
}

impl CredentialRequest {
    pub fn new(
        credential_schema: impl Into<String>,
        credential_type: impl Into<String>,
        credential_subject: Map<String, Value>,
    ) -> Self {
        Self {
            credential_schema: credential_schema.into(),
            credential_type: credential_type.into(),
            credential_subject,
            expiration: None,
            revocation: None,
        }
    }

    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expiration = Some(at);
        self
    }

    pub fn revocation(mut self, revocation: RevocationOptions) -> Self {
        self.revocation = Some(revocation);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published(StateRecord),
    /// The current state was already anchored; nothing was written.
    AlreadyPublished,
}

/// Summary of one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityInfo {
    pub did: String,
    pub status: IdentityStatus,
    pub key_type: KeyType,
    pub public_key: String,
    pub genesis_state: Hash,
    pub current_state: TreeState,
    pub published_state: Option<Hash>,
    pub claims: usize,
    pub revoked: usize,
}

/// Durable stores an identity wallet writes to.
#[derive(Clone)]
pub struct DataStorage {
    pub identities: IdentityStore,
    pub trees: TreeStorage,
    pub anchor: Arc<dyn StateAnchor>,
}

impl DataStorage {
    /// Identity records and trees in `kv`, states anchored to `anchor`.
    pub fn new(kv: Arc<dyn KeyValueStore>, anchor: Arc<dyn StateAnchor>) -> Self {
        Self {
            identities: IdentityStore::new(kv.clone()),
            trees: TreeStorage::new(kv),
            anchor,
        }
    }
}

struct IdentityEntry {
    did: Did,
    record: IdentityRecord,
    tree: IdentityStateTree,
}

impl IdentityEntry {
    fn auth_claim(&self) -> Result<Claim> {
        self.tree
            .claim_at(self.record.auth_claim_index)
            .cloned()
            .ok_or_else(|| {
                WalletError::Storage(format!("auth claim missing from tree of {}", self.did))
            })
    }

    fn issuer_data(&self, tree: &IdentityStateTree) -> Result<IssuerData> {
        let auth = self.auth_claim()?;
        Ok(IssuerData {
            id: self.did.to_string(),
            state: tree.current_state(),
            auth_core_claim: auth.to_hex(),
            mtp: tree.prove_claim(&auth),
        })
    }
}

// ── Wallet ───────────────────────────────────────────────────────────────────

pub struct IdentityWallet {
    kms: Arc<KeyCustodian>,
    storage: DataStorage,
    credentials: Arc<CredentialWallet>,
    publishers: Vec<Arc<dyn NodePublisher>>,
    registry: Arc<DidMethodRegistry>,
    config: WalletConfig,
    identities: RwLock<HashMap<String, Arc<Mutex<IdentityEntry>>>>,
}

impl IdentityWallet {
    pub fn new(
        kms: Arc<KeyCustodian>,
        storage: DataStorage,
        credentials: Arc<CredentialWallet>,
        config: WalletConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            kms,
            storage,
            credentials,
            publishers: Vec::new(),
            registry: Arc::new(DidMethodRegistry::default()),
            config,
            identities: RwLock::new(HashMap::new()),
        })
    }

    /// Push revocation nodes to `publisher` whenever a state is published.
    pub fn with_node_publisher(mut self, publisher: Arc<dyn NodePublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn with_method_registry(mut self, registry: Arc<DidMethodRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialWallet> {
        &self.credentials
    }

    pub fn anchor(&self) -> &Arc<dyn StateAnchor> {
        &self.storage.anchor
    }

    // ── Entries ──────────────────────────────────────────────────────────

    async fn entry(&self, did: &Did) -> Result<Arc<Mutex<IdentityEntry>>> {
        let key = did.to_string();
        if let Some(entry) = self.identities.read().await.get(&key) {
            return Ok(entry.clone());
        }

        let record = self.storage.identities.get(&key).await?;
        let tree = self
            .storage
            .trees
            .load(&key)
            .await?
            .ok_or_else(|| WalletError::Storage(format!("tree of {key} missing")))?;
        if !did.is_genesis_state(&record.genesis_state) || !tree.had_state(&record.genesis_state) {
            return Err(WalletError::Storage(format!(
                "stored tree of {key} does not descend from its genesis state"
            )));
        }
        let loaded = Arc::new(Mutex::new(IdentityEntry {
            did: did.clone(),
            record,
            tree,
        }));

        // Another task may have loaded it meanwhile; keep the first.
        let mut identities = self.identities.write().await;
        let entry = identities.entry(key.clone()).or_insert(loaded).clone();
        debug!("loaded identity {key}");
        Ok(entry)
    }

    /// Restore `did` from storage by replaying its tree history.
    pub async fn load(&self, did: &Did) -> Result<()> {
        self.entry(did).await.map(|_| ())
    }

    /// Restore every stored identity. Returns how many were loaded.
    pub async fn load_all(&self) -> Result<usize> {
        let dids = self.identities().await?;
        for did in &dids {
            self.load(did).await?;
        }
        Ok(dids.len())
    }

    pub async fn identities(&self) -> Result<Vec<Did>> {
        self.storage
            .identities
            .list()
            .await?
            .iter()
            .map(|s| Did::parse_with(&self.registry, s))
            .collect()
    }

    pub async fn identity_info(&self, did: &Did) -> Result<IdentityInfo> {
        let entry = self.entry(did).await?;
        let entry = entry.lock().await;
        Ok(IdentityInfo {
            did: entry.record.did.clone(),
            status: entry.record.status,
            key_type: entry.record.auth_key.key_type,
            public_key: entry.record.auth_key.public_key_hex(),
            genesis_state: entry.record.genesis_state,
            current_state: entry.tree.current_state(),
            published_state: entry.record.published_state,
            claims: entry.tree.claim_count(),
            revoked: entry.tree.revoked_count(),
        })
    }

    // ── Creation ─────────────────────────────────────────────────────────

    /// Create an identity and its self-issued auth credential.
    pub async fn create_identity(&self, opts: CreateIdentityOptions) -> Result<CreatedIdentity> {
        self.registry
            .id_type(&opts.method, &opts.blockchain, &opts.network_id)?;

        let key = self.kms.generate_key(opts.key_type).await?;
        let auth_nonce = opts.revocation.nonce.unwrap_or(0);
        let auth = Claim::auth(&key, auth_nonce)?;
        let mut tree = IdentityStateTree::new(self.config.tree_depth, self.config.revocation_policy)?;
        let auth_index = tree.insert_claim(auth.clone())?;
        let genesis = tree.current_state();

        let did = Did::from_genesis(
            &self.registry,
            &opts.method,
            &opts.blockchain,
            &opts.network_id,
            &genesis.value,
        )?;
        let did_str = did.to_string();
        if self.identities.read().await.contains_key(&did_str)
            || self.storage.identities.exists(&did_str).await?
        {
            return Err(WalletError::IdentityExists(did_str));
        }

        let mut subject = Map::new();
        subject.insert("id".into(), Value::String(did_str.clone()));
        subject.insert("type".into(), Value::String(AUTH_CREDENTIAL_TYPE.into()));
        subject.insert("keyType".into(), Value::String(key.key_type.to_string()));
        subject.insert("publicKey".into(), Value::String(key.public_key_hex()));

        let default_revocation = RevocationOptions {
            nonce: None,
            ..opts.revocation.clone()
        };
        let record = IdentityRecord {
            did: did_str.clone(),
            auth_key: key,
            auth_claim_index: auth_index,
            auth_credential_id: String::new(),
            revocation: default_revocation,
            status: IdentityStatus::Created,
            genesis_state: genesis.value,
            published_state: None,
            created_at: crate::time::now_utc(),
        };
        let mut entry = IdentityEntry {
            did: did.clone(),
            record,
            tree,
        };

        let document = self.draft(
            &entry,
            AUTH_SCHEMA_URL,
            AUTH_CREDENTIAL_TYPE,
            subject,
            None,
            opts.revocation.descriptor(auth_nonce, Some(genesis.value)),
        );
        let credential = self
            .sign_credential(&entry, document, &auth, &entry.tree, true)
            .await?;
        entry.record.auth_credential_id = credential.id.clone();

        // The identity record goes last: an identity exists once its record
        // does. Earlier writes are undone if a later one fails.
        self.credentials.save(&credential).await?;
        if let Err(e) = self.storage.trees.save(&did_str, &entry.tree).await {
            self.undo_creation(&did_str, &credential.id, false).await;
            return Err(e);
        }
        if let Err(e) = self.storage.identities.put(&entry.record).await {
            self.undo_creation(&did_str, &credential.id, true).await;
            return Err(e);
        }

        let nodes = entry.tree.revocation_nodes();
        self.identities
            .write()
            .await
            .insert(did_str.clone(), Arc::new(Mutex::new(entry)));
        info!("created identity {did_str}");

        // Mirrors are optional at creation; publish_state pushes again.
        if let Err(e) = self.push_nodes(&nodes).await {
            warn!("genesis nodes of {did_str} not mirrored: {e}");
        }
        if opts.publish_genesis {
            self.publish_state(&did).await?;
        }
        Ok(CreatedIdentity { did, credential })
    }

    async fn undo_creation(&self, did: &str, credential_id: &str, tree_saved: bool) {
        if let Err(e) = self.credentials.remove(credential_id).await {
            warn!("auth credential {credential_id} of failed identity {did} left behind: {e}");
        }
        if tree_saved {
            if let Err(e) = self.storage.trees.remove(did).await {
                warn!("tree of failed identity {did} left behind: {e}");
            }
        }
    }

    /// Persist `next` as the tree of `entry` and swap it in.
    ///
    /// The record is written first and restored if the tree commit fails.
    /// The in-memory entry changes only after both writes succeeded.
    async fn commit_tree(&self, entry: &mut IdentityEntry, next: IdentityStateTree) -> Result<()> {
        let mut record = entry.record.clone();
        record.status = IdentityStatus::Updated;
        self.storage.identities.put(&record).await?;
        if let Err(e) = self.storage.trees.save(&record.did, &next).await {
            if let Err(undo) = self.storage.identities.put(&entry.record).await {
                warn!("record of {} not restored after failed tree commit: {undo}", record.did);
            }
            return Err(e);
        }
        entry.record = record;
        entry.tree = next;
        Ok(())
    }

    // ── Issuance ─────────────────────────────────────────────────────────

    /// Issue a credential from `issuer`.
    ///
    /// With [`ProofState::PostIssuance`] the credential carries a signature
    /// proof and an MTP against the state that includes the new claim; with
    /// [`ProofState::PreIssuance`] only a signature proof against the state
    /// before it.
    pub async fn issue_credential(
        &self,
        issuer: &Did,
        request: CredentialRequest,
    ) -> Result<W3CCredential> {
        if request.credential_schema.is_empty() || request.credential_type.is_empty() {
            return Err(WalletError::InvalidCredential(
                "credential schema and type are required".into(),
            ));
        }
        if let Some(exp) = request.expiration {
            if exp <= crate::time::now_utc() {
                return Err(WalletError::InvalidCredential(format!(
                    "expiration {exp} is in the past"
                )));
            }
        }

        let entry = self.entry(issuer).await?;
        let mut entry = entry.lock().await;
        let revocation = request
            .revocation
            .clone()
            .unwrap_or_else(|| entry.record.revocation.clone());

        let mut base = Claim::new(SchemaHash::from_schema(
            &request.credential_schema,
            &request.credential_type,
        ))
        .with_issuer(issuer.id);
        base.index_data[0] = subject_commitment(&request.credential_subject)?;
        if let Some(subject) = request
            .credential_subject
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Did::parse_with(&self.registry, s).ok())
        {
            base = base.with_subject(subject.id);
        }
        if let Some(exp) = request.expiration {
            base = base.with_expiration(exp.timestamp());
        }

        let (claim, next) = self.insert_with_nonce(&entry.tree, base, revocation.nonce)?;

        // Sign before anything is persisted so a signing failure leaves no
        // orphaned claim behind.
        let (referenced, with_mtp) = match self.config.proof_state {
            ProofState::PreIssuance => (&entry.tree, false),
            ProofState::PostIssuance => (&next, true),
        };
        let state = referenced.current_state().value;
        let document = self.draft(
            &entry,
            &request.credential_schema,
            &request.credential_type,
            request.credential_subject,
            request.expiration,
            revocation.descriptor(claim.revocation_nonce, Some(state)),
        );
        let credential = self
            .sign_credential(&entry, document, &claim, referenced, with_mtp)
            .await?;

        self.commit_tree(&mut entry, next).await?;
        info!(
            "{} issued {} with nonce {}",
            entry.record.did, credential.id, claim.revocation_nonce
        );
        Ok(credential)
    }

    /// Insert `base` into a copy of `tree` under `nonce`, or under a fresh
    /// random nonce whose leaf is free.
    fn insert_with_nonce(
        &self,
        tree: &IdentityStateTree,
        base: Claim,
        nonce: Option<u64>,
    ) -> Result<(Claim, IdentityStateTree)> {
        if let Some(nonce) = nonce {
            let claim = base.with_revocation_nonce(nonce);
            let mut next = tree.clone();
            next.insert_claim(claim.clone())?;
            return Ok((claim, next));
        }
        let mut last = None;
        for _ in 0..NONCE_ATTEMPTS {
            let claim = base.clone().with_revocation_nonce(random_revocation_nonce());
            let mut next = tree.clone();
            match next.insert_claim(claim.clone()) {
                Ok(_) => return Ok((claim, next)),
                Err(e @ WalletError::ClaimCollision { .. }) => last = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or(WalletError::ClaimCollision {
            tree: "claims",
            index: 0,
        }))
    }

    fn draft(
        &self,
        entry: &IdentityEntry,
        schema: &str,
        credential_type: &str,
        subject: Map<String, Value>,
        expiration: Option<DateTime<Utc>>,
        status: crate::credential::CredentialStatus,
    ) -> W3CCredential {
        W3CCredential {
            context: self.config.credential_context.clone(),
            id: String::new(),
            credential_type: vec!["VerifiableCredential".into(), credential_type.to_string()],
            issuer: entry.did.to_string(),
            issuance_date: crate::time::now_utc(),
            expiration_date: expiration,
            credential_subject: subject,
            credential_status: status,
            credential_schema: CredentialSchema {
                id: schema.to_string(),
                schema_type: JSON_SCHEMA_TYPE.into(),
            },
            proof: Vec::new(),
        }
    }

    /// Seal the id, sign it with the auth key, attach proofs against `tree`.
    async fn sign_credential(
        &self,
        entry: &IdentityEntry,
        mut credential: W3CCredential,
        claim: &Claim,
        tree: &IdentityStateTree,
        with_mtp: bool,
    ) -> Result<W3CCredential> {
        credential.seal_id()?;
        let key = &entry.record.auth_key;
        let digest = W3CCredential::signing_digest(&credential.id, &claim.hash());
        let signature = self.kms.sign(key, &digest).await?;
        let issuer_data = entry.issuer_data(tree)?;

        credential.proof.push(CredentialProof::Signature(SignatureProof {
            issuer_data: issuer_data.clone(),
            core_claim: claim.to_hex(),
            key_type: key.key_type,
            verification_method: format!("{}#{}", entry.did, key.public_key_hex()),
            created: crate::time::now_utc(),
            signature: hex::encode(signature),
        }));
        if with_mtp {
            credential
                .proof
                .push(CredentialProof::MerkleTree(SparseMerkleTreeProof {
                    issuer_data,
                    core_claim: claim.to_hex(),
                    mtp: tree.prove_claim(claim),
                }));
        }
        Ok(credential)
    }

    // ── Revocation ───────────────────────────────────────────────────────

    /// Revoke `nonce` in `issuer`'s revocation tree. Returns the new local
    /// state; it becomes visible to resolvers once published.
    pub async fn revoke_credential(&self, issuer: &Did, nonce: u64) -> Result<TreeState> {
        let entry = self.entry(issuer).await?;
        let mut entry = entry.lock().await;
        let mut next = entry.tree.clone();
        if next.revoke(nonce)? {
            self.commit_tree(&mut entry, next).await?;
            info!("{} revoked nonce {nonce}", entry.record.did);
        } else {
            debug!("{} nonce {nonce} already revoked", entry.record.did);
        }
        Ok(entry.tree.current_state())
    }

    /// Proof of `nonce`'s revocation status against `did`'s current state,
    /// as an issuer endpoint answers it.
    pub async fn generate_non_revocation_proof(
        &self,
        did: &Did,
        nonce: u64,
    ) -> Result<RevocationStatus> {
        let entry = self.entry(did).await?;
        let entry = entry.lock().await;
        RevocationStatus::verified(
            nonce,
            entry.tree.current_state(),
            entry.tree.prove_exclusion(nonce),
        )
    }

    /// Answer an agent revocation status request addressed to one of this
    /// wallet's identities.
    pub async fn handle_revocation_status_request(
        &self,
        request: &AgentMessage,
    ) -> Result<AgentMessage> {
        if request.message_type != REVOCATION_REQUEST_TYPE {
            return Err(WalletError::InvalidProof(format!(
                "unsupported message type {}",
                request.message_type
            )));
        }
        let to = request
            .to
            .as_deref()
            .ok_or_else(|| WalletError::InvalidDid("request has no recipient".into()))?;
        let did = Did::parse_with(&self.registry, to)?;
        let body: RevocationRequestBody = serde_json::from_value(request.body.clone())?;

        let entry = self.entry(&did).await?;
        let entry = entry.lock().await;
        let status = RevocationStatus::verified(
            body.revocation_nonce,
            entry.tree.current_state(),
            entry.tree.prove_exclusion(body.revocation_nonce),
        )?;
        let digest = AgentStatusBody::signing_digest(&request.thid, &status)?;
        let signature = self.kms.sign(&entry.record.auth_key, &digest).await?;
        let reply = AgentStatusBody {
            status,
            issuer_data: entry.issuer_data(&entry.tree)?,
            key_type: entry.record.auth_key.key_type,
            signature: hex::encode(signature),
        };
        AgentMessage::revocation_response(request, &reply)
    }

    // ── Publishing ───────────────────────────────────────────────────────

    /// Anchor the current state of `did`.
    ///
    /// `AnchorUnavailable` is retryable. `StaleState` means another writer
    /// moved the anchored state and is returned to the caller as is. On any
    /// failure the local tree and status are left unchanged.
    pub async fn publish_state(&self, did: &Did) -> Result<PublishOutcome> {
        let entry = self.entry(did).await?;
        let mut entry = entry.lock().await;
        let current = entry.tree.current_state();
        if entry.record.published_state == Some(current.value) {
            debug!("{did} state {} already published", current.value);
            return Ok(PublishOutcome::AlreadyPublished);
        }

        let old_state = match entry.record.published_state {
            Some(published) => Some(published),
            None if current.value == entry.record.genesis_state => None,
            None => Some(entry.record.genesis_state),
        };
        let did_str = entry.record.did.clone();
        let auth = entry.auth_claim()?;
        // A first anchor that skips genesis shows the key is in genesis.
        let genesis = match (entry.record.published_state, old_state) {
            (None, Some(genesis)) => {
                let at_genesis = entry.tree.rewind(&genesis)?.ok_or_else(|| {
                    WalletError::Storage(format!("{did} history does not reach its genesis state"))
                })?;
                Some(GenesisProof {
                    state: at_genesis.current_state(),
                    auth_mtp: at_genesis.prove_claim(&auth),
                })
            }
            _ => None,
        };
        let digest = StateTransition::signing_digest(&did_str, old_state.as_ref(), &current);
        let signature = self.kms.sign(&entry.record.auth_key, &digest).await?;
        let transition = StateTransition {
            did: did_str.clone(),
            old_state,
            new_state: current,
            auth_claim: auth.to_hex(),
            auth_mtp: entry.tree.prove_claim(&auth),
            key_type: entry.record.auth_key.key_type,
            signature: hex::encode(signature),
            genesis,
        };

        let record = match self.storage.anchor.write(did, &transition).await {
            Ok(record) => record,
            Err(e @ WalletError::StaleState { .. }) => {
                // Our own earlier write may have landed without the local
                // record catching up.
                match self.storage.anchor.read(did).await {
                    Ok(anchored) if anchored.state == current => {
                        self.mark_published(&mut entry, current.value).await?;
                        return Ok(PublishOutcome::AlreadyPublished);
                    }
                    _ => {
                        warn!("publish of {did_str} conflicts with the anchored state: {e}");
                        return Err(e);
                    }
                }
            }
            Err(e) => return Err(e),
        };

        self.mark_published(&mut entry, current.value).await?;
        info!("published {did_str} state {} (seq {})", current.value, record.seq);

        if let Err(e) = self.push_nodes(&entry.tree.revocation_nodes()).await {
            warn!("revocation nodes of {did_str} not mirrored: {e}");
        }
        Ok(PublishOutcome::Published(record))
    }

    async fn mark_published(&self, entry: &mut IdentityEntry, state: Hash) -> Result<()> {
        let mut record = entry.record.clone();
        record.published_state = Some(state);
        record.status = IdentityStatus::Published;
        self.storage.identities.put(&record).await?;
        entry.record = record;
        Ok(())
    }

    /// Push the current revocation nodes of `did` to every mirror,
    /// propagating the first failure.
    pub async fn sync_nodes(&self, did: &Did) -> Result<()> {
        let entry = self.entry(did).await?;
        let nodes = entry.lock().await.tree.revocation_nodes();
        self.push_nodes(&nodes).await
    }

    async fn push_nodes(&self, nodes: &[crate::merkle::TreeNode]) -> Result<()> {
        for publisher in &self.publishers {
            publisher.publish(nodes).await?;
        }
        Ok(())
    }

    // ── Profiles ─────────────────────────────────────────────────────────

    /// Derive a profile of `did` for `verifier`. Nonce 0 is the root itself.
    pub async fn create_profile(
        &self,
        did: &Did,
        nonce: u64,
        verifier: impl Into<String>,
    ) -> Result<Profile> {
        if nonce == 0 {
            return Err(WalletError::InvalidDid(
                "profile nonce 0 is reserved for the root identity".into(),
            ));
        }
        let verifier = verifier.into();
        let entry = self.entry(did).await?;
        // Held so concurrent profile creation for one root is serialised.
        let entry = entry.lock().await;
        let root = entry.record.did.clone();
        let existing = self.storage.identities.profiles(&root).await?;
        if let Some(p) = existing
            .iter()
            .find(|p| p.nonce == nonce || p.verifier == verifier)
        {
            return Err(WalletError::ProfileExists(format!(
                "{root} nonce {} / verifier {}",
                p.nonce, p.verifier
            )));
        }
        let profile = Profile::new(&entry.did, nonce, verifier);
        self.storage.identities.put_profile(&profile).await?;
        info!("created profile {} of {root}", profile.did);
        Ok(profile)
    }

    pub async fn profiles(&self, did: &Did) -> Result<Vec<Profile>> {
        self.entry(did).await?;
        self.storage.identities.profiles(&did.to_string()).await
    }
}
