//! State anchoring.
//!
//! A [`StateAnchor`] is the opaque service that records identity states:
//! a chain contract in production, a [`LocalLedger`] here. Writes carry a
//! signed [`StateTransition`] from the last anchored state to a new one.

pub mod ledger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::claim::Claim;
use crate::did::Did;
use crate::error::{Result, WalletError};
use crate::kms::{verify_signature, KeyType};
use crate::merkle::{Hash, MerkleProof, TreeState};

pub use ledger::LocalLedger;

/// Genesis roots plus the signing key's auth claim proven in them.
///
/// Carried by a DID's first anchored transition when it starts from the
/// genesis state instead of anchoring it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisProof {
    pub state: TreeState,
    /// Inclusion of the transition's auth claim in `state.claimsTreeRoot`.
    pub auth_mtp: MerkleProof,
}

/// A signed move of an identity from `old_state` to `new_state`.
///
/// `old_state` is `None` only when anchoring the genesis state itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub did: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_state: Option<Hash>,
    pub new_state: TreeState,
    /// Hex auth claim of the signing key.
    pub auth_claim: String,
    /// Inclusion of the auth claim in `new_state.claimsTreeRoot`.
    pub auth_mtp: MerkleProof,
    pub key_type: KeyType,
    /// Hex signature over [`StateTransition::signing_digest`].
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis: Option<GenesisProof>,
}

impl StateTransition {
    /// Digest the identity's auth key signs.
    pub fn signing_digest(did: &str, old_state: Option<&Hash>, new_state: &TreeState) -> [u8; 32] {
        Sha256::new()
            .chain_update(b"idwallet/transition/v1")
            .chain_update(did.as_bytes())
            .chain_update(old_state.unwrap_or(&Hash::ZERO).as_bytes())
            .chain_update(new_state.value.as_bytes())
            .finalize()
            .into()
    }

    /// Check the state, the auth claim's inclusion and the signature.
    /// Returns the signing key.
    pub fn verify(&self) -> Result<(KeyType, Vec<u8>)> {
        if !self.new_state.is_consistent() {
            return Err(WalletError::InvalidProof(
                "new state does not match its sub-roots".into(),
            ));
        }
        let auth = Claim::from_hex(&self.auth_claim)?;
        self.auth_mtp.ensure(
            &self.new_state.claims_tree_root,
            auth.revocation_nonce,
            Some(&auth.hash()),
        )?;
        let (key_type, public_key) = auth.auth_public_key()?;
        if key_type != self.key_type {
            return Err(WalletError::InvalidProof("transition key type mismatch".into()));
        }
        let signature = hex::decode(&self.signature)
            .map_err(|e| WalletError::InvalidProof(format!("signature hex: {e}")))?;
        let digest = Self::signing_digest(&self.did, self.old_state.as_ref(), &self.new_state);
        verify_signature(key_type, &public_key, &digest, &signature)?;
        Ok((key_type, public_key))
    }

    /// Check that the signing key is an auth key of `did`'s genesis state.
    /// An anchor requires this before it binds a DID to its first key.
    pub fn verify_genesis(&self, did: &Did) -> Result<()> {
        let Some(old) = &self.old_state else {
            // `verify` proved the auth claim in `new_state`, which must
            // then be the genesis state itself.
            return if did.is_genesis_state(&self.new_state.value) {
                Ok(())
            } else {
                Err(WalletError::InvalidProof(format!(
                    "{} is not the genesis state of {did}",
                    self.new_state.value
                )))
            };
        };
        let genesis = self.genesis.as_ref().ok_or_else(|| {
            WalletError::InvalidProof(format!("first transition of {did} has no genesis proof"))
        })?;
        if genesis.state.value != *old
            || !genesis.state.is_consistent()
            || !did.is_genesis_state(old)
        {
            return Err(WalletError::InvalidProof(format!(
                "genesis proof of {did} does not match its genesis state"
            )));
        }
        let auth = Claim::from_hex(&self.auth_claim)?;
        genesis.auth_mtp.ensure(
            &genesis.state.claims_tree_root,
            auth.revocation_nonce,
            Some(&auth.hash()),
        )
    }
}

/// An anchored state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub did: String,
    pub state: TreeState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Hash>,
    /// Position in this identity's anchored history, from 0.
    pub seq: u64,
    pub published_at: DateTime<Utc>,
}

/// The chain-facing state service.
#[async_trait]
pub trait StateAnchor: Send + Sync {
    /// Latest anchored state, or `StateNotFound`.
    async fn read(&self, did: &Did) -> Result<StateRecord>;

    /// Anchor a transition.
    ///
    /// Fails with `StaleState` when `old_state` is not the latest anchored
    /// state and with `AnchorUnavailable` when the service is unreachable.
    async fn write(&self, did: &Did, transition: &StateTransition) -> Result<StateRecord>;
}
