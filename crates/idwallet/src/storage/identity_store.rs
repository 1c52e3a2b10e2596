//! Identity and profile records.
//!
//! ```text
//! identity/{did}                    JSON IdentityRecord
//! profile/{root did}/{nonce:020}    JSON Profile
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::RevocationOptions;
use crate::did::Profile;
use crate::error::{Result, WalletError};
use crate::kms::KeyHandle;
use crate::merkle::Hash;

use super::kv::KeyValueStore;

const IDENTITY_PREFIX: &str = "identity/";
const PROFILE_PREFIX: &str = "profile/";

/// Lifecycle of an identity's state relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStatus {
    /// Genesis state exists locally only.
    Created,
    /// Local state equals the last anchored state.
    Published,
    /// Local state has moved past the last anchored state.
    Updated,
}

/// Everything needed to restore an identity besides its tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// DID string; parsed against the wallet's method registry.
    pub did: String,
    pub auth_key: KeyHandle,
    pub auth_claim_index: u64,
    pub auth_credential_id: String,
    /// Revocation settings used when issuing without explicit options.
    pub revocation: RevocationOptions,
    pub status: IdentityStatus,
    pub genesis_state: Hash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_state: Option<Hash>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct IdentityStore {
    kv: Arc<dyn KeyValueStore>,
}

impl IdentityStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn identity_key(did: &str) -> String {
        format!("{IDENTITY_PREFIX}{did}")
    }

    fn profile_key(root: &str, nonce: u64) -> String {
        format!("{PROFILE_PREFIX}{root}/{nonce:020}")
    }

    pub async fn put(&self, record: &IdentityRecord) -> Result<()> {
        self.kv
            .put(&Self::identity_key(&record.did), serde_json::to_vec(record)?)
            .await
    }

    pub async fn get(&self, did: &str) -> Result<IdentityRecord> {
        let bytes = self
            .kv
            .get(&Self::identity_key(did))
            .await?
            .ok_or_else(|| WalletError::IdentityNotFound(did.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn exists(&self, did: &str) -> Result<bool> {
        Ok(self.kv.get(&Self::identity_key(did)).await?.is_some())
    }

    /// All stored DIDs, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .kv
            .list(IDENTITY_PREFIX)
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(IDENTITY_PREFIX).map(str::to_string))
            .collect())
    }

    pub async fn put_profile(&self, profile: &Profile) -> Result<()> {
        let key = Self::profile_key(&profile.root.to_string(), profile.nonce);
        self.kv.put(&key, serde_json::to_vec(profile)?).await
    }

    /// Profiles of `root`, in nonce order.
    pub async fn profiles(&self, root: &str) -> Result<Vec<Profile>> {
        let prefix = format!("{PROFILE_PREFIX}{root}/");
        let mut out = Vec::new();
        for key in self.kv.list(&prefix).await? {
            if let Some(bytes) = self.kv.get(&key).await? {
                out.push(serde_json::from_slice(&bytes)?);
            }
        }
        Ok(out)
    }
}
