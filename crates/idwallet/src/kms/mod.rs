//! Key custody.
//!
//! The [`KeyCustodian`] routes key generation and signing to one
//! [`KeyProvider`] per key type. Providers keep secret bytes in a
//! [`PrivateKeyStore`]; callers only ever see a [`KeyHandle`].

pub mod ed25519;
pub mod secp256k1;
pub mod store;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, WalletError};

pub use ed25519::Ed25519Provider;
pub use secp256k1::Secp256k1Provider;
pub use store::{EncryptedFileKeyStore, InMemoryPrivateKeyStore, PrivateKeyStore};

// ── Key types and handles ────────────────────────────────────────────────────

/// Supported signature schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Ed25519,
    Secp256k1,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => "Ed25519",
            Self::Secp256k1 => "Secp256k1",
        }
    }

    /// One-byte code stored in auth claims.
    pub fn code(&self) -> u8 {
        match self {
            Self::Ed25519 => 1,
            Self::Secp256k1 => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::Ed25519),
            2 => Ok(Self::Secp256k1),
            other => Err(WalletError::UnsupportedKeyType(format!("code {other}"))),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(Self::Ed25519),
            "secp256k1" => Ok(Self::Secp256k1),
            _ => Err(WalletError::UnsupportedKeyType(s.to_string())),
        }
    }
}

/// Public reference to a custodied key.
///
/// `storage_ref` is `"<keyType>:<hex public key>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyHandle {
    pub key_type: KeyType,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    pub storage_ref: String,
}

impl KeyHandle {
    pub fn new(key_type: KeyType, public_key: Vec<u8>) -> Self {
        let storage_ref = format!("{}:{}", key_type, hex::encode(&public_key));
        Self {
            key_type,
            public_key,
            storage_ref,
        }
    }

    /// Rebuild a handle from its storage reference.
    pub fn from_storage_ref(storage_ref: &str) -> Result<Self> {
        let (kt, pk) = storage_ref
            .split_once(':')
            .ok_or_else(|| WalletError::InvalidKey(format!("bad storage ref {storage_ref}")))?;
        let key_type: KeyType = kt.parse()?;
        let public_key = hex::decode(pk)
            .map_err(|e| WalletError::InvalidKey(format!("storage ref hex: {e}")))?;
        Ok(Self::new(key_type, public_key))
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }
}

/// Serde adapter writing byte vectors as hex strings.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

// ── Providers ────────────────────────────────────────────────────────────────

/// A signature scheme backed by a private key store.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    fn key_type(&self) -> KeyType;

    /// Generate a fresh keypair and persist its secret.
    async fn generate(&self) -> Result<KeyHandle>;

    /// Sign a 32-byte digest with the key behind `handle`.
    async fn sign(&self, handle: &KeyHandle, digest: &[u8; 32]) -> Result<Vec<u8>>;

    /// Whether the secret for `handle` is held by this provider.
    async fn holds(&self, handle: &KeyHandle) -> Result<bool>;
}

/// Verify a signature made by any supported provider.
///
/// Needs no custody: only the public key is used.
pub fn verify_signature(
    key_type: KeyType,
    public_key: &[u8],
    digest: &[u8; 32],
    signature: &[u8],
) -> Result<()> {
    match key_type {
        KeyType::Ed25519 => ed25519::verify(public_key, digest, signature),
        KeyType::Secp256k1 => secp256k1::verify(public_key, digest, signature),
    }
}

// ── Custodian ────────────────────────────────────────────────────────────────

/// Routes key operations to registered providers.
#[derive(Default)]
pub struct KeyCustodian {
    providers: RwLock<HashMap<KeyType, Arc<dyn KeyProvider>>>,
}

impl KeyCustodian {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custodian with both built-in providers sharing one key store.
    pub fn with_store(store: Arc<dyn PrivateKeyStore>) -> Self {
        let mut providers: HashMap<KeyType, Arc<dyn KeyProvider>> = HashMap::new();
        providers.insert(
            KeyType::Ed25519,
            Arc::new(Ed25519Provider::new(store.clone())),
        );
        providers.insert(KeyType::Secp256k1, Arc::new(Secp256k1Provider::new(store)));
        Self {
            providers: RwLock::new(providers),
        }
    }

    /// Register `provider` for `key_type`. The last registration wins.
    pub async fn register_key_provider(&self, key_type: KeyType, provider: Arc<dyn KeyProvider>) {
        if provider.key_type() != key_type {
            warn!(
                "provider for {} registered under {key_type}",
                provider.key_type()
            );
        }
        let mut providers = self.providers.write().await;
        if providers.insert(key_type, provider).is_some() {
            warn!("replaced key provider for {key_type}");
        }
    }

    async fn provider(&self, key_type: KeyType) -> Result<Arc<dyn KeyProvider>> {
        self.providers
            .read()
            .await
            .get(&key_type)
            .cloned()
            .ok_or_else(|| WalletError::UnsupportedKeyType(key_type.to_string()))
    }

    pub async fn generate_key(&self, key_type: KeyType) -> Result<KeyHandle> {
        let handle = self.provider(key_type).await?.generate().await?;
        debug!("generated {key_type} key {}", handle.storage_ref);
        Ok(handle)
    }

    pub async fn sign(&self, handle: &KeyHandle, digest: &[u8; 32]) -> Result<Vec<u8>> {
        self.provider(handle.key_type)
            .await?
            .sign(handle, digest)
            .await
    }

    /// Public key for a handle the custodian holds the secret for.
    pub async fn public_key(&self, handle: &KeyHandle) -> Result<Vec<u8>> {
        let provider = self.provider(handle.key_type).await?;
        if !provider.holds(handle).await? {
            return Err(WalletError::KeyNotFound(handle.storage_ref.clone()));
        }
        Ok(handle.public_key.clone())
    }

    pub fn verify(
        &self,
        key_type: KeyType,
        public_key: &[u8],
        digest: &[u8; 32],
        signature: &[u8],
    ) -> Result<()> {
        verify_signature(key_type, public_key, digest, signature)
    }
}
