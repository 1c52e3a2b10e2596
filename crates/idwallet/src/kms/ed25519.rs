//! Ed25519 key provider.

use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use zeroize::Zeroizing;

use crate::error::{Result, WalletError};

use super::store::PrivateKeyStore;
use super::{KeyHandle, KeyProvider, KeyType};

pub struct Ed25519Provider {
    store: Arc<dyn PrivateKeyStore>,
}

impl Ed25519Provider {
    pub fn new(store: Arc<dyn PrivateKeyStore>) -> Self {
        Self { store }
    }

    async fn signing_key(&self, handle: &KeyHandle) -> Result<SigningKey> {
        let secret = self.store.get(&handle.storage_ref).await?;
        let bytes: Zeroizing<[u8; 32]> = Zeroizing::new(
            secret
                .as_slice()
                .try_into()
                .map_err(|_| WalletError::InvalidKey("stored Ed25519 secret is not 32 bytes".into()))?,
        );
        let signing_key = SigningKey::from_bytes(&bytes);
        if signing_key.verifying_key().as_bytes()[..] != handle.public_key[..] {
            return Err(WalletError::InvalidKey(format!(
                "stored secret does not match {}",
                handle.storage_ref
            )));
        }
        Ok(signing_key)
    }
}

#[async_trait]
impl KeyProvider for Ed25519Provider {
    fn key_type(&self) -> KeyType {
        KeyType::Ed25519
    }

    async fn generate(&self) -> Result<KeyHandle> {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        let handle = KeyHandle::new(
            KeyType::Ed25519,
            signing_key.verifying_key().to_bytes().to_vec(),
        );
        let secret = Zeroizing::new(signing_key.to_bytes());
        self.store.put(&handle.storage_ref, secret.as_slice()).await?;
        Ok(handle)
    }

    async fn sign(&self, handle: &KeyHandle, digest: &[u8; 32]) -> Result<Vec<u8>> {
        let signing_key = self.signing_key(handle).await?;
        Ok(signing_key.sign(digest).to_bytes().to_vec())
    }

    async fn holds(&self, handle: &KeyHandle) -> Result<bool> {
        match self.store.get(&handle.storage_ref).await {
            Ok(_) => Ok(true),
            Err(WalletError::KeyNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Verify an Ed25519 signature over a digest.
pub fn verify(public_key: &[u8], digest: &[u8; 32], signature: &[u8]) -> Result<()> {
    let pk: [u8; 32] = public_key
        .try_into()
        .map_err(|_| WalletError::InvalidKey("Ed25519 public key must be 32 bytes".into()))?;
    let vk = VerifyingKey::from_bytes(&pk)
        .map_err(|e| WalletError::InvalidKey(format!("invalid verifying key: {e}")))?;
    let sig = Signature::from_slice(signature).map_err(|_| WalletError::SignatureInvalid)?;
    vk.verify_strict(digest, &sig)
        .map_err(|_| WalletError::SignatureInvalid)
}
