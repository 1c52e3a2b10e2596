//! secp256k1 ECDSA key provider.
//!
//! Signs the 32-byte digest directly (prehash signing), so the digest
//! produced by the wallet is exactly what the signature covers.

use std::sync::Arc;

use async_trait::async_trait;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use zeroize::Zeroizing;

use crate::error::{Result, WalletError};

use super::store::PrivateKeyStore;
use super::{KeyHandle, KeyProvider, KeyType};

pub struct Secp256k1Provider {
    store: Arc<dyn PrivateKeyStore>,
}

impl Secp256k1Provider {
    pub fn new(store: Arc<dyn PrivateKeyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KeyProvider for Secp256k1Provider {
    fn key_type(&self) -> KeyType {
        KeyType::Secp256k1
    }

    async fn generate(&self) -> Result<KeyHandle> {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        let public_key = signing_key.verifying_key().to_sec1_bytes().to_vec();
        let handle = KeyHandle::new(KeyType::Secp256k1, public_key);
        let secret = Zeroizing::new(signing_key.to_bytes().to_vec());
        self.store.put(&handle.storage_ref, &secret).await?;
        Ok(handle)
    }

    async fn sign(&self, handle: &KeyHandle, digest: &[u8; 32]) -> Result<Vec<u8>> {
        let secret = self.store.get(&handle.storage_ref).await?;
        let signing_key = SigningKey::from_slice(&secret)
            .map_err(|e| WalletError::InvalidKey(format!("stored secp256k1 secret: {e}")))?;
        if signing_key.verifying_key().to_sec1_bytes()[..] != handle.public_key[..] {
            return Err(WalletError::InvalidKey(format!(
                "stored secret does not match {}",
                handle.storage_ref
            )));
        }
        let signature: Signature = signing_key
            .sign_prehash(digest)
            .map_err(|e| WalletError::InvalidKey(format!("ECDSA sign: {e}")))?;
        Ok(signature.to_bytes().to_vec())
    }

    async fn holds(&self, handle: &KeyHandle) -> Result<bool> {
        match self.store.get(&handle.storage_ref).await {
            Ok(_) => Ok(true),
            Err(WalletError::KeyNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Verify a compact (r || s) ECDSA signature over a digest.
pub fn verify(public_key: &[u8], digest: &[u8; 32], signature: &[u8]) -> Result<()> {
    let vk = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| WalletError::InvalidKey(format!("invalid secp256k1 key: {e}")))?;
    let sig = Signature::from_slice(signature).map_err(|_| WalletError::SignatureInvalid)?;
    vk.verify_prehash(digest, &sig)
        .map_err(|_| WalletError::SignatureInvalid)
}
