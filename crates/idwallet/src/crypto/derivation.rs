//! Key derivation using HKDF-SHA256.
//!
//! Derives per-entry child keys from a store master key using context
//! strings, so every encrypted secret is sealed under its own key.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{Result, WalletError};

/// Derive a 32-byte child key from a root key and context string.
///
/// Uses HKDF-SHA256 (RFC 5869) with the root key as IKM and
/// the context as info.
pub fn derive_key(root_key_bytes: &[u8; 32], context: &str) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, root_key_bytes);
    let mut output = [0u8; 32];
    hk.expand(context.as_bytes(), &mut output)
        .map_err(|e| WalletError::DerivationFailed(format!("HKDF expand failed: {e}")))?;
    Ok(output)
}

/// Derivation context for the key that seals one private key entry.
pub fn key_entry_context(storage_ref: &str) -> String {
    format!("idwallet/keystore/entry/{storage_ref}")
}

/// Derivation context for the passphrase check value of a key store.
pub fn key_store_check_context() -> String {
    "idwallet/keystore/check".to_string()
}
