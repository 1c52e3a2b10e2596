//! Private key storage.
//!
//! Two implementations: a volatile in-memory map and an encrypted file
//! store. In the file store every secret is sealed with ChaCha20-Poly1305
//! under its own HKDF key, derived from an Argon2id master key that is
//! itself derived from the passphrase.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use crate::crypto::derivation::{derive_key, key_entry_context, key_store_check_context};
use crate::crypto::encryption::{decrypt, derive_passphrase_key, encrypt};
use crate::crypto::random::random_salt_16;
use crate::error::{Result, WalletError};

/// Storage boundary for secret key bytes.
#[async_trait]
pub trait PrivateKeyStore: Send + Sync {
    async fn put(&self, storage_ref: &str, secret: &[u8]) -> Result<()>;

    /// Fails with `KeyNotFound` when nothing is stored under `storage_ref`.
    async fn get(&self, storage_ref: &str) -> Result<Zeroizing<Vec<u8>>>;

    async fn delete(&self, storage_ref: &str) -> Result<()>;
}

// ── In-memory ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryPrivateKeyStore {
    entries: Mutex<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl InMemoryPrivateKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrivateKeyStore for InMemoryPrivateKeyStore {
    async fn put(&self, storage_ref: &str, secret: &[u8]) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(storage_ref.to_string(), Zeroizing::new(secret.to_vec()));
        Ok(())
    }

    async fn get(&self, storage_ref: &str) -> Result<Zeroizing<Vec<u8>>> {
        self.entries
            .lock()
            .await
            .get(storage_ref)
            .cloned()
            .ok_or_else(|| WalletError::KeyNotFound(storage_ref.to_string()))
    }

    async fn delete(&self, storage_ref: &str) -> Result<()> {
        self.entries.lock().await.remove(storage_ref);
        Ok(())
    }
}

// ── Encrypted file store ─────────────────────────────────────────────────────

const STORE_VERSION: u32 = 1;
const HEADER_FILE: &str = "keystore.json";
const CHECK_PLAINTEXT: &[u8] = b"idwallet-keystore-check";

/// Header written once when a key store directory is initialised.
#[derive(Debug, Serialize, Deserialize)]
struct StoreHeader {
    version: u32,
    /// Argon2id salt (hex).
    salt: String,
    /// Encrypted check value proving the passphrase (hex).
    check_nonce: String,
    check: String,
}

/// One sealed secret on disk.
#[derive(Debug, Serialize, Deserialize)]
struct SealedEntry {
    version: u32,
    storage_ref: String,
    nonce: String,
    ciphertext: String,
}

/// Passphrase-protected key store rooted at a directory.
pub struct EncryptedFileKeyStore {
    dir: PathBuf,
    master_key: Zeroizing<[u8; 32]>,
}

impl EncryptedFileKeyStore {
    /// Open or initialise the store in `dir`.
    ///
    /// An existing store opened with the wrong passphrase fails with
    /// `KeyAccessDenied`.
    pub async fn open(dir: impl AsRef<Path>, passphrase: &str) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let header_path = dir.join(HEADER_FILE);

        if tokio::fs::try_exists(&header_path).await? {
            let raw = tokio::fs::read_to_string(&header_path).await?;
            let header: StoreHeader = serde_json::from_str(&raw)?;
            if header.version != STORE_VERSION {
                return Err(WalletError::Storage(format!(
                    "unsupported key store version {}",
                    header.version
                )));
            }
            let salt: [u8; 16] = decode_hex(&header.salt)?
                .try_into()
                .map_err(|_| WalletError::Storage("key store salt must be 16 bytes".into()))?;
            let master_key = derive_master(passphrase, salt).await?;
            let check_key = Zeroizing::new(derive_key(&master_key, &key_store_check_context())?);
            let check = decrypt(
                &check_key,
                &decode_hex(&header.check_nonce)?,
                &decode_hex(&header.check)?,
            )
            .map_err(|_| WalletError::KeyAccessDenied("wrong passphrase".into()))?;
            if check != CHECK_PLAINTEXT {
                return Err(WalletError::KeyAccessDenied("wrong passphrase".into()));
            }
            debug!("opened key store at {}", dir.display());
            return Ok(Self { dir, master_key });
        }

        let salt = random_salt_16();
        let master_key = derive_master(passphrase, salt).await?;
        let check_key = Zeroizing::new(derive_key(&master_key, &key_store_check_context())?);
        let (nonce, check) = encrypt(&check_key, CHECK_PLAINTEXT)?;
        let header = StoreHeader {
            version: STORE_VERSION,
            salt: hex::encode(salt),
            check_nonce: hex::encode(nonce),
            check: hex::encode(check),
        };
        write_atomic(&header_path, serde_json::to_vec_pretty(&header)?).await?;
        info!("initialised key store at {}", dir.display());
        Ok(Self { dir, master_key })
    }

    fn entry_path(&self, storage_ref: &str) -> PathBuf {
        self.dir
            .join(format!("{}.key", hex::encode(storage_ref.as_bytes())))
    }

    fn entry_key(&self, storage_ref: &str) -> Result<Zeroizing<[u8; 32]>> {
        Ok(Zeroizing::new(derive_key(
            &self.master_key,
            &key_entry_context(storage_ref),
        )?))
    }
}

async fn derive_master(passphrase: &str, salt: [u8; 16]) -> Result<Zeroizing<[u8; 32]>> {
    let passphrase = Zeroizing::new(passphrase.as_bytes().to_vec());
    tokio::task::spawn_blocking(move || derive_passphrase_key(&passphrase, &salt).map(Zeroizing::new))
        .await
        .map_err(|e| WalletError::DerivationFailed(format!("key derivation task: {e}")))?
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| WalletError::Storage(format!("corrupt key store field: {e}")))
}

async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl PrivateKeyStore for EncryptedFileKeyStore {
    async fn put(&self, storage_ref: &str, secret: &[u8]) -> Result<()> {
        let key = self.entry_key(storage_ref)?;
        let (nonce, ciphertext) = encrypt(&key, secret)?;
        let entry = SealedEntry {
            version: STORE_VERSION,
            storage_ref: storage_ref.to_string(),
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
        };
        write_atomic(&self.entry_path(storage_ref), serde_json::to_vec(&entry)?).await
    }

    async fn get(&self, storage_ref: &str) -> Result<Zeroizing<Vec<u8>>> {
        let raw = match tokio::fs::read_to_string(self.entry_path(storage_ref)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WalletError::KeyNotFound(storage_ref.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let entry: SealedEntry = serde_json::from_str(&raw)?;
        if entry.storage_ref != storage_ref {
            return Err(WalletError::KeyAccessDenied(format!(
                "entry for {storage_ref} holds a different key"
            )));
        }
        let key = self.entry_key(storage_ref)?;
        let plaintext = decrypt(
            &key,
            &decode_hex(&entry.nonce)?,
            &decode_hex(&entry.ciphertext)?,
        )
        .map_err(|_| WalletError::KeyAccessDenied(format!("cannot unseal {storage_ref}")))?;
        Ok(Zeroizing::new(plaintext))
    }

    async fn delete(&self, storage_ref: &str) -> Result<()> {
        match tokio::fs::remove_file(self.entry_path(storage_ref)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
