//! Fixed-width claims committed into the claims tree.
//!
//! A claim is immutable once built. Its hash is SHA-256 over a canonical
//! fixed-width encoding, and it is keyed in the tree by its revocation nonce.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::did::IdentityHash;
use crate::error::{Result, WalletError};
use crate::kms::{KeyHandle, KeyType};
use crate::merkle::Hash;

const FLAG_EXPIRATION: u8 = 0b001;
const FLAG_SUBJECT: u8 = 0b010;
const FLAG_ISSUER: u8 = 0b100;

/// Encoded length of a claim in bytes.
pub const CLAIM_LEN: usize = 16 + 4 + 8 + 1 + 8 + 31 + 31 + 64 + 64;

/// 16-byte hash identifying a claim schema.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaHash(pub [u8; 16]);

impl SchemaHash {
    /// Schema of the auth claim that carries an identity's signing key.
    pub const AUTH: SchemaHash = SchemaHash([
        0xca, 0x93, 0x88, 0x57, 0x24, 0x1d, 0xb9, 0x45, 0x1e, 0xa3, 0x29, 0x25, 0x6b, 0x9c, 0x06,
        0xe5,
    ]);

    /// Derive from a schema URL and credential type: `H(url "#" type)[..16]`.
    pub fn from_schema(url: &str, credential_type: &str) -> Self {
        let digest = Sha256::new()
            .chain_update(url.as_bytes())
            .chain_update(b"#")
            .chain_update(credential_type.as_bytes())
            .finalize();
        let mut out = [0u8; 16];
        out.copy_from_slice(&digest[..16]);
        Self(out)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SchemaHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaHash({})", self.to_hex())
    }
}

/// A claim: schema, optional subject/issuer, expiration, revocation nonce,
/// version and four 32-byte data slots (two index, two value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub schema_hash: SchemaHash,
    pub version: u32,
    pub revocation_nonce: u64,
    /// Unix seconds.
    pub expiration: Option<i64>,
    pub subject_id: Option<IdentityHash>,
    pub issuer_id: Option<IdentityHash>,
    pub index_data: [[u8; 32]; 2],
    pub value_data: [[u8; 32]; 2],
}

impl Claim {
    /// An empty claim of the given schema.
    pub fn new(schema_hash: SchemaHash) -> Self {
        Self {
            schema_hash,
            version: 0,
            revocation_nonce: 0,
            expiration: None,
            subject_id: None,
            issuer_id: None,
            index_data: [[0u8; 32]; 2],
            value_data: [[0u8; 32]; 2],
        }
    }

    /// Auth claim binding `key` to an identity.
    ///
    /// The public key fills the index slots (up to 64 bytes); the first
    /// value slot records the key type code and key length.
    pub fn auth(key: &KeyHandle, revocation_nonce: u64) -> Result<Self> {
        let pk = &key.public_key;
        if pk.is_empty() || pk.len() > 64 {
            return Err(WalletError::InvalidKey(format!(
                "public key of {} bytes does not fit an auth claim",
                pk.len()
            )));
        }
        let mut claim = Self::new(SchemaHash::AUTH);
        claim.revocation_nonce = revocation_nonce;
        let mut slots = [0u8; 64];
        slots[..pk.len()].copy_from_slice(pk);
        claim.index_data[0].copy_from_slice(&slots[..32]);
        claim.index_data[1].copy_from_slice(&slots[32..]);
        claim.value_data[0][0] = key.key_type.code();
        claim.value_data[0][1] = pk.len() as u8;
        Ok(claim)
    }

    pub fn is_auth(&self) -> bool {
        self.schema_hash == SchemaHash::AUTH
    }

    /// Key type and public key carried by an auth claim.
    pub fn auth_public_key(&self) -> Result<(KeyType, Vec<u8>)> {
        if !self.is_auth() {
            return Err(WalletError::InvalidProof("claim is not an auth claim".into()));
        }
        let key_type = KeyType::from_code(self.value_data[0][0])?;
        let len = self.value_data[0][1] as usize;
        if len == 0 || len > 64 {
            return Err(WalletError::InvalidKey(format!("bad auth key length {len}")));
        }
        let mut slots = [0u8; 64];
        slots[..32].copy_from_slice(&self.index_data[0]);
        slots[32..].copy_from_slice(&self.index_data[1]);
        Ok((key_type, slots[..len].to_vec()))
    }

    pub fn with_subject(mut self, subject: IdentityHash) -> Self {
        self.subject_id = Some(subject);
        self
    }

    pub fn with_issuer(mut self, issuer: IdentityHash) -> Self {
        self.issuer_id = Some(issuer);
        self
    }

    pub fn with_expiration(mut self, unix_seconds: i64) -> Self {
        self.expiration = Some(unix_seconds);
        self
    }

    pub fn with_revocation_nonce(mut self, nonce: u64) -> Self {
        self.revocation_nonce = nonce;
        self
    }

    // ── Encoding ─────────────────────────────────────────────────────────

    /// Canonical fixed-width encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CLAIM_LEN);
        let mut flags = 0u8;
        if self.expiration.is_some() {
            flags |= FLAG_EXPIRATION;
        }
        if self.subject_id.is_some() {
            flags |= FLAG_SUBJECT;
        }
        if self.issuer_id.is_some() {
            flags |= FLAG_ISSUER;
        }
        out.extend_from_slice(&self.schema_hash.0);
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.revocation_nonce.to_be_bytes());
        out.push(flags);
        out.extend_from_slice(&self.expiration.unwrap_or(0).to_be_bytes());
        out.extend_from_slice(&self.subject_id.map(|id| id.0).unwrap_or([0u8; 31]));
        out.extend_from_slice(&self.issuer_id.map(|id| id.0).unwrap_or([0u8; 31]));
        for slot in self.index_data.iter().chain(self.value_data.iter()) {
            out.extend_from_slice(slot);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CLAIM_LEN {
            return Err(WalletError::SerializationError(format!(
                "claim must be {CLAIM_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = Reader(bytes);
        let schema_hash = SchemaHash(r.array()?);
        let version = u32::from_be_bytes(r.array()?);
        let revocation_nonce = u64::from_be_bytes(r.array()?);
        let [flags] = r.array::<1>()?;
        let expiration = i64::from_be_bytes(r.array()?);
        let subject: [u8; 31] = r.array()?;
        let issuer: [u8; 31] = r.array()?;
        let index_data = [r.array()?, r.array()?];
        let value_data = [r.array()?, r.array()?];
        Ok(Self {
            schema_hash,
            version,
            revocation_nonce,
            expiration: (flags & FLAG_EXPIRATION != 0).then_some(expiration),
            subject_id: (flags & FLAG_SUBJECT != 0).then_some(IdentityHash(subject)),
            issuer_id: (flags & FLAG_ISSUER != 0).then_some(IdentityHash(issuer)),
            index_data,
            value_data,
        })
    }

    /// Hex form embedded in credential proofs as the core claim.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| WalletError::SerializationError(format!("claim hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// SHA-256 over the canonical encoding.
    pub fn hash(&self) -> Hash {
        Hash::digest(&[&self.to_bytes()])
    }
}

struct Reader<'a>(&'a [u8]);

impl Reader<'_> {
    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        if self.0.len() < N {
            return Err(WalletError::SerializationError("claim truncated".into()));
        }
        let (head, tail) = self.0.split_at(N);
        self.0 = tail;
        let mut out = [0u8; N];
        out.copy_from_slice(head);
        Ok(out)
    }
}
