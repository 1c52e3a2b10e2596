//! The W3C-style credential document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{Result, WalletError};

use super::proof::CredentialProof;
use super::status::CredentialStatus;

pub const W3C_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const IDEN3_PROOFS_CONTEXT: &str =
    "https://schema.iden3.io/core/jsonld/iden3proofs.jsonld";

const CONTENT_ID_PREFIX: &str = "urn:blake3:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSchema {
    pub id: String,
    #[serde(rename = "type")]
    pub schema_type: String,
}

/// A verifiable credential. Immutable once built; revocation status lives
/// outside the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct W3CCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,
    pub issuer: String,
    pub issuance_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    pub credential_subject: Map<String, Value>,
    pub credential_status: CredentialStatus,
    pub credential_schema: CredentialSchema,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proof: Vec<CredentialProof>,
}

impl W3CCredential {
    /// Content address over the document without `id` and `proof`:
    /// `urn:blake3:<hex>` of its canonical JSON (keys sorted).
    pub fn content_id(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("id");
            map.remove("proof");
        }
        let canonical = serde_json::to_vec(&value)?;
        Ok(format!(
            "{CONTENT_ID_PREFIX}{}",
            blake3::hash(&canonical).to_hex()
        ))
    }

    /// Set `id` to the content address.
    pub fn seal_id(&mut self) -> Result<()> {
        self.id = self.content_id()?;
        Ok(())
    }

    /// Whether `id` is a content address that matches the document.
    /// Documents with foreign ids are not checked.
    pub fn check_content_id(&self) -> Result<()> {
        if !self.id.starts_with(CONTENT_ID_PREFIX) {
            return Ok(());
        }
        let expected = self.content_id()?;
        if expected != self.id {
            return Err(WalletError::InvalidCredential(format!(
                "id {} does not match content {expected}",
                self.id
            )));
        }
        Ok(())
    }

    /// `credentialSubject.id`, if present.
    pub fn subject_id(&self) -> Option<&str> {
        self.credential_subject.get("id").and_then(Value::as_str)
    }

    /// The credential type other than `VerifiableCredential`.
    pub fn primary_type(&self) -> Option<&str> {
        self.credential_type
            .iter()
            .map(String::as_str)
            .find(|t| *t != "VerifiableCredential")
    }

    pub fn has_type(&self, t: &str) -> bool {
        self.credential_type.iter().any(|ct| ct == t)
    }

    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        self.expiration_date.map(|exp| exp <= at).unwrap_or(false)
    }

    /// Digest an issuer signs for this credential: binds the content address
    /// to the core claim hash.
    pub fn signing_digest(content_id: &str, claim_hash: &crate::merkle::Hash) -> [u8; 32] {
        Sha256::new()
            .chain_update(b"idwallet/credential/v1")
            .chain_update(content_id.as_bytes())
            .chain_update(claim_hash.as_bytes())
            .finalize()
            .into()
    }
}

/// 32-byte commitment to a credential subject, stored in the claim's first
/// index slot. Canonical JSON with sorted keys.
pub fn subject_commitment(subject: &Map<String, Value>) -> Result<[u8; 32]> {
    let canonical = serde_json::to_vec(subject)?;
    Ok(Sha256::digest(&canonical).into())
}
