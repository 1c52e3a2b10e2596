//! Credential proofs: issuer signature and Merkle tree inclusion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::claim::Claim;
use crate::error::{Result, WalletError};
use crate::kms::{verify_signature, KeyType};
use crate::merkle::{MerkleProof, TreeState};

use super::document::{subject_commitment, W3CCredential};

/// Issuer context a proof was produced in: the issuer state and the proof
/// that the signing key's auth claim is part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerData {
    pub id: String,
    pub state: TreeState,
    /// Hex core claim of the issuer's auth claim.
    pub auth_core_claim: String,
    /// Inclusion of the auth claim in `state.claimsTreeRoot`.
    pub mtp: MerkleProof,
}

impl IssuerData {
    /// Check the auth claim against the issuer state and return its key.
    pub fn verify_auth_key(&self) -> Result<(KeyType, Vec<u8>)> {
        if !self.state.is_consistent() {
            return Err(WalletError::InvalidProof(
                "issuer state does not match its sub-roots".into(),
            ));
        }
        let auth = Claim::from_hex(&self.auth_core_claim)?;
        self.mtp
            .ensure(
                &self.state.claims_tree_root,
                auth.revocation_nonce,
                Some(&auth.hash()),
            )
            .map_err(|_| {
                WalletError::InvalidProof("auth claim is not in the issuer claims tree".into())
            })?;
        auth.auth_public_key()
    }
}

/// Issuer signature over the credential's content address and core claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureProof {
    pub issuer_data: IssuerData,
    pub core_claim: String,
    pub key_type: KeyType,
    pub verification_method: String,
    pub created: DateTime<Utc>,
    /// Hex signature.
    pub signature: String,
}

/// Inclusion of the core claim in the issuer's claims tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseMerkleTreeProof {
    pub issuer_data: IssuerData,
    pub core_claim: String,
    pub mtp: MerkleProof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CredentialProof {
    #[serde(rename = "Iden3SignatureProof2024")]
    Signature(SignatureProof),
    #[serde(rename = "Iden3SparseMerkleTreeProof")]
    MerkleTree(SparseMerkleTreeProof),
}

impl CredentialProof {
    pub fn core_claim(&self) -> &str {
        match self {
            Self::Signature(p) => &p.core_claim,
            Self::MerkleTree(p) => &p.core_claim,
        }
    }

    pub fn issuer_data(&self) -> &IssuerData {
        match self {
            Self::Signature(p) => &p.issuer_data,
            Self::MerkleTree(p) => &p.issuer_data,
        }
    }
}

/// Whether `claim` commits to `subject`.
///
/// Auth claims carry the subject's `publicKey` in their index slots; other
/// claims carry a hash of the whole subject.
pub fn claim_matches_subject(claim: &Claim, subject: &Map<String, Value>) -> Result<bool> {
    if claim.is_auth() {
        let (_, pk) = claim.auth_public_key()?;
        let declared = subject.get("publicKey").and_then(Value::as_str);
        return Ok(declared == Some(hex::encode(pk).as_str()));
    }
    Ok(claim.index_data[0] == subject_commitment(subject)?)
}

fn check_claim_binding(credential: &W3CCredential, core_claim: &str) -> Result<Claim> {
    let claim = Claim::from_hex(core_claim)?;
    if claim.revocation_nonce != credential.credential_status.revocation_nonce {
        return Err(WalletError::InvalidProof(
            "core claim nonce differs from credentialStatus".into(),
        ));
    }
    if !claim_matches_subject(&claim, &credential.credential_subject)? {
        return Err(WalletError::InvalidProof(
            "core claim does not commit to credentialSubject".into(),
        ));
    }
    Ok(claim)
}

impl SignatureProof {
    pub fn verify(&self, credential: &W3CCredential) -> Result<()> {
        if self.issuer_data.id != credential.issuer {
            return Err(WalletError::InvalidProof("issuer mismatch".into()));
        }
        let (key_type, public_key) = self.issuer_data.verify_auth_key()?;
        if key_type != self.key_type {
            return Err(WalletError::InvalidProof("key type mismatch".into()));
        }
        let claim = check_claim_binding(credential, &self.core_claim)?;
        let content_id = credential.content_id()?;
        let digest = W3CCredential::signing_digest(&content_id, &claim.hash());
        let signature = hex::decode(&self.signature)
            .map_err(|e| WalletError::InvalidProof(format!("signature hex: {e}")))?;
        verify_signature(key_type, &public_key, &digest, &signature)
    }
}

impl SparseMerkleTreeProof {
    pub fn verify(&self, credential: &W3CCredential) -> Result<()> {
        if self.issuer_data.id != credential.issuer {
            return Err(WalletError::InvalidProof("issuer mismatch".into()));
        }
        if !self.issuer_data.state.is_consistent() {
            return Err(WalletError::InvalidProof("inconsistent issuer state".into()));
        }
        let claim = check_claim_binding(credential, &self.core_claim)?;
        self.mtp.ensure(
            &self.issuer_data.state.claims_tree_root,
            claim.revocation_nonce,
            Some(&claim.hash()),
        )
    }
}

impl W3CCredential {
    /// Verify every attached proof. A credential without proofs fails.
    pub fn verify_proofs(&self) -> Result<()> {
        self.check_content_id()?;
        if self.proof.is_empty() {
            return Err(WalletError::InvalidCredential("credential has no proof".into()));
        }
        for proof in &self.proof {
            match proof {
                CredentialProof::Signature(p) => p.verify(self)?,
                CredentialProof::MerkleTree(p) => p.verify(self)?,
            }
        }
        Ok(())
    }

    pub fn signature_proof(&self) -> Option<&SignatureProof> {
        self.proof.iter().find_map(|p| match p {
            CredentialProof::Signature(s) => Some(s),
            _ => None,
        })
    }

    pub fn merkle_proof(&self) -> Option<&SparseMerkleTreeProof> {
        self.proof.iter().find_map(|p| match p {
            CredentialProof::MerkleTree(m) => Some(m),
            _ => None,
        })
    }

    /// Core claim carried by the first proof.
    pub fn core_claim(&self) -> Result<Claim> {
        let proof = self
            .proof
            .first()
            .ok_or_else(|| WalletError::InvalidCredential("credential has no proof".into()))?;
        Claim::from_hex(proof.core_claim())
    }
}
