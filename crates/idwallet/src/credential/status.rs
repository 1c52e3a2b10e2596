//! Revocation descriptors (`credentialStatus`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WalletError};
use crate::merkle::Hash;

/// Strategy used to check a credential's revocation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusType {
    /// Ask the issuer's endpoint for a fresh proof.
    #[serde(rename = "SparseMerkleTreeProof")]
    Issuer,
    /// Walk tree nodes published to a reverse hash service.
    #[serde(rename = "Iden3ReverseSparseMerkleTreeProof")]
    ReverseHashService,
    /// Read the anchored state from a chain and walk its published nodes.
    #[serde(rename = "Iden3OnchainSparseMerkleTreeProof2023")]
    OnChain,
    /// Ask the issuer's agent over a message exchange.
    #[serde(rename = "Iden3commRevocationStatusV1.0")]
    Agent,
}

impl StatusType {
    pub const ALL: [StatusType; 4] = [
        StatusType::Issuer,
        StatusType::ReverseHashService,
        StatusType::OnChain,
        StatusType::Agent,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issuer => "SparseMerkleTreeProof",
            Self::ReverseHashService => "Iden3ReverseSparseMerkleTreeProof",
            Self::OnChain => "Iden3OnchainSparseMerkleTreeProof2023",
            Self::Agent => "Iden3commRevocationStatusV1.0",
        }
    }
}

impl fmt::Display for StatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusType {
    type Err = WalletError;

    /// Accepts wire names and the short forms `issuer`, `rhs`, `onchain`, `agent`.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SparseMerkleTreeProof" | "issuer" => Ok(Self::Issuer),
            "Iden3ReverseSparseMerkleTreeProof" | "rhs" => Ok(Self::ReverseHashService),
            "Iden3OnchainSparseMerkleTreeProof2023" | "onchain" => Ok(Self::OnChain),
            "Iden3commRevocationStatusV1.0" | "agent" => Ok(Self::Agent),
            other => Err(WalletError::InvalidCredential(format!(
                "unknown status type {other}"
            ))),
        }
    }
}

/// The `credentialStatus` block of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    /// Endpoint or locator; meaning depends on `status_type`.
    pub id: String,
    #[serde(rename = "type")]
    pub status_type: StatusType,
    pub revocation_nonce: u64,
    /// Issuer state the credential was issued against, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_hash: Option<Hash>,
}

impl CredentialStatus {
    /// `(chain id, contract address)` from a `contractAddress=<chain>:<addr>`
    /// parameter in `id`.
    pub fn contract_address(&self) -> Result<(u64, String)> {
        let query = self.id.split_once('?').map(|(_, q)| q).unwrap_or("");
        let value = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("contractAddress="))
            .ok_or_else(|| {
                WalletError::InvalidCredential(format!("no contractAddress in {}", self.id))
            })?;
        let (chain, address) = value.split_once(':').ok_or_else(|| {
            WalletError::InvalidCredential(format!("contractAddress must be <chainId>:<address>, got {value}"))
        })?;
        let chain_id = chain
            .parse::<u64>()
            .map_err(|e| WalletError::InvalidCredential(format!("chain id {chain}: {e}")))?;
        Ok((chain_id, address.to_string()))
    }
}

/// Revocation settings chosen when creating an identity or issuing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationOptions {
    #[serde(rename = "type")]
    pub status_type: StatusType,
    pub id: String,
    /// Fixed nonce; a random one is drawn when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

impl RevocationOptions {
    pub fn new(status_type: StatusType, id: impl Into<String>) -> Self {
        Self {
            status_type,
            id: id.into(),
            nonce: None,
        }
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Descriptor for a credential with `nonce`.
    pub fn descriptor(&self, nonce: u64, state_hash: Option<Hash>) -> CredentialStatus {
        CredentialStatus {
            id: self.id.clone(),
            status_type: self.status_type,
            revocation_nonce: nonce,
            state_hash,
        }
    }
}
