//! Agent strategy: a signed request/response exchange with the issuer's
//! agent, shaped after iden3comm plain messages.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::credential::{CredentialStatus, IssuerData};
use crate::did::Did;
use crate::error::{Result, WalletError};
use crate::kms::{verify_signature, KeyType};

use super::status::{transport_error, within, ResolveOptions, RevocationStatus};

pub const PLAIN_MEDIA_TYPE: &str = "application/iden3comm-plain-json";
pub const REVOCATION_REQUEST_TYPE: &str =
    "https://iden3-communication.io/revocation/1.0/request-status";
pub const REVOCATION_RESPONSE_TYPE: &str = "https://iden3-communication.io/revocation/1.0/status";

/// A plain agent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    /// Thread id; a response carries the id of its request.
    pub thid: String,
    pub typ: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRequestBody {
    pub revocation_nonce: u64,
}

/// Body of a status response, signed by the issuer's auth key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusBody {
    pub status: RevocationStatus,
    /// The issuer state and auth claim proving whose key signed.
    pub issuer_data: IssuerData,
    pub key_type: KeyType,
    pub signature: String,
}

impl AgentMessage {
    /// Status request for `nonce`, addressed to `issuer`.
    pub fn revocation_request(issuer: &Did, nonce: u64) -> Result<Self> {
        let id = uuid::Uuid::new_v4().to_string();
        Ok(Self {
            thid: id.clone(),
            id,
            typ: PLAIN_MEDIA_TYPE.into(),
            message_type: REVOCATION_REQUEST_TYPE.into(),
            from: None,
            to: Some(issuer.to_string()),
            body: serde_json::to_value(RevocationRequestBody {
                revocation_nonce: nonce,
            })?,
        })
    }

    /// Response to `request` carrying `body`.
    pub fn revocation_response(request: &AgentMessage, body: &AgentStatusBody) -> Result<Self> {
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            thid: request.thid.clone(),
            typ: PLAIN_MEDIA_TYPE.into(),
            message_type: REVOCATION_RESPONSE_TYPE.into(),
            from: request.to.clone(),
            to: request.from.clone(),
            body: serde_json::to_value(body)?,
        })
    }
}

impl AgentStatusBody {
    /// Digest the issuer signs: binds the status to the request thread.
    pub fn signing_digest(thid: &str, status: &RevocationStatus) -> Result<[u8; 32]> {
        Ok(Sha256::new()
            .chain_update(b"idwallet/agent-status/v1")
            .chain_update(thid.as_bytes())
            .chain_update(serde_json::to_vec(status)?)
            .finalize()
            .into())
    }

    /// Check that `issuer`'s auth key signed this body on thread `thid`.
    pub fn verify(&self, thid: &str, issuer: &Did) -> Result<()> {
        if self.issuer_data.id != issuer.to_string() {
            return Err(WalletError::InvalidProof(format!(
                "status signed by {} instead of {issuer}",
                self.issuer_data.id
            )));
        }
        if self.issuer_data.state != self.status.issuer_state {
            return Err(WalletError::InvalidProof(
                "signing key proven against a different state".into(),
            ));
        }
        let (key_type, public_key) = self.issuer_data.verify_auth_key()?;
        if key_type != self.key_type {
            return Err(WalletError::InvalidProof("key type mismatch".into()));
        }
        let signature = hex::decode(&self.signature)
            .map_err(|e| WalletError::InvalidProof(format!("signature hex: {e}")))?;
        let digest = Self::signing_digest(thid, &self.status)?;
        verify_signature(key_type, &public_key, &digest, &signature)?;
        self.status.verify()
    }
}

/// Delivers agent messages and returns the reply.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn send(&self, endpoint: &str, message: AgentMessage) -> Result<AgentMessage>;
}

#[derive(Clone)]
pub struct AgentResolver {
    transport: Arc<dyn AgentTransport>,
    depth: u8,
}

impl AgentResolver {
    pub fn new(transport: Arc<dyn AgentTransport>, depth: u8) -> Self {
        Self { transport, depth }
    }

    pub async fn resolve(
        &self,
        issuer: &Did,
        status: &CredentialStatus,
        opts: &ResolveOptions,
    ) -> Result<RevocationStatus> {
        let nonce = status.revocation_nonce;
        let request = AgentMessage::revocation_request(issuer, nonce)?;
        let thid = request.thid.clone();
        let response = within(
            opts.timeout,
            self.transport.send(&status.id, request),
            || WalletError::AgentTimeout(format!("{} did not answer", status.id)),
        )
        .await
        .map_err(|e| transport_error(e, WalletError::AgentTimeout))?;

        if response.message_type != REVOCATION_RESPONSE_TYPE || response.thid != thid {
            return Err(WalletError::InvalidProof(format!(
                "unexpected agent reply {} on thread {}",
                response.message_type, response.thid
            )));
        }
        let body: AgentStatusBody = serde_json::from_value(response.body)?;
        body.status.ensure_depth(self.depth)?;
        body.verify(&thid, issuer)?;
        if body.status.nonce != nonce {
            return Err(WalletError::InvalidProof(format!(
                "agent answered for nonce {} instead of {nonce}",
                body.status.nonce
            )));
        }
        debug!("agent {issuer}: nonce {nonce} revoked={}", body.status.revoked);
        Ok(body.status)
    }
}
