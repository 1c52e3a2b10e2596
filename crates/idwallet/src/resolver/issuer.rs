//! Issuer strategy: ask the issuer's own endpoint for a fresh proof.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::credential::CredentialStatus;
use crate::did::Did;
use crate::error::{Result, WalletError};

use super::status::{transport_error, within, ResolveOptions, RevocationStatus};

/// Transport to an issuer's revocation endpoint.
#[async_trait]
pub trait IssuerClient: Send + Sync {
    async fn revocation_status(
        &self,
        endpoint: &str,
        issuer: &Did,
        nonce: u64,
    ) -> Result<RevocationStatus>;
}

#[derive(Clone)]
pub struct IssuerResolver {
    client: Arc<dyn IssuerClient>,
    depth: u8,
}

impl IssuerResolver {
    /// Resolver asking `client` about trees of `depth`.
    pub fn new(client: Arc<dyn IssuerClient>, depth: u8) -> Self {
        Self { client, depth }
    }

    pub async fn resolve(
        &self,
        issuer: &Did,
        status: &CredentialStatus,
        opts: &ResolveOptions,
    ) -> Result<RevocationStatus> {
        let nonce = status.revocation_nonce;
        let fetched = within(
            opts.timeout,
            self.client.revocation_status(&status.id, issuer, nonce),
            || WalletError::IssuerUnreachable(format!("{} timed out", status.id)),
        )
        .await
        .map_err(|e| transport_error(e, WalletError::IssuerUnreachable))?;

        if fetched.nonce != nonce {
            return Err(WalletError::InvalidProof(format!(
                "issuer answered for nonce {} instead of {nonce}",
                fetched.nonce
            )));
        }
        fetched.ensure_depth(self.depth)?;
        fetched.verify()?;
        debug!("issuer {issuer}: nonce {nonce} revoked={}", fetched.revoked);
        Ok(fetched)
    }
}
