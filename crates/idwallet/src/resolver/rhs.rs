//! Reverse hash service strategy.

use std::sync::Arc;

use log::debug;

use crate::anchor::StateAnchor;
use crate::credential::CredentialStatus;
use crate::did::Did;
use crate::error::{Result, WalletError};
use crate::merkle::Hash;

use super::nodes::{walk_proof, NodeSource};
use super::status::{transport_error, within, ResolveOptions, RevocationStatus};

#[derive(Clone)]
pub struct RhsResolver {
    nodes: Arc<dyn NodeSource>,
    anchor: Arc<dyn StateAnchor>,
    depth: u8,
}

impl RhsResolver {
    /// Resolver walking `nodes` for trees of `depth`, from the issuer state
    /// last anchored on `anchor`.
    ///
    /// An issuer with nothing anchored resolves at the descriptor's
    /// `stateHash` only when that is the issuer's genesis state. Any later
    /// snapshot may predate a revocation and is refused.
    pub fn new(nodes: Arc<dyn NodeSource>, anchor: Arc<dyn StateAnchor>, depth: u8) -> Self {
        Self {
            nodes,
            anchor,
            depth,
        }
    }

    async fn issuer_state(&self, issuer: &Did, status: &CredentialStatus) -> Result<Hash> {
        match self.anchor.read(issuer).await {
            Ok(record) => Ok(record.state.value),
            Err(WalletError::StateNotFound(did)) => match status.state_hash {
                Some(state) if issuer.is_genesis_state(&state) => Ok(state),
                _ => Err(WalletError::StateNotFound(format!(
                    "{did}: nothing anchored and the descriptor state is not genesis"
                ))),
            },
            Err(e) => Err(e),
        }
    }

    pub async fn resolve(
        &self,
        issuer: &Did,
        status: &CredentialStatus,
        opts: &ResolveOptions,
    ) -> Result<RevocationStatus> {
        let nonce = status.revocation_nonce;
        let (issuer_state, mtp) = within(
            opts.timeout,
            async {
                let state = self.issuer_state(issuer, status).await?;
                walk_proof(self.nodes.as_ref(), &state, nonce, self.depth).await
            },
            || WalletError::RhsUnreachable(format!("{} timed out", status.id)),
        )
        .await
        .map_err(|e| transport_error(e, WalletError::RhsUnreachable))?;

        let resolved = RevocationStatus::verified(nonce, issuer_state, mtp)?;
        debug!("rhs {issuer}: nonce {nonce} revoked={}", resolved.revoked);
        Ok(resolved)
    }
}
