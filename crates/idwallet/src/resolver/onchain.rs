//! On-chain strategy: the anchored state of the chain named in the
//! descriptor, walked over that chain's published nodes.

use std::sync::Arc;

use log::debug;

use crate::anchor::StateAnchor;
use crate::credential::CredentialStatus;
use crate::did::Did;
use crate::error::{Result, WalletError};
use crate::merkle::Hash;

use super::nodes::{walk_proof, NodeSource};
use super::status::{transport_error, within, ResolveOptions, RevocationStatus};

/// One configured chain.
#[derive(Clone)]
pub struct ChainEndpoint {
    pub chain_id: u64,
    pub anchor: Arc<dyn StateAnchor>,
    pub nodes: Arc<dyn NodeSource>,
}

#[derive(Clone)]
pub struct OnChainResolver {
    chains: Vec<ChainEndpoint>,
    depth: u8,
}

impl OnChainResolver {
    pub fn new(chains: Vec<ChainEndpoint>, depth: u8) -> Self {
        Self { chains, depth }
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.chains.iter().map(|c| c.chain_id).collect()
    }

    async fn anchored_state(
        chain: &ChainEndpoint,
        issuer: &Did,
        status: &CredentialStatus,
    ) -> Result<Hash> {
        match chain.anchor.read(issuer).await {
            Ok(record) => Ok(record.state.value),
            // An identity that never published still resolves at genesis.
            Err(WalletError::StateNotFound(did)) => match status.state_hash {
                Some(state) if issuer.is_genesis_state(&state) => Ok(state),
                _ => Err(WalletError::StateNotFound(did)),
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
        let (chain_id, contract) = status.contract_address()?;
        let chain = self
            .chains
            .iter()
            .find(|c| c.chain_id == chain_id)
            .ok_or_else(|| WalletError::UnknownChain(chain_id.to_string()))?;

        let nonce = status.revocation_nonce;
        let (issuer_state, mtp) = within(
            opts.timeout,
            async {
                let state = Self::anchored_state(chain, issuer, status).await?;
                walk_proof(chain.nodes.as_ref(), &state, nonce, self.depth).await
            },
            || WalletError::ChainReadError(format!("chain {chain_id} timed out")),
        )
        .await
        .map_err(|e| transport_error(e, WalletError::ChainReadError))?;

        let resolved = RevocationStatus::verified(nonce, issuer_state, mtp)?;
        debug!(
            "chain {chain_id} ({contract}) {issuer}: nonce {nonce} revoked={}",
            resolved.revoked
        );
        Ok(resolved)
    }
}
