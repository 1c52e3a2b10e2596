//! Revocation resolution.
//!
//! A credential's `credentialStatus.type` picks one of four strategies. Each
//! one produces a [`RevocationStatus`] whose proof has been checked against
//! the revocation root of the issuer state it reports. A failed lookup is
//! always an error, never `revoked: false`.

pub mod agent;
pub mod issuer;
pub mod nodes;
pub mod onchain;
pub mod registry;
pub mod rhs;
pub mod status;

use crate::credential::{CredentialStatus, StatusType};
use crate::did::Did;
use crate::error::Result;

pub use agent::{AgentMessage, AgentResolver, AgentStatusBody, AgentTransport};
pub use issuer::{IssuerClient, IssuerResolver};
pub use nodes::{walk_proof, InMemoryRhs, NodePublisher, NodeSource};
pub use onchain::{ChainEndpoint, OnChainResolver};
pub use registry::ResolverRegistry;
pub use rhs::RhsResolver;
pub use status::{ResolveOptions, RevocationStatus};

/// The four resolution strategies.
#[derive(Clone)]
pub enum RevocationResolver {
    Issuer(IssuerResolver),
    ReverseHashService(RhsResolver),
    OnChain(OnChainResolver),
    Agent(AgentResolver),
}

impl RevocationResolver {
    /// The descriptor type this strategy answers.
    pub fn status_type(&self) -> StatusType {
        match self {
            Self::Issuer(_) => StatusType::Issuer,
            Self::ReverseHashService(_) => StatusType::ReverseHashService,
            Self::OnChain(_) => StatusType::OnChain,
            Self::Agent(_) => StatusType::Agent,
        }
    }

    pub async fn resolve(
        &self,
        issuer: &Did,
        status: &CredentialStatus,
        opts: &ResolveOptions,
    ) -> Result<RevocationStatus> {
        match self {
            Self::Issuer(r) => r.resolve(issuer, status, opts).await,
            Self::ReverseHashService(r) => r.resolve(issuer, status, opts).await,
            Self::OnChain(r) => r.resolve(issuer, status, opts).await,
            Self::Agent(r) => r.resolve(issuer, status, opts).await,
        }
    }
}
