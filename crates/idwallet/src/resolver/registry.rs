//! Strategy registry keyed by descriptor type.

use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::RwLock;

use crate::credential::{CredentialStatus, StatusType};
use crate::did::Did;
use crate::error::{Result, WalletError};

use super::status::{ResolveOptions, RevocationStatus};
use super::RevocationResolver;

#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: RwLock<HashMap<StatusType, Arc<RevocationResolver>>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resolver` for `status_type`. Re-registering replaces the
    /// previous strategy.
    pub async fn register(&self, status_type: StatusType, resolver: RevocationResolver) -> Result<()> {
        if resolver.status_type() != status_type {
            return Err(WalletError::InvalidConfig(format!(
                "{} resolver registered under {status_type}",
                resolver.status_type()
            )));
        }
        let mut resolvers = self.resolvers.write().await;
        if resolvers.insert(status_type, Arc::new(resolver)).is_some() {
            warn!("replaced resolver for {status_type}");
        } else {
            info!("registered resolver for {status_type}");
        }
        Ok(())
    }

    pub async fn get(&self, status_type: StatusType) -> Result<Arc<RevocationResolver>> {
        self.resolvers
            .read()
            .await
            .get(&status_type)
            .cloned()
            .ok_or_else(|| WalletError::NoResolverRegistered(status_type.to_string()))
    }

    pub async fn registered(&self) -> Vec<StatusType> {
        let resolvers = self.resolvers.read().await;
        StatusType::ALL
            .into_iter()
            .filter(|t| resolvers.contains_key(t))
            .collect()
    }

    /// Resolve `status` with the strategy registered for its type.
    pub async fn resolve(
        &self,
        issuer: &Did,
        status: &CredentialStatus,
        opts: &ResolveOptions,
    ) -> Result<RevocationStatus> {
        // The lock is not held across the network call.
        let resolver = self.get(status.status_type).await?;
        resolver.resolve(issuer, status, opts).await
    }
}
