//! Holder-side credential wallet: storage plus cached revocation checks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use tokio::sync::Mutex;

use crate::credential::{StatusType, W3CCredential};
use crate::did::{Did, DidMethodRegistry};
use crate::error::Result;
use crate::resolver::{ResolveOptions, ResolverRegistry, RevocationResolver, RevocationStatus};
use crate::storage::{CredentialFilter, CredentialStore};

use super::identity::AUTH_CREDENTIAL_TYPE;

/// How a revocation lookup may use earlier results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Always resolve.
    Refresh,
    /// Use a cached result younger than the given age.
    MaxAge(Duration),
    /// Use any cached result.
    PreferCached,
}

struct CachedStatus {
    status: RevocationStatus,
    fetched_at: Instant,
}

pub struct CredentialWallet {
    store: CredentialStore,
    resolvers: Arc<ResolverRegistry>,
    registry: Arc<DidMethodRegistry>,
    resolve_timeout: Option<Duration>,
    cache: Mutex<HashMap<String, CachedStatus>>,
}

impl CredentialWallet {
    pub fn new(store: CredentialStore, resolvers: Arc<ResolverRegistry>) -> Self {
        Self {
            store,
            resolvers,
            registry: Arc::new(DidMethodRegistry::default()),
            resolve_timeout: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Registry used to parse issuer DIDs.
    pub fn with_method_registry(mut self, registry: Arc<DidMethodRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_resolve_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn resolvers(&self) -> &Arc<ResolverRegistry> {
        &self.resolvers
    }

    pub async fn register_resolver(
        &self,
        status_type: StatusType,
        resolver: RevocationResolver,
    ) -> Result<()> {
        self.resolvers.register(status_type, resolver).await
    }

    // ── Storage ──────────────────────────────────────────────────────────

    pub async fn save(&self, credential: &W3CCredential) -> Result<()> {
        self.store.put(credential).await?;
        self.cache.lock().await.remove(&credential.id);
        Ok(())
    }

    pub async fn save_all(&self, credentials: &[W3CCredential]) -> Result<()> {
        for credential in credentials {
            self.save(credential).await?;
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<W3CCredential> {
        self.store.get(id).await
    }

    pub async fn list(&self, filter: &CredentialFilter) -> Result<Vec<W3CCredential>> {
        self.store.list(filter).await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        self.store.remove(id).await?;
        self.cache.lock().await.remove(id);
        Ok(())
    }

    /// The auth credential `did` issued for itself, if stored here.
    pub async fn find_auth_credential(&self, did: &Did) -> Result<Option<W3CCredential>> {
        let did = did.to_string();
        let filter = CredentialFilter::default()
            .issuer(did.clone())
            .credential_type(AUTH_CREDENTIAL_TYPE);
        Ok(self
            .store
            .list(&filter)
            .await?
            .into_iter()
            .find(|c| c.subject_id() == Some(did.as_str())))
    }

    // ── Revocation ───────────────────────────────────────────────────────

    /// Revocation status of `credential`, resolved through the registry.
    pub async fn get_revocation_status(
        &self,
        credential: &W3CCredential,
        policy: CachePolicy,
    ) -> Result<RevocationStatus> {
        let opts = ResolveOptions {
            timeout: self.resolve_timeout,
        };
        self.get_revocation_status_with(credential, policy, &opts)
            .await
    }

    /// [`get_revocation_status`](Self::get_revocation_status) with explicit
    /// resolve options. Failures are returned as errors and leave the cache
    /// untouched.
    pub async fn get_revocation_status_with(
        &self,
        credential: &W3CCredential,
        policy: CachePolicy,
        opts: &ResolveOptions,
    ) -> Result<RevocationStatus> {
        if let Some(status) = self.cached(&credential.id, policy).await {
            debug!("revocation status of {} served from cache", credential.id);
            return Ok(status);
        }
        let issuer = Did::parse_with(&self.registry, &credential.issuer)?;
        let status = self
            .resolvers
            .resolve(&issuer, &credential.credential_status, opts)
            .await?;
        self.cache.lock().await.insert(
            credential.id.clone(),
            CachedStatus {
                status: status.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(status)
    }

    async fn cached(&self, id: &str, policy: CachePolicy) -> Option<RevocationStatus> {
        let cache = self.cache.lock().await;
        let entry = cache.get(id)?;
        match policy {
            CachePolicy::Refresh => None,
            CachePolicy::MaxAge(age) if entry.fetched_at.elapsed() > age => None,
            CachePolicy::MaxAge(_) | CachePolicy::PreferCached => Some(entry.status.clone()),
        }
    }

    /// Check every stored credential and return the revoked ones. The first
    /// resolution failure aborts the sweep.
    pub async fn refresh_all(&self, policy: CachePolicy) -> Result<Vec<W3CCredential>> {
        let mut revoked = Vec::new();
        let all = self.store.list(&CredentialFilter::default()).await?;
        let total = all.len();
        for credential in all {
            if self.get_revocation_status(&credential, policy).await?.revoked {
                revoked.push(credential);
            }
        }
        info!("checked {total} credentials, {} revoked", revoked.len());
        Ok(revoked)
    }
}
