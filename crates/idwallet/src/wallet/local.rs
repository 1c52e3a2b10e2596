//! In-process transports backed by an issuer's [`IdentityWallet`].
//!
//! They let the issuer and agent strategies run without a network: the
//! holder's resolver calls straight into the issuer wallet. Both hold a
//! weak reference, so registering them with the issuer's own resolver
//! registry does not keep the wallet alive.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;

use crate::did::Did;
use crate::error::{Result, WalletError};
use crate::resolver::{AgentMessage, AgentTransport, IssuerClient, RevocationStatus};

use super::identity::IdentityWallet;

/// Shared reachability switches.
#[derive(Default)]
struct Link {
    offline: AtomicBool,
    latency_ms: AtomicU64,
}

impl Link {
    async fn pass(&self) -> bool {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        !self.offline.load(Ordering::SeqCst)
    }
}

pub struct LocalIssuerClient {
    wallet: Weak<IdentityWallet>,
    link: Link,
}

impl LocalIssuerClient {
    pub fn new(wallet: &Arc<IdentityWallet>) -> Self {
        Self {
            wallet: Arc::downgrade(wallet),
            link: Link::default(),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.link.offline.store(!online, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.link
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl IssuerClient for LocalIssuerClient {
    async fn revocation_status(
        &self,
        endpoint: &str,
        issuer: &Did,
        nonce: u64,
    ) -> Result<RevocationStatus> {
        if !self.link.pass().await {
            return Err(WalletError::IssuerUnreachable(format!("{endpoint} offline")));
        }
        let wallet = self
            .wallet
            .upgrade()
            .ok_or_else(|| WalletError::IssuerUnreachable(format!("{endpoint} shut down")))?;
        wallet.generate_non_revocation_proof(issuer, nonce).await
    }
}

pub struct LocalAgentTransport {
    wallet: Weak<IdentityWallet>,
    link: Link,
}

impl LocalAgentTransport {
    pub fn new(wallet: &Arc<IdentityWallet>) -> Self {
        Self {
            wallet: Arc::downgrade(wallet),
            link: Link::default(),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.link.offline.store(!online, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.link
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentTransport for LocalAgentTransport {
    async fn send(&self, endpoint: &str, message: AgentMessage) -> Result<AgentMessage> {
        if !self.link.pass().await {
            return Err(WalletError::AgentTimeout(format!("{endpoint} offline")));
        }
        let wallet = self
            .wallet
            .upgrade()
            .ok_or_else(|| WalletError::AgentTimeout(format!("{endpoint} shut down")))?;
        wallet.handle_revocation_status_request(&message).await
    }
}
