//! Resolution results and options.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Result, WalletError};
use crate::merkle::{Hash, MerkleProof, TreeState};

/// Revocation status of one nonce at one issuer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationStatus {
    pub revoked: bool,
    pub nonce: u64,
    pub issuer_state: TreeState,
    /// Proof for `nonce` against `issuer_state.revocationTreeRoot`.
    pub mtp: MerkleProof,
}

impl RevocationStatus {
    /// Build a status from a proof, deriving `revoked` from it.
    pub fn verified(nonce: u64, issuer_state: TreeState, mtp: MerkleProof) -> Result<Self> {
        let status = Self {
            revoked: mtp.includes(nonce),
            nonce,
            issuer_state,
            mtp,
        };
        status.verify()?;
        Ok(status)
    }

    /// Reject a proof for a tree of another depth than `depth`.
    pub fn ensure_depth(&self, depth: u8) -> Result<()> {
        if self.mtp.depth != depth {
            return Err(WalletError::InvalidProof(format!(
                "proof for nonce {} has depth {}, expected {depth}",
                self.nonce, self.mtp.depth
            )));
        }
        Ok(())
    }

    /// Check the proof against the issuer state's revocation root and that
    /// `revoked` agrees with it. Inclusion of the nonce means revoked.
    pub fn verify(&self) -> Result<()> {
        if !self.issuer_state.is_consistent() {
            return Err(WalletError::InvalidProof(
                "issuer state does not match its sub-roots".into(),
            ));
        }
        let root = &self.issuer_state.revocation_tree_root;
        if self.mtp.includes(self.nonce) {
            self.mtp.ensure(root, self.nonce, Some(&Hash::ZERO))?;
        } else {
            self.mtp.ensure(root, self.nonce, None)?;
        }
        if self.revoked != self.mtp.includes(self.nonce) {
            return Err(WalletError::InvalidProof(format!(
                "status for nonce {} contradicts its proof",
                self.nonce
            )));
        }
        Ok(())
    }
}

/// Per-call resolution options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Upper bound for the whole resolution, transport and proof walk.
    pub timeout: Option<Duration>,
}

impl ResolveOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Run `fut` under `timeout`, turning expiry into `on_timeout()`.
pub(crate) async fn within<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
    on_timeout: impl FnOnce() -> WalletError,
) -> Result<T> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout()),
        },
        None => fut.await,
    }
}

/// Rewrap transport failures as a strategy's network error. Validation and
/// consistency errors pass through untouched.
pub(crate) fn transport_error(err: WalletError, wrap: fn(String) -> WalletError) -> WalletError {
    match err.kind() {
        ErrorKind::Network | ErrorKind::Storage | ErrorKind::NotFound => wrap(err.to_string()),
        _ => err,
    }
}
