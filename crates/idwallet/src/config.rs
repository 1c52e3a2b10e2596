//! Wallet configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credential::{IDEN3_PROOFS_CONTEXT, W3C_CONTEXT};
use crate::error::{Result, WalletError};
use crate::merkle::smt::MAX_DEPTH;
use crate::merkle::{RevocationPolicy, DEFAULT_TREE_DEPTH};

/// Which issuer state a credential's proofs reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofState {
    /// The state before the claim was inserted. Only a signature proof can
    /// be attached, since the claim is not yet in the referenced tree.
    PreIssuance,
    /// The state after insertion; carries a signature proof and an MTP.
    #[default]
    PostIssuance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Depth of every identity tree, 1..=64.
    pub tree_depth: u8,
    pub revocation_policy: RevocationPolicy,
    pub proof_state: ProofState,
    /// Applied to revocation lookups that do not set their own timeout.
    /// Zero disables it.
    pub default_resolve_timeout_ms: u64,
    /// `@context` written into issued credentials.
    pub credential_context: Vec<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            tree_depth: DEFAULT_TREE_DEPTH,
            revocation_policy: RevocationPolicy::Idempotent,
            proof_state: ProofState::PostIssuance,
            default_resolve_timeout_ms: 10_000,
            credential_context: vec![W3C_CONTEXT.to_string(), IDEN3_PROOFS_CONTEXT.to_string()],
        }
    }
}

impl WalletConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tree_depth == 0 || self.tree_depth > MAX_DEPTH {
            return Err(WalletError::InvalidConfig(format!(
                "tree_depth must be within 1..={MAX_DEPTH}, got {}",
                self.tree_depth
            )));
        }
        if !self.credential_context.iter().any(|c| c == W3C_CONTEXT) {
            return Err(WalletError::InvalidConfig(format!(
                "credential_context must include {W3C_CONTEXT}"
            )));
        }
        Ok(())
    }

    pub fn resolve_timeout(&self) -> Option<Duration> {
        (self.default_resolve_timeout_ms > 0)
            .then(|| Duration::from_millis(self.default_resolve_timeout_ms))
    }
}
