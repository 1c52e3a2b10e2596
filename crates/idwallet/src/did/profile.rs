//! Profiles: identifiers derived from a root identity for one counterparty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifier::Did;

/// A derived identifier linked to its root by a nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub did: Did,
    pub root: Did,
    pub nonce: u64,
    /// Counterparty the profile is presented to.
    pub verifier: String,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(root: &Did, nonce: u64, verifier: impl Into<String>) -> Self {
        Self {
            did: root.profile(nonce),
            root: root.clone(),
            nonce,
            verifier: verifier.into(),
            created_at: crate::time::now_utc(),
        }
    }

    /// Whether this profile's identifier is the one derived from its root.
    pub fn is_linked(&self) -> bool {
        self.nonce != 0 && self.root.profile(self.nonce) == self.did
    }
}
