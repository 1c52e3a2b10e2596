//! Durable identity state trees.
//!
//! A tree is stored as its append-only event log, one bincode record per
//! event, plus a metadata record that acts as the commit point:
//!
//! ```text
//! tree/{did}/meta                  TreeMeta (depth, policy, committed count)
//! tree/{did}/event/{seq:020}       TreeEvent
//! ```
//!
//! Events beyond the committed count are ignored on load and overwritten on
//! the next save, so an interrupted save leaves the previous tree intact.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WalletError};
use crate::merkle::{IdentityStateTree, RevocationPolicy, TreeEvent};

use super::kv::KeyValueStore;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeMeta {
    version: u32,
    depth: u8,
    policy: RevocationPolicy,
    events: u64,
}

#[derive(Clone)]
pub struct TreeStorage {
    kv: Arc<dyn KeyValueStore>,
}

impl TreeStorage {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn meta_key(did: &str) -> String {
        format!("tree/{did}/meta")
    }

    fn event_key(did: &str, seq: u64) -> String {
        format!("tree/{did}/event/{seq:020}")
    }

    async fn meta(&self, did: &str) -> Result<Option<TreeMeta>> {
        match self.kv.get(&Self::meta_key(did)).await? {
            Some(bytes) => {
                let meta: TreeMeta = bincode::deserialize(&bytes)?;
                if meta.version != FORMAT_VERSION {
                    return Err(WalletError::Storage(format!(
                        "unsupported tree format {} for {did}",
                        meta.version
                    )));
                }
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    /// Persist events not yet committed, then commit.
    pub async fn save(&self, did: &str, tree: &IdentityStateTree) -> Result<()> {
        let committed = self.meta(did).await?.map(|m| m.events).unwrap_or(0);
        let history = tree.history();
        if (history.len() as u64) < committed {
            return Err(WalletError::Storage(format!(
                "tree for {did} has {} events, {committed} already committed",
                history.len()
            )));
        }

        let mut entries = Vec::new();
        for (seq, event) in history.iter().enumerate().skip(committed as usize) {
            entries.push((Self::event_key(did, seq as u64), bincode::serialize(event)?));
        }
        let appended = entries.len();
        if appended > 0 {
            self.kv.put_batch(entries).await?;
        }

        let meta = TreeMeta {
            version: FORMAT_VERSION,
            depth: tree.depth(),
            policy: tree.policy(),
            events: history.len() as u64,
        };
        self.kv
            .put(&Self::meta_key(did), bincode::serialize(&meta)?)
            .await?;
        debug!("saved tree for {did}: {appended} new events");
        Ok(())
    }

    /// Load by replaying the committed events.
    pub async fn load(&self, did: &str) -> Result<Option<IdentityStateTree>> {
        let Some(meta) = self.meta(did).await? else {
            return Ok(None);
        };
        let mut events: Vec<TreeEvent> = Vec::with_capacity(meta.events as usize);
        for seq in 0..meta.events {
            let bytes = self
                .kv
                .get(&Self::event_key(did, seq))
                .await?
                .ok_or_else(|| {
                    WalletError::Storage(format!("tree event {seq} missing for {did}"))
                })?;
            events.push(bincode::deserialize(&bytes)?);
        }
        IdentityStateTree::replay(meta.depth, meta.policy, &events).map(Some)
    }

    /// Drop the tree of `did`. The commit record goes first so a partial
    /// removal never leaves a loadable tree with missing events.
    pub async fn remove(&self, did: &str) -> Result<()> {
        self.kv.delete(&Self::meta_key(did)).await?;
        for key in self.kv.list(&format!("tree/{did}/event/")).await? {
            self.kv.delete(&key).await?;
        }
        debug!("removed tree for {did}");
        Ok(())
    }

    pub async fn exists(&self, did: &str) -> Result<bool> {
        Ok(self.meta(did).await?.is_some())
    }
}
