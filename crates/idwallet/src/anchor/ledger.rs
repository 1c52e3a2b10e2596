//! In-process state ledger.
//!
//! Stands in for a chain state contract: it serialises writes, enforces
//! that each transition starts from the latest anchored state, binds a DID
//! to the genesis auth key that first anchored it, and stores published tree nodes so it
//! can also answer as an on-chain node source. Optionally persisted to a
//! [`KeyValueStore`] as JSON records under `ledger/{chainId}/`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::did::Did;
use crate::error::{Result, WalletError};
use crate::kms::KeyType;
use crate::merkle::{Hash, TreeNode};
use crate::resolver::nodes::{NodePublisher, NodeSource};
use crate::storage::KeyValueStore;

use super::{StateAnchor, StateRecord, StateTransition};

/// Anchored history and bound key of one DID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DidEntry {
    key: Option<(KeyType, String)>,
    records: Vec<StateRecord>,
}

#[derive(Default)]
struct LedgerState {
    dids: HashMap<String, DidEntry>,
    nodes: HashMap<Hash, TreeNode>,
}

pub struct LocalLedger {
    chain_id: u64,
    state: Mutex<LedgerState>,
    kv: Option<Arc<dyn KeyValueStore>>,
    online: AtomicBool,
    latency_ms: AtomicU64,
}

impl LocalLedger {
    /// Volatile ledger for `chain_id`.
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(LedgerState::default()),
            kv: None,
            online: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Ledger persisted to `kv`, loading whatever was stored before.
    pub async fn open(chain_id: u64, kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        let mut state = LedgerState::default();
        let did_prefix = format!("ledger/{chain_id}/did/");
        for key in kv.list(&did_prefix).await? {
            if let (Some(did), Some(bytes)) = (key.strip_prefix(&did_prefix), kv.get(&key).await?) {
                state
                    .dids
                    .insert(did.to_string(), serde_json::from_slice(&bytes)?);
            }
        }
        let node_prefix = format!("ledger/{chain_id}/node/");
        for key in kv.list(&node_prefix).await? {
            if let Some(bytes) = kv.get(&key).await? {
                let node: TreeNode = serde_json::from_slice(&bytes)?;
                state.nodes.insert(node.hash(), node);
            }
        }
        info!(
            "opened ledger {chain_id}: {} identities, {} nodes",
            state.dids.len(),
            state.nodes.len()
        );
        Ok(Self {
            chain_id,
            state: Mutex::new(state),
            kv: Some(kv),
            online: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Take the ledger offline (every call fails) or back online.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Delay applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    async fn reachable(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(WalletError::AnchorUnavailable(format!(
                "ledger {} offline",
                self.chain_id
            )));
        }
        Ok(())
    }

    /// Every state anchored for `did`, oldest first.
    pub async fn history(&self, did: &Did) -> Result<Vec<StateRecord>> {
        self.reachable().await?;
        Ok(self
            .state
            .lock()
            .await
            .dids
            .get(&did.to_string())
            .map(|e| e.records.clone())
            .unwrap_or_default())
    }

    async fn persist_did(&self, did: &str, entry: &DidEntry) -> Result<()> {
        if let Some(kv) = &self.kv {
            let key = format!("ledger/{}/did/{did}", self.chain_id);
            kv.put(&key, serde_json::to_vec(entry)?).await?;
        }
        Ok(())
    }
}

fn stale(did: &str, expected: Option<&Hash>, anchored: Option<&Hash>) -> WalletError {
    let show = |h: Option<&Hash>| h.map(|h| h.to_hex()).unwrap_or_else(|| "none".into());
    WalletError::StaleState {
        did: did.to_string(),
        expected: show(expected),
        anchored: show(anchored),
    }
}

#[async_trait]
impl StateAnchor for LocalLedger {
    async fn read(&self, did: &Did) -> Result<StateRecord> {
        self.reachable().await?;
        let did = did.to_string();
        self.state
            .lock()
            .await
            .dids
            .get(&did)
            .and_then(|e| e.records.last().cloned())
            .ok_or(WalletError::StateNotFound(did))
    }

    async fn write(&self, did: &Did, transition: &StateTransition) -> Result<StateRecord> {
        self.reachable().await?;
        let did_str = did.to_string();
        if transition.did != did_str {
            return Err(WalletError::InvalidProof(format!(
                "transition for {} written under {did_str}",
                transition.did
            )));
        }
        let (key_type, public_key) = transition.verify()?;
        let key = (key_type, hex::encode(&public_key));

        let mut state = self.state.lock().await;
        let mut entry = state.dids.get(&did_str).cloned().unwrap_or_default();
        let latest = entry.records.last().map(|r| r.state.value);
        let new_state = transition.new_state.value;

        match latest {
            Some(latest) => {
                if transition.old_state != Some(latest) || new_state == latest {
                    warn!("stale transition for {did_str}");
                    return Err(stale(&did_str, transition.old_state.as_ref(), Some(&latest)));
                }
                if entry.key.as_ref() != Some(&key) {
                    return Err(WalletError::InvalidProof(format!(
                        "transition for {did_str} signed by an unbound key"
                    )));
                }
            }
            None => {
                let from_genesis = match &transition.old_state {
                    Some(old) => did.is_genesis_state(old),
                    None => did.is_genesis_state(&new_state),
                };
                if !from_genesis {
                    return Err(stale(&did_str, transition.old_state.as_ref(), None));
                }
                transition.verify_genesis(did)?;
                entry.key = Some(key);
            }
        }

        let record = StateRecord {
            did: did_str.clone(),
            state: transition.new_state,
            previous: latest,
            seq: entry.records.len() as u64,
            published_at: crate::time::now_utc(),
        };
        entry.records.push(record.clone());
        self.persist_did(&did_str, &entry).await?;
        state.dids.insert(did_str.clone(), entry);
        debug!(
            "anchored {did_str} state {} (seq {})",
            record.state.value, record.seq
        );
        Ok(record)
    }
}

#[async_trait]
impl NodeSource for LocalLedger {
    async fn node(&self, hash: &Hash) -> Result<Option<TreeNode>> {
        self.reachable().await?;
        Ok(self.state.lock().await.nodes.get(hash).cloned())
    }
}

#[async_trait]
impl NodePublisher for LocalLedger {
    async fn publish(&self, nodes: &[TreeNode]) -> Result<()> {
        self.reachable().await?;
        let mut state = self.state.lock().await;
        let fresh: Vec<&TreeNode> = nodes
            .iter()
            .filter(|n| !state.nodes.contains_key(&n.hash()))
            .collect();
        if let Some(kv) = &self.kv {
            let mut entries = Vec::with_capacity(fresh.len());
            for node in &fresh {
                let key = format!("ledger/{}/node/{}", self.chain_id, node.hash());
                entries.push((key, serde_json::to_vec(node)?));
            }
            kv.put_batch(entries).await?;
        }
        for node in fresh {
            state.nodes.insert(node.hash(), node.clone());
        }
        Ok(())
    }
}
