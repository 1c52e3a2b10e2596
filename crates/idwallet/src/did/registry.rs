//! Recognised DID method / blockchain / network combinations.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{Result, WalletError};

/// Two-byte identifier type: method byte, then blockchain|network byte.
pub type IdType = [u8; 2];

const METHOD_IDEN3: u8 = 0x01;
const METHOD_POLYGONID: u8 = 0x02;

const CHAIN_ETHEREUM: u8 = 0x10;
const CHAIN_POLYGON: u8 = 0x20;
const CHAIN_PRIVADO: u8 = 0x40;

const NET_MAIN: u8 = 0x01;
const NET_MUMBAI: u8 = 0x02;
const NET_AMOY: u8 = 0x03;
const NET_SEPOLIA: u8 = 0x02;

/// A `{method, blockchain, network}` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodCombination {
    pub method: String,
    pub blockchain: String,
    pub network_id: String,
}

impl MethodCombination {
    pub fn new(method: &str, blockchain: &str, network_id: &str) -> Self {
        Self {
            method: method.to_string(),
            blockchain: blockchain.to_string(),
            network_id: network_id.to_string(),
        }
    }
}

impl std::fmt::Display for MethodCombination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.method, self.blockchain, self.network_id)
    }
}

/// Maps method combinations to identifier types and back.
#[derive(Debug, Clone)]
pub struct DidMethodRegistry {
    by_combination: HashMap<MethodCombination, IdType>,
    by_type: HashMap<IdType, MethodCombination>,
}

impl DidMethodRegistry {
    /// A registry with no entries.
    pub fn empty() -> Self {
        Self {
            by_combination: HashMap::new(),
            by_type: HashMap::new(),
        }
    }

    /// Process-wide registry holding the default combinations.
    pub fn global() -> &'static DidMethodRegistry {
        static DEFAULT: OnceLock<DidMethodRegistry> = OnceLock::new();
        DEFAULT.get_or_init(DidMethodRegistry::default)
    }

    /// Add or replace a combination.
    ///
    /// A type code already bound to a different combination is rejected.
    pub fn register(
        &mut self,
        method: &str,
        blockchain: &str,
        network_id: &str,
        id_type: IdType,
    ) -> Result<()> {
        let combination = MethodCombination::new(method, blockchain, network_id);
        if let Some(existing) = self.by_type.get(&id_type) {
            if *existing != combination {
                return Err(WalletError::InvalidMethodConfig(format!(
                    "type {} already bound to {existing}",
                    hex::encode(id_type)
                )));
            }
        }
        if let Some(old) = self.by_combination.insert(combination.clone(), id_type) {
            self.by_type.remove(&old);
        }
        self.by_type.insert(id_type, combination);
        Ok(())
    }

    /// Identifier type for a combination.
    pub fn id_type(&self, method: &str, blockchain: &str, network_id: &str) -> Result<IdType> {
        let combination = MethodCombination::new(method, blockchain, network_id);
        self.by_combination.get(&combination).copied().ok_or_else(|| {
            WalletError::InvalidMethodConfig(format!("unsupported combination {combination}"))
        })
    }

    /// Combination bound to an identifier type.
    pub fn combination(&self, id_type: IdType) -> Option<&MethodCombination> {
        self.by_type.get(&id_type)
    }

    pub fn len(&self) -> usize {
        self.by_combination.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_combination.is_empty()
    }
}

impl Default for DidMethodRegistry {
    fn default() -> Self {
        let defaults: [(&str, &str, &str, IdType); 9] = [
            ("iden3", "polygon", "main", [METHOD_IDEN3, CHAIN_POLYGON | NET_MAIN]),
            ("iden3", "polygon", "mumbai", [METHOD_IDEN3, CHAIN_POLYGON | NET_MUMBAI]),
            ("iden3", "polygon", "amoy", [METHOD_IDEN3, CHAIN_POLYGON | NET_AMOY]),
            ("iden3", "ethereum", "main", [METHOD_IDEN3, CHAIN_ETHEREUM | NET_MAIN]),
            ("iden3", "ethereum", "sepolia", [METHOD_IDEN3, CHAIN_ETHEREUM | NET_SEPOLIA]),
            ("iden3", "privado", "main", [METHOD_IDEN3, CHAIN_PRIVADO | NET_MAIN]),
            ("polygonid", "polygon", "main", [METHOD_POLYGONID, CHAIN_POLYGON | NET_MAIN]),
            ("polygonid", "polygon", "mumbai", [METHOD_POLYGONID, CHAIN_POLYGON | NET_MUMBAI]),
            ("polygonid", "polygon", "amoy", [METHOD_POLYGONID, CHAIN_POLYGON | NET_AMOY]),
        ];
        let mut registry = Self::empty();
        for (method, blockchain, network, id_type) in defaults {
            registry.by_combination.insert(
                MethodCombination::new(method, blockchain, network),
                id_type,
            );
            registry
                .by_type
                .insert(id_type, MethodCombination::new(method, blockchain, network));
        }
        registry
    }
}
