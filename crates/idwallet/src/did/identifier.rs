//! Identity hashes and DIDs.
//!
//! An identity hash is 31 bytes: a 2-byte type, the first 27 bytes of the
//! genesis state and a 2-byte little-endian checksum (byte sum of the
//! preceding 29 bytes). It is written in base58. A DID has the form
//! `did:<method>:<blockchain>:<networkId>:<identityHash>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, WalletError};
use crate::merkle::Hash;

use super::registry::{DidMethodRegistry, IdType};

const TYPE_LEN: usize = 2;
const GENESIS_LEN: usize = 27;
const CHECKSUM_LEN: usize = 2;
/// Byte length of an identity hash.
pub const IDENTITY_HASH_LEN: usize = TYPE_LEN + GENESIS_LEN + CHECKSUM_LEN;

/// The identity hash segment of a DID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityHash(pub [u8; IDENTITY_HASH_LEN]);

impl IdentityHash {
    /// Build from a type and a genesis state.
    pub fn from_genesis(id_type: IdType, genesis_state: &Hash) -> Self {
        let mut out = [0u8; IDENTITY_HASH_LEN];
        out[..TYPE_LEN].copy_from_slice(&id_type);
        out[TYPE_LEN..TYPE_LEN + GENESIS_LEN].copy_from_slice(&genesis_state.0[..GENESIS_LEN]);
        let checksum = checksum(&out[..TYPE_LEN + GENESIS_LEN]);
        out[TYPE_LEN + GENESIS_LEN..].copy_from_slice(&checksum.to_le_bytes());
        Self(out)
    }

    /// Parse the base58 form, verifying length and checksum.
    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| WalletError::InvalidDid(format!("identity hash base58: {e}")))?;
        let arr: [u8; IDENTITY_HASH_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            WalletError::InvalidDid(format!(
                "identity hash must be {IDENTITY_HASH_LEN} bytes, got {}",
                v.len()
            ))
        })?;
        let id = Self(arr);
        if !id.checksum_valid() {
            return Err(WalletError::InvalidDid("identity hash checksum mismatch".into()));
        }
        Ok(id)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn id_type(&self) -> IdType {
        [self.0[0], self.0[1]]
    }

    /// The embedded genesis state prefix.
    pub fn genesis_prefix(&self) -> &[u8] {
        &self.0[TYPE_LEN..TYPE_LEN + GENESIS_LEN]
    }

    pub fn checksum_valid(&self) -> bool {
        let expected = checksum(&self.0[..TYPE_LEN + GENESIS_LEN]);
        self.0[TYPE_LEN + GENESIS_LEN..] == expected.to_le_bytes()
    }
}

fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, b| acc.wrapping_add(*b as u16))
}

impl fmt::Debug for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityHash({})", self.to_base58())
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

// ── Did ──────────────────────────────────────────────────────────────────────

/// A decentralised identifier. Immutable once derived.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Did {
    pub method: String,
    pub blockchain: String,
    pub network_id: String,
    pub id: IdentityHash,
}

impl Did {
    /// Derive the DID of an identity from its genesis state.
    pub fn from_genesis(
        registry: &DidMethodRegistry,
        method: &str,
        blockchain: &str,
        network_id: &str,
        genesis_state: &Hash,
    ) -> Result<Self> {
        let id_type = registry.id_type(method, blockchain, network_id)?;
        Ok(Self {
            method: method.to_string(),
            blockchain: blockchain.to_string(),
            network_id: network_id.to_string(),
            id: IdentityHash::from_genesis(id_type, genesis_state),
        })
    }

    /// Parse against the default method registry.
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_with(DidMethodRegistry::global(), s)
    }

    /// Parse against an explicit method registry.
    pub fn parse_with(registry: &DidMethodRegistry, s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.first() != Some(&"did") {
            return Err(WalletError::InvalidDid(format!("missing did: prefix in {s:?}")));
        }
        if parts.len() != 5 {
            return Err(WalletError::InvalidDid(format!(
                "expected did:<method>:<blockchain>:<network>:<id>, got {s:?}"
            )));
        }
        let (method, blockchain, network_id) = (parts[1], parts[2], parts[3]);
        let id = IdentityHash::from_base58(parts[4])?;
        let expected = registry
            .id_type(method, blockchain, network_id)
            .map_err(|e| WalletError::InvalidDid(e.to_string()))?;
        if id.id_type() != expected {
            return Err(WalletError::InvalidDid(format!(
                "identity type {} does not match {method}:{blockchain}:{network_id}",
                hex::encode(id.id_type())
            )));
        }
        Ok(Self {
            method: method.to_string(),
            blockchain: blockchain.to_string(),
            network_id: network_id.to_string(),
            id,
        })
    }

    /// Whether `state` is the genesis state this DID was derived from.
    pub fn is_genesis_state(&self, state: &Hash) -> bool {
        IdentityHash::from_genesis(self.id.id_type(), state) == self.id
    }

    /// Profile identifier for `nonce`: `H(id || nonce)` formatted with this
    /// DID's type. Nonce 0 is the identity itself.
    pub fn profile(&self, nonce: u64) -> Self {
        if nonce == 0 {
            return self.clone();
        }
        let derived = Hash::digest(&[&self.id.0, &nonce.to_be_bytes()]);
        Self {
            method: self.method.clone(),
            blockchain: self.blockchain.clone(),
            network_id: self.network_id.clone(),
            id: IdentityHash::from_genesis(self.id.id_type(), &derived),
        }
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "did:{}:{}:{}:{}",
            self.method, self.blockchain, self.network_id, self.id
        )
    }
}

impl fmt::Debug for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Did({self})")
    }
}

impl FromStr for Did {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Did::parse(&s).map_err(serde::de::Error::custom)
    }
}
