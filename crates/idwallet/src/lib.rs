//! idwallet — self-sovereign identity wallet engine.
//!
//! Provides key custody, sparse Merkle identity state, decentralised
//! identifiers, verifiable credentials with signature and Merkle proofs,
//! state anchoring, and revocation resolution over four strategies
//! (issuer, reverse hash service, on-chain, agent).

pub mod anchor;
pub mod claim;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod did;
pub mod error;
pub mod kms;
pub mod merkle;
pub mod resolver;
pub mod storage;
pub mod time;
pub mod wallet;

// Re-export primary types
pub use error::{ErrorKind, Result, WalletError};

pub use anchor::{GenesisProof, LocalLedger, StateAnchor, StateRecord, StateTransition};
pub use claim::{Claim, SchemaHash};
pub use config::{ProofState, WalletConfig};
pub use credential::{CredentialStatus, RevocationOptions, StatusType, W3CCredential};
pub use did::{Did, DidMethodRegistry, IdentityHash, Profile};
pub use kms::{KeyCustodian, KeyHandle, KeyType};
pub use merkle::{Hash, IdentityStateTree, MerkleProof, RevocationPolicy, TreeState};

// Re-export resolver types
pub use resolver::{
    AgentResolver, ChainEndpoint, InMemoryRhs, IssuerResolver, OnChainResolver, ResolveOptions,
    ResolverRegistry, RevocationResolver, RevocationStatus, RhsResolver,
};

// Re-export wallet types
pub use wallet::{
    CachePolicy, CreateIdentityOptions, CreatedIdentity, CredentialRequest, CredentialWallet,
    DataStorage, IdentityInfo, IdentityWallet, LocalAgentTransport, LocalIssuerClient,
    PublishOutcome,
};
