//! The two wallets.
//!
//! - [`IdentityWallet`] — issuer side: identities, their trees, issuance,
//!   revocation and publishing.
//! - [`CredentialWallet`] — holder side: credential storage and revocation
//!   checks through the resolver registry.
//! - [`local`] — in-process issuer and agent transports.

pub mod credential;
pub mod identity;
pub mod local;

pub use credential::{CachePolicy, CredentialWallet};
pub use identity::{
    CreateIdentityOptions, CreatedIdentity, CredentialRequest, DataStorage, IdentityInfo,
    IdentityWallet, PublishOutcome, AUTH_CREDENTIAL_TYPE, AUTH_SCHEMA_URL,
};
pub use local::{LocalAgentTransport, LocalIssuerClient};
