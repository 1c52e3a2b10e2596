//! Decentralised identifiers, profiles and the method registry.

pub mod identifier;
pub mod profile;
pub mod registry;

pub use identifier::{Did, IdentityHash, IDENTITY_HASH_LEN};
pub use profile::Profile;
pub use registry::{DidMethodRegistry, IdType, MethodCombination};
