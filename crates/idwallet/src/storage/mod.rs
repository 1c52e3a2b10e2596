//! Storage layer for identity trees, identity records and credentials.
//!
//! Everything persists through a [`KeyValueStore`]: [`MemoryStore`] for
//! volatile wallets and [`FileStore`] for durable ones. Private keys are not
//! stored here; see [`crate::kms::store`].
//!
//! # Key layout
//!
//! ```text
//! identity/{did}                    identity record (JSON)
//! profile/{root}/{nonce}            profile (JSON)
//! tree/{did}/meta                   tree commit record (bincode)
//! tree/{did}/event/{seq}            tree history event (bincode)
//! cred/{id}                         credential (JSON)
//! idx/subject/{subject}/{id}        subject index
//! idx/issuer/{issuer}/{id}          issuer index
//! ledger/...                        local anchor records, when persisted
//! ```
//!
//! # Modules
//!
//! - [`kv`] — the `KeyValueStore` trait and both backends.
//! - [`credential_store`] — credential CRUD with secondary indexes.
//! - [`tree_store`] — identity state trees as replayable event logs.
//! - [`identity_store`] — identity and profile records.

pub mod credential_store;
pub mod identity_store;
pub mod kv;
pub mod tree_store;

pub use credential_store::{CredentialFilter, CredentialSort, CredentialStore};
pub use identity_store::{IdentityRecord, IdentityStatus, IdentityStore};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use tree_store::TreeStorage;
