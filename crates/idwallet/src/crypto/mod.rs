//! Cryptographic primitives shared by the wallet.
//!
//! This module provides:
//! - HKDF-SHA256 key derivation for per-entry encryption keys
//! - Argon2id passphrase-based key derivation
//! - ChaCha20-Poly1305 authenticated encryption
//! - Cryptographically secure random number generation
//!
//! Signature schemes live in [`crate::kms`]; hashing for the Merkle trees
//! lives in [`crate::merkle::hash`].

pub mod derivation;
pub mod encryption;
pub mod random;
