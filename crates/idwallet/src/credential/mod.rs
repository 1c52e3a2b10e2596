//! Verifiable credential documents, revocation descriptors and proofs.

pub mod document;
pub mod proof;
pub mod status;

pub use document::{
    subject_commitment, CredentialSchema, W3CCredential, IDEN3_PROOFS_CONTEXT, W3C_CONTEXT,
};
pub use proof::{
    claim_matches_subject, CredentialProof, IssuerData, SignatureProof, SparseMerkleTreeProof,
};
pub use status::{CredentialStatus, RevocationOptions, StatusType};
