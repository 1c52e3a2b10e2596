//! Error types for the identity wallet.
//!
//! All errors are strongly typed and propagated without panicking.
//! Private key material is never included in error messages.

/// Broad category of a [`WalletError`], used by callers to decide between
/// fixing input, retrying, or reconciling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid method/chain/key-type combination. Caller must fix input.
    Configuration,
    /// The key custodian cannot read or write secret material.
    KeyAccess,
    /// Tree, credential or identity backend unavailable.
    Storage,
    /// Anchor or resolver unreachable or timed out.
    Network,
    /// Requires caller reconciliation, never blind retry.
    Consistency,
    /// Resolver registry or chain selection misconfigured.
    Resolution,
    /// A record that was asked for does not exist.
    NotFound,
    /// Malformed input, document or proof.
    Validation,
}

/// Wallet error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    // ── Configuration ────────────────────────────────────────────────────
    #[error("Invalid DID method configuration: {0}")]
    InvalidMethodConfig(String),

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Key access ───────────────────────────────────────────────────────
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key access denied: {0}")]
    KeyAccessDenied(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // ── Storage ──────────────────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ── Network ──────────────────────────────────────────────────────────
    #[error("State anchor unavailable: {0}")]
    AnchorUnavailable(String),

    #[error("Issuer unreachable: {0}")]
    IssuerUnreachable(String),

    #[error("Reverse hash service unreachable: {0}")]
    RhsUnreachable(String),

    #[error("Chain read error: {0}")]
    ChainReadError(String),

    #[error("Agent timeout: {0}")]
    AgentTimeout(String),

    // ── Consistency ──────────────────────────────────────────────────────
    #[error("Stale state for {did}: expected {expected}, anchored {anchored}")]
    StaleState {
        did: String,
        expected: String,
        anchored: String,
    },

    #[error("Leaf collision in {tree} tree at index {index}")]
    ClaimCollision { tree: &'static str, index: u64 },

    #[error("Nonce already revoked: {0}")]
    AlreadyRevoked(u64),

    #[error("Identity already exists: {0}")]
    IdentityExists(String),

    #[error("Profile already exists: {0}")]
    ProfileExists(String),

    // ── Resolution ───────────────────────────────────────────────────────
    #[error("No resolver registered for status type {0}")]
    NoResolverRegistered(String),

    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    // ── Not found ────────────────────────────────────────────────────────
    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error("No anchored state for {0}")]
    StateNotFound(String),

    // ── Validation ───────────────────────────────────────────────────────
    #[error("Invalid DID: {0}")]
    InvalidDid(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
}

impl WalletError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMethodConfig(_) | Self::UnsupportedKeyType(_) | Self::InvalidConfig(_) => {
                ErrorKind::Configuration
            }
            Self::KeyNotFound(_) | Self::KeyAccessDenied(_) | Self::InvalidKey(_) => {
                ErrorKind::KeyAccess
            }
            Self::Storage(_) | Self::Io(_) => ErrorKind::Storage,
            Self::AnchorUnavailable(_)
            | Self::IssuerUnreachable(_)
            | Self::RhsUnreachable(_)
            | Self::ChainReadError(_)
            | Self::AgentTimeout(_) => ErrorKind::Network,
            Self::StaleState { .. }
            | Self::ClaimCollision { .. }
            | Self::AlreadyRevoked(_)
            | Self::IdentityExists(_)
            | Self::ProfileExists(_) => ErrorKind::Consistency,
            Self::NoResolverRegistered(_) | Self::UnknownChain(_) => ErrorKind::Resolution,
            Self::IdentityNotFound(_) | Self::CredentialNotFound(_) | Self::StateNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::InvalidDid(_)
            | Self::InvalidCredential(_)
            | Self::InvalidProof(_)
            | Self::SignatureInvalid
            | Self::SerializationError(_)
            | Self::DerivationFailed(_)
            | Self::EncryptionFailed(_)
            | Self::DecryptionFailed(_) => ErrorKind::Validation,
        }
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// Storage and network failures are retryable; consistency errors are
    /// not and must be reconciled by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Storage | ErrorKind::Network)
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<bincode::Error> for WalletError {
    fn from(e: bincode::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, WalletError>;
