// Keyvault — Top-level error types
//
// Aggregates store, provider, and enclave failures with the vault's own
// taxonomy into a single error enum. Every variant maps to a stable code so
// the facade can hand callers a (code, message) pair.

use thiserror::Error;

use crate::auth::DenyReason;
use crate::crypto::ProviderError;
use crate::store::StoreError;

/// Top-level error type for all vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key already exists: {0}")]
    KeyAlreadyExists(String),

    #[error("Authentication denied: {0}")]
    AuthDenied(DenyReason),

    #[error("Store write failed: {0}")]
    StoreWriteFailed(String),

    #[error("Store read failed: {0}")]
    StoreReadFailed(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid algorithm: {0}")]
    InvalidAlgorithm(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Invalid alias: {0}")]
    InvalidAlias(String),

    #[error("Enclave error: {0}")]
    Enclave(#[from] crate::enclave::EnclaveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl VaultError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::KeyNotFound(_) => "KEY_NOT_FOUND",
            VaultError::KeyAlreadyExists(_) => "KEY_ALREADY_EXISTS",
            VaultError::AuthDenied(reason) => reason.code(),
            VaultError::StoreWriteFailed(_) => "STORE_WRITE_FAILED",
            VaultError::StoreReadFailed(_) => "STORE_READ_FAILED",
            VaultError::Provider(_) => "PROVIDER_ERROR",
            VaultError::Serialization(_) => "SERIALIZATION_ERROR",
            VaultError::InvalidAlgorithm(_) => "INVALID_ALGORITHM",
            VaultError::Encoding(_) => "ENCODING_ERROR",
            VaultError::InvalidAlias(_) => "INVALID_ALIAS",
            VaultError::Enclave(_) => "ENCLAVE_ERROR",
            VaultError::Io(_) => "IO_ERROR",
            VaultError::Other(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Write { .. } => VaultError::StoreWriteFailed(err.to_string()),
            _ => VaultError::StoreReadFailed(err.to_string()),
        }
    }
}

impl From<ProviderError> for VaultError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unsupported(detail) => VaultError::InvalidAlgorithm(detail),
            other => VaultError::Provider(other.to_string()),
        }
    }
}

impl From<base64::DecodeError> for VaultError {
    fn from(err: base64::DecodeError) -> Self {
        VaultError::Encoding(format!("invalid base64: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

// ─── Tests ───────────────────────────────────────────────────────────────────
