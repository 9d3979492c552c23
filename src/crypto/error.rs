// Keyvault — Provider error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("key generation failed: {0}")]
    Generation(String),

    #[error("operation failed: {0}")]
    Operation(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}
