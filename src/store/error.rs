// Keyvault — Store error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to read '{target}': {reason}")]
    Read { target: String, reason: String },

    #[error("Failed to write '{target}': {reason}")]
    Write { target: String, reason: String },

    #[error("Invalid store key: database may be corrupted or key is wrong")]
    InvalidKey,

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn read(target: &str, reason: impl ToString) -> Self {
        StoreError::Read {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn write(target: &str, reason: impl ToString) -> Self {
        StoreError::Write {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }
}
