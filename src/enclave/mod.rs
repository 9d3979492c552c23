// Keyvault — Enclave Module
//
// Keeps the master secret in the platform keyring and derives the SQLCipher
// key for the on-disk blob store from it with Argon2id.

mod error;
mod master;

pub use error::EnclaveError;
pub use master::{derive_store_key, KdfCost, KeyringSecretStore, MasterSecretStore, MASTER_SECRET_LEN};

#[cfg(test)]
pub use master::mock;
