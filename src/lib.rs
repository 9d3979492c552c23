// Keyvault — Library root
//
// Re-exports the authentication, key lifecycle, crypto routing, store,
// enclave, and CLI modules, plus the `Vault` facade that ties them together.

pub mod auth;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod enclave;
pub mod error;
pub mod keys;
pub mod store;
pub mod vault;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Result, VaultError};
pub use vault::{GenericKeyPair, Vault};
