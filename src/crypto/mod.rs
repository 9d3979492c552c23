// Keyvault — Crypto Module
//
// The Cryptographic Provider seam and the router that dispatches
// sign / verify / encrypt / decrypt / HMAC to per-family backends after the
// gateway has granted the alias.

mod backends;
mod error;
mod provider;
mod router;

pub use backends::{HybridCipherBackend, MacBackend, SignatureBackend};
pub use error::ProviderError;
pub use provider::CryptoProvider;
pub use router::{CryptoRouter, FamilyBackend, KeyMaterial, OpOutput, Operation};
