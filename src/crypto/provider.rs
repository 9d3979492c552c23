// Keyvault — Cryptographic Provider contract
//
// Key generation and every primitive run behind this trait. The vault only
// ever handles opaque `KeyHandle`s; the math lives in the provider (a
// platform keystore, an HSM bridge, a software library...).

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::keys::{EncryptionScheme, GeneratedKey, KeyHandle, KeyParams, MacScheme, SignatureScheme};

use super::ProviderError;

#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Mint fresh material for `params.family`. Pair families return both
    /// halves; single-secret families return `public: None`.
    async fn generate_key_material(&self, params: &KeyParams) -> Result<GeneratedKey, ProviderError>;

    async fn sign(
        &self,
        private: &KeyHandle,
        scheme: SignatureScheme,
        payload: &[u8],
    ) -> Result<Vec<u8>, ProviderError>;

    async fn verify(
        &self,
        public: &KeyHandle,
        scheme: SignatureScheme,
        payload: &[u8],
        signature: &[u8],
    ) -> bool;

    async fn encrypt_asymmetric(
        &self,
        public: &KeyHandle,
        scheme: EncryptionScheme,
        payload: &[u8],
    ) -> Result<Vec<u8>, ProviderError>;

    async fn decrypt_asymmetric(
        &self,
        private: &KeyHandle,
        scheme: EncryptionScheme,
        payload: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, ProviderError>;

    async fn hmac(&self, secret: &KeyHandle, scheme: MacScheme, payload: &[u8]) -> Vec<u8>;
}
