// Keyvault — Family backends
//
// One backend per kind of work: signatures (RSA, EC), hybrid encryption
// (AES), and MACs (HMAC). Each reads its handles from the blob store and
// hands them to the injected provider.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VaultError;
use crate::keys::{EncryptionScheme, KeyFamily, KeyTag, MacScheme, SignatureScheme};
use crate::store::SecureBlobStore;

use super::router::{FamilyBackend, KeyMaterial, OpOutput, Operation};
use super::CryptoProvider;

fn unsupported(family: KeyFamily, operation: &Operation<'_>) -> VaultError {
    VaultError::InvalidAlgorithm(format!(
        "{} keys do not support {}",
        family,
        operation.name()
    ))
}

// ─── Signatures ──────────────────────────────────────────────────────────────

pub struct SignatureBackend {
    family: KeyFamily,
    scheme: SignatureScheme,
    store: Arc<dyn SecureBlobStore>,
    provider: Arc<dyn CryptoProvider>,
}

impl SignatureBackend {
    pub fn new(
        family: KeyFamily,
        scheme: SignatureScheme,
        store: Arc<dyn SecureBlobStore>,
        provider: Arc<dyn CryptoProvider>,
    ) -> Self {
        if scheme == SignatureScheme::EcdsaSha1 {
            tracing::debug!(%family, "Using legacy ECDSA/SHA-1 signatures");
        }
        Self {
            family,
            scheme,
            store,
            provider,
        }
    }
}

#[async_trait]
impl FamilyBackend for SignatureBackend {
    fn family(&self) -> KeyFamily {
        self.family
    }

    async fn fetch_key_material(&self, alias: &str) -> Result<KeyMaterial, VaultError> {
        KeyMaterial::load(
            self.store.as_ref(),
            alias,
            self.family,
            &[KeyTag::Private, KeyTag::Public],
        )
        .await
    }

    async fn operate(
        &self,
        material: &KeyMaterial,
        operation: Operation<'_>,
    ) -> Result<OpOutput, VaultError> {
        match operation {
            Operation::Sign(payload) => {
                let signature = self
                    .provider
                    .sign(material.private()?, self.scheme, payload)
                    .await?;
                Ok(OpOutput::Bytes(signature))
            }
            Operation::Verify { payload, signature } => {
                let valid = self
                    .provider
                    .verify(material.public()?, self.scheme, payload, signature)
                    .await;
                Ok(OpOutput::Verified(valid))
            }
            other => Err(unsupported(self.family, &other)),
        }
    }
}

// ─── Hybrid encryption ───────────────────────────────────────────────────────

/// AES-family backend: ECIES with the alias's P-256 pair.
pub struct HybridCipherBackend {
    scheme: EncryptionScheme,
    store: Arc<dyn SecureBlobStore>,
    provider: Arc<dyn CryptoProvider>,
}

impl HybridCipherBackend {
    pub fn new(store: Arc<dyn SecureBlobStore>, provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            scheme: EncryptionScheme::EciesCofactorX963Sha256AesGcm,
            store,
            provider,
        }
    }
}

#[async_trait]
impl FamilyBackend for HybridCipherBackend {
    fn family(&self) -> KeyFamily {
        KeyFamily::Aes
    }

    async fn fetch_key_material(&self, alias: &str) -> Result<KeyMaterial, VaultError> {
        KeyMaterial::load(
            self.store.as_ref(),
            alias,
            KeyFamily::Aes,
            &[KeyTag::Private, KeyTag::Public],
        )
        .await
    }

    async fn operate(
        &self,
        material: &KeyMaterial,
        operation: Operation<'_>,
    ) -> Result<OpOutput, VaultError> {
        match operation {
            Operation::Encrypt(payload) => {
                let ciphertext = self
                    .provider
                    .encrypt_asymmetric(material.public()?, self.scheme, payload)
                    .await?;
                Ok(OpOutput::Bytes(ciphertext))
            }
            Operation::Decrypt(payload) => {
                let plaintext = self
                    .provider
                    .decrypt_asymmetric(material.private()?, self.scheme, payload)
                    .await?;
                Ok(OpOutput::Bytes(plaintext.to_vec()))
            }
            other => Err(unsupported(KeyFamily::Aes, &other)),
        }
    }
}

// ─── MACs ────────────────────────────────────────────────────────────────────

pub struct MacBackend {
    store: Arc<dyn SecureBlobStore>,
    provider: Arc<dyn CryptoProvider>,
}

impl MacBackend {
    pub fn new(store: Arc<dyn SecureBlobStore>, provider: Arc<dyn CryptoProvider>) -> Self {
        Self { store, provider }
    }
}

#[async_trait]
impl FamilyBackend for MacBackend {
    fn family(&self) -> KeyFamily {
        KeyFamily::Hmac
    }

    async fn fetch_key_material(&self, alias: &str) -> Result<KeyMaterial, VaultError> {
        KeyMaterial::load(self.store.as_ref(), alias, KeyFamily::Hmac, &[KeyTag::Secret]).await
    }

    async fn operate(
        &self,
        material: &KeyMaterial,
        operation: Operation<'_>,
    ) -> Result<OpOutput, VaultError> {
        match operation {
            Operation::Mac(payload) => {
                let mac = self
                    .provider
                    .hmac(material.secret()?, MacScheme::HmacSha256, payload)
                    .await;
                Ok(OpOutput::Bytes(mac))
            }
            other => Err(unsupported(KeyFamily::Hmac, &other)),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
