// Keyvault — Crypto Operation Router
//
// Every family backend implements the same pair of steps:
// `fetch_key_material(alias)` then `operate(material, operation)`. The
// router owns a registry of backends keyed by family and knows nothing else
// about them, so a new family plugs in by registering a backend.
//
// Order of checks per call: backend lookup (InvalidAlgorithm), gateway
// (AuthDenied), material (KeyNotFound), then the provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::auth::AuthGateway;
use crate::error::VaultError;
use crate::keys::{KeyFamily, KeyHandle, KeyTag};
use crate::store::SecureBlobStore;

// ─── Operations ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Sign(&'a [u8]),
    Verify { payload: &'a [u8], signature: &'a [u8] },
    Encrypt(&'a [u8]),
    Decrypt(&'a [u8]),
    Mac(&'a [u8]),
}

impl Operation<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Sign(_) => "sign",
            Operation::Verify { .. } => "verify",
            Operation::Encrypt(_) => "encrypt",
            Operation::Decrypt(_) => "decrypt",
            Operation::Mac(_) => "hmac",
        }
    }
}

#[derive(Debug)]
pub enum OpOutput {
    Bytes(Vec<u8>),
    Verified(bool),
}

// ─── Key material ────────────────────────────────────────────────────────────

/// The stored handles of one alias, as fetched by a backend.
#[derive(Debug)]
pub struct KeyMaterial {
    pub alias: String,
    pub family: KeyFamily,
    pub private: Option<KeyHandle>,
    pub public: Option<KeyHandle>,
    pub secret: Option<KeyHandle>,
}

impl KeyMaterial {
    /// Load `tags` for `alias`. Fails with `KeyNotFound` if none exist and
    /// `InvalidAlgorithm` if a stored handle belongs to another family.
    pub async fn load(
        store: &dyn SecureBlobStore,
        alias: &str,
        family: KeyFamily,
        tags: &[KeyTag],
    ) -> Result<Self, VaultError> {
        let mut material = KeyMaterial {
            alias: alias.to_string(),
            family,
            private: None,
            public: None,
            secret: None,
        };

        for tag in tags {
            let handle = match store.retrieve_key(&tag.for_alias(alias)).await? {
                Some(handle) => handle,
                None => continue,
            };
            if handle.family() != family {
                return Err(VaultError::InvalidAlgorithm(format!(
                    "'{}' holds a {} key, not {}",
                    alias,
                    handle.family(),
                    family
                )));
            }
            match tag {
                KeyTag::Private => material.private = Some(handle),
                KeyTag::Public => material.public = Some(handle),
                KeyTag::Secret => material.secret = Some(handle),
            }
        }

        if material.private.is_none() && material.public.is_none() && material.secret.is_none() {
            return Err(VaultError::KeyNotFound(alias.to_string()));
        }
        Ok(material)
    }

    pub fn private(&self) -> Result<&KeyHandle, VaultError> {
        self.private
            .as_ref()
            .ok_or_else(|| VaultError::KeyNotFound(KeyTag::Private.for_alias(&self.alias)))
    }

    pub fn public(&self) -> Result<&KeyHandle, VaultError> {
        self.public
            .as_ref()
            .ok_or_else(|| VaultError::KeyNotFound(KeyTag::Public.for_alias(&self.alias)))
    }

    pub fn secret(&self) -> Result<&KeyHandle, VaultError> {
        self.secret
            .as_ref()
            .ok_or_else(|| VaultError::KeyNotFound(KeyTag::Secret.for_alias(&self.alias)))
    }
}

// ─── Backend trait ───────────────────────────────────────────────────────────

#[async_trait]
pub trait FamilyBackend: Send + Sync {
    fn family(&self) -> KeyFamily;

    async fn fetch_key_material(&self, alias: &str) -> Result<KeyMaterial, VaultError>;

    async fn operate(
        &self,
        material: &KeyMaterial,
        operation: Operation<'_>,
    ) -> Result<OpOutput, VaultError>;
}

// ─── Router ──────────────────────────────────────────────────────────────────

pub struct CryptoRouter {
    gateway: Arc<AuthGateway>,
    backends: HashMap<KeyFamily, Arc<dyn FamilyBackend>>,
}

impl CryptoRouter {
    pub fn new(gateway: Arc<AuthGateway>) -> Self {
        Self {
            gateway,
            backends: HashMap::new(),
        }
    }

    /// Register (or replace) the backend for its family.
    pub fn register(&mut self, backend: Arc<dyn FamilyBackend>) -> Option<Arc<dyn FamilyBackend>> {
        self.backends.insert(backend.family(), backend)
    }

    pub async fn sign(&self, family: KeyFamily, alias: &str, payload: &[u8]) -> Result<String, VaultError> {
        let signature = self
            .dispatch(family, alias, Operation::Sign(payload))
            .await
            .and_then(expect_bytes)?;
        Ok(encode_signature(family, &signature))
    }

    pub async fn verify(
        &self,
        family: KeyFamily,
        alias: &str,
        payload: &[u8],
        signature: &str,
    ) -> Result<bool, VaultError> {
        let signature = decode_signature(family, signature)?;
        let output = self
            .dispatch(
                family,
                alias,
                Operation::Verify {
                    payload,
                    signature: &signature,
                },
            )
            .await?;
        match output {
            OpOutput::Verified(valid) => Ok(valid),
            OpOutput::Bytes(_) => Err(VaultError::Provider(
                "verify returned bytes instead of a verdict".to_string(),
            )),
        }
    }

    /// Hybrid-encrypt `plaintext` to the alias's public key; standard base64.
    pub async fn encrypt(&self, alias: &str, plaintext: &[u8]) -> Result<String, VaultError> {
        let ciphertext = self
            .dispatch(KeyFamily::Aes, alias, Operation::Encrypt(plaintext))
            .await
            .and_then(expect_bytes)?;
        Ok(STANDARD.encode(ciphertext))
    }

    /// Decrypt a base64 ciphertext produced by `encrypt`. The plaintext must
    /// be UTF-8.
    pub async fn decrypt(&self, alias: &str, ciphertext: &str) -> Result<String, VaultError> {
        let ciphertext = STANDARD.decode(ciphertext.trim())?;
        let plaintext = self
            .dispatch(KeyFamily::Aes, alias, Operation::Decrypt(&ciphertext))
            .await
            .and_then(expect_bytes)?;
        String::from_utf8(plaintext)
            .map_err(|_| VaultError::Encoding("decrypted data is not valid UTF-8".to_string()))
    }

    pub async fn hmac(&self, alias: &str, payload: &[u8]) -> Result<String, VaultError> {
        let mac = self
            .dispatch(KeyFamily::Hmac, alias, Operation::Mac(payload))
            .await
            .and_then(expect_bytes)?;
        Ok(STANDARD.encode(mac))
    }

    async fn dispatch(
        &self,
        family: KeyFamily,
        alias: &str,
        operation: Operation<'_>,
    ) -> Result<OpOutput, VaultError> {
        let backend = self.backends.get(&family).ok_or_else(|| {
            VaultError::InvalidAlgorithm(format!("no backend registered for {}", family))
        })?;

        self.gateway.require(alias).await?;

        let material = backend.fetch_key_material(alias).await?;
        let output = backend.operate(&material, operation).await;

        match &output {
            Ok(_) => tracing::debug!(alias = %alias, %family, op = operation.name(), "Crypto operation completed"),
            Err(e) => tracing::warn!(alias = %alias, %family, op = operation.name(), error = %e, "Crypto operation failed"),
        }
        output
    }
}

fn expect_bytes(output: OpOutput) -> Result<Vec<u8>, VaultError> {
    match output {
        OpOutput::Bytes(bytes) => Ok(bytes),
        OpOutput::Verified(_) => Err(VaultError::Provider(
            "operation returned a verdict instead of bytes".to_string(),
        )),
    }
}

/// EC signatures travel URL-safe without padding; everything else uses
/// standard base64.
fn encode_signature(family: KeyFamily, signature: &[u8]) -> String {
    match family {
        KeyFamily::Ec => URL_SAFE_NO_PAD.encode(signature),
        _ => STANDARD.encode(signature),
    }
}

fn decode_signature(family: KeyFamily, signature: &str) -> Result<Vec<u8>, VaultError> {
    let signature = signature.trim();
    let decoded = match family {
        KeyFamily::Ec => URL_SAFE_NO_PAD.decode(signature.trim_end_matches('='))?,
        _ => STANDARD.decode(signature)?,
    };
    Ok(decoded)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
