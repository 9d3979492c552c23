// Keyvault — Vault facade
//
// The caller-facing surface. Wires one `SerialStore`, the policy cache, the
// authentication gateway, the key lifecycle manager, and the crypto router
// around three injected collaborators: a blob store, a crypto provider, and
// a biometric capability.
//
// Every key operation is gated by the gateway using the policy registered
// for its alias at generation time.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::auth::{AuthGateway, AuthTimeout, BiometricCapability, PolicyCache, PromptCopy};
use crate::crypto::{
    CryptoProvider, CryptoRouter, HybridCipherBackend, MacBackend, SignatureBackend,
};
use crate::error::{Result, VaultError};
use crate::keys::{validate_alias, KeyFamily, KeyLifecycle, SignatureScheme};
use crate::store::{SecureBlobStore, SerialStore};

/// Namespace of the serialized store queue.
const STORE_NAMESPACE: &str = "keyvault";

/// A caller-supplied public/private string pair stored under one account.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct GenericKeyPair {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    #[serde(rename = "privateKey")]
    pub private_key: String,
}

impl fmt::Debug for GenericKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericKeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

pub struct Vault {
    store: Arc<dyn SecureBlobStore>,
    provider: Arc<dyn CryptoProvider>,
    gateway: Arc<AuthGateway>,
    keys: KeyLifecycle,
    router: CryptoRouter,
}

impl Vault {
    pub fn new(
        store: Arc<dyn SecureBlobStore>,
        provider: Arc<dyn CryptoProvider>,
        biometrics: Arc<dyn BiometricCapability>,
    ) -> Self {
        let store: Arc<dyn SecureBlobStore> = Arc::new(SerialStore::new(STORE_NAMESPACE, store));
        let policies = Arc::new(PolicyCache::new(Arc::clone(&store)));
        let gateway = Arc::new(AuthGateway::new(policies, biometrics));
        let keys = KeyLifecycle::new(Arc::clone(&gateway), Arc::clone(&store), Arc::clone(&provider));

        let mut router = CryptoRouter::new(Arc::clone(&gateway));
        for family in [KeyFamily::Rsa, KeyFamily::Ec] {
            if let Some(scheme) = family.params().signature {
                router.register(Arc::new(SignatureBackend::new(
                    family,
                    scheme,
                    Arc::clone(&store),
                    Arc::clone(&provider),
                )));
            }
        }
        router.register(Arc::new(HybridCipherBackend::new(Arc::clone(&store), Arc::clone(&provider))));
        router.register(Arc::new(MacBackend::new(Arc::clone(&store), Arc::clone(&provider))));

        Self {
            store,
            provider,
            gateway,
            keys,
            router,
        }
    }

    pub fn with_prompt(self, prompt: PromptCopy) -> Self {
        self.gateway.set_prompt(&prompt.title, &prompt.description);
        self
    }

    /// Select the ECDSA digest for EC signing and verification. Signatures
    /// made under one scheme do not verify under the other.
    pub fn with_ec_scheme(mut self, scheme: SignatureScheme) -> Self {
        tracing::info!(?scheme, "EC signature scheme selected");
        self.router.register(Arc::new(SignatureBackend::new(
            KeyFamily::Ec,
            scheme,
            Arc::clone(&self.store),
            Arc::clone(&self.provider),
        )));
        self
    }

    pub fn gateway(&self) -> &Arc<AuthGateway> {
        &self.gateway
    }

    pub fn policies(&self) -> &Arc<PolicyCache> {
        self.gateway.policies()
    }

    // ─── Key pairs ───────────────────────────────────────────────────────────

    /// Generate an RSA or EC pair under `alias` and register its
    /// re-authentication policy. Returns the public key, base64-encoded.
    ///
    /// Generation itself is gated by whatever policy the alias has now
    /// (the default for a fresh alias). A policy the alias already has is
    /// kept.
    pub async fn generate_key_pair(
        &self,
        family: &str,
        alias: &str,
        auth_required: bool,
        auth_timeout: i32,
    ) -> Result<String> {
        let family = KeyFamily::from_str(family)?;
        if family.params().signature.is_none() {
            return Err(VaultError::InvalidAlgorithm(format!(
                "{} is not a signing family",
                family
            )));
        }
        let policy = AuthTimeout::from_registration(auth_required, auth_timeout);
        let record = self.keys.generate_key_pair(alias, family, Some(policy)).await?;
        let public = record
            .public_key
            .ok_or_else(|| VaultError::Provider("no public key generated".to_string()))?;
        Ok(STANDARD.encode(public.as_bytes()))
    }

    /// Replace the material under `alias`; the policy is kept. If generation
    /// fails the alias is left without a key.
    pub async fn rotate_key_pair(&self, family: &str, alias: &str) -> Result<String> {
        let family = KeyFamily::from_str(family)?;
        let record = self.keys.rotate_key_pair(alias, family).await?;
        let public = record
            .public_key
            .ok_or_else(|| VaultError::Provider("no public key generated".to_string()))?;
        Ok(STANDARD.encode(public.as_bytes()))
    }

    pub async fn delete_key_pair(&self, alias: &str) -> Result<bool> {
        self.keys.delete_key_pair(alias).await
    }

    pub async fn has_alias(&self, alias: &str) -> Result<bool> {
        validate_alias(alias)?;
        self.keys.exists(alias).await
    }

    /// Public half of `alias`, base64-encoded.
    pub async fn retrieve_public_key(&self, alias: &str) -> Result<String> {
        let public = self.keys.public_key(alias).await?;
        Ok(STANDARD.encode(public.as_bytes()))
    }

    pub async fn sign(&self, algorithm: &str, alias: &str, data: &str) -> Result<String> {
        let family = self.signing_family(algorithm)?;
        self.router.sign(family, alias, data.as_bytes()).await
    }

    pub async fn verify(&self, algorithm: &str, alias: &str, data: &str, signature: &str) -> Result<bool> {
        let family = self.signing_family(algorithm)?;
        self.router.verify(family, alias, data.as_bytes(), signature).await
    }

    // ─── Encryption ──────────────────────────────────────────────────────────

    /// Ensure an encryption key exists under `alias`. Idempotent: an
    /// existing key is kept along with its policy.
    pub async fn generate_key(&self, alias: &str, auth_required: bool, auth_timeout: i32) -> Result<bool> {
        let policy = AuthTimeout::from_registration(auth_required, auth_timeout);
        self.keys.generate_symmetric_key(alias, Some(policy)).await
    }

    pub async fn encrypt_data(&self, alias: &str, data: &str) -> Result<String> {
        self.router.encrypt(alias, data.as_bytes()).await
    }

    pub async fn decrypt_data(&self, alias: &str, data: &str) -> Result<String> {
        self.router.decrypt(alias, data).await
    }

    // ─── HMAC ────────────────────────────────────────────────────────────────

    pub async fn generate_hmac_key(&self, alias: &str) -> Result<bool> {
        self.keys.generate_hmac_key(alias).await?;
        Ok(true)
    }

    pub async fn generate_hmac(&self, alias: &str, data: &str) -> Result<String> {
        self.router.hmac(alias, data.as_bytes()).await
    }

    // ─── Secrets ─────────────────────────────────────────────────────────────

    /// Store an opaque secret under `account`, gated like a key alias.
    pub async fn store_secret(&self, account: &str, secret: &[u8]) -> Result<()> {
        validate_alias(account)?;
        self.gateway.require(account).await?;
        self.store.store_blob(secret, account).await?;
        tracing::info!(account = %account, "Secret stored");
        Ok(())
    }

    pub async fn retrieve_secret(&self, account: &str) -> Result<Zeroizing<Vec<u8>>> {
        validate_alias(account)?;
        self.gateway.require(account).await?;
        self.store
            .retrieve_blob(account)
            .await?
            .ok_or_else(|| VaultError::KeyNotFound(account.to_string()))
    }

    pub async fn store_generic_key(&self, public_key: &str, private_key: &str, account: &str) -> Result<()> {
        let pair = GenericKeyPair {
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
        };
        let encoded = Zeroizing::new(serde_json::to_vec(&pair)?);
        self.store_secret(account, &encoded).await
    }

    pub async fn retrieve_generic_key(&self, account: &str) -> Result<GenericKeyPair> {
        let encoded = self.retrieve_secret(account).await?;
        Ok(serde_json::from_slice(&encoded)?)
    }

    // ─── Policy, prompt, housekeeping ────────────────────────────────────────

    /// Change the re-authentication policy of `alias`. Requires passing the
    /// current policy first. Returns whether the change was persisted.
    pub async fn set_auth_policy(&self, alias: &str, auth_required: bool, auth_timeout: i32) -> Result<bool> {
        let timeout = AuthTimeout::from_registration(auth_required, auth_timeout);
        self.keys.set_policy(alias, timeout).await
    }

    /// Wipe every key, secret, and policy.
    pub async fn clear_keys(&self) -> Result<bool> {
        self.store.clear_all().await?;
        self.policies().clear();
        self.gateway.forget_grants();
        tracing::info!("All keys cleared");
        Ok(true)
    }

    pub fn update_popup(&self, title: &str, description: &str) {
        self.gateway.set_prompt(title, description);
    }

    pub fn has_biometrics_enabled(&self) -> bool {
        self.gateway.biometrics_available()
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    fn signing_family(&self, algorithm: &str) -> Result<KeyFamily> {
        let family = KeyFamily::from_str(algorithm)?;
        if family.params().signature.is_none() {
            return Err(VaultError::InvalidAlgorithm(format!(
                "{} keys cannot sign",
                family
            )));
        }
        Ok(family)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
