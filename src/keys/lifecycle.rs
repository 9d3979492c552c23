// Keyvault — Key Lifecycle Manager
//
// Gated generate / rotate / delete of key material. Mutations on one alias
// are serialized by a per-alias async lock, so check-then-write sequences
// (existence check, generation, persistence, policy registration) cannot
// interleave. A lock entry lives only while some caller holds or awaits it.
//
// A new key's policy is registered only after its material is persisted,
// and never replaces a policy the alias already has.
//
// Rotation is delete-then-generate and NOT transactional: if generation
// fails after the delete, the alias is left without a key.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

use crate::auth::{AuthGateway, AuthTimeout};
use crate::crypto::CryptoProvider;
use crate::error::VaultError;
use crate::store::SecureBlobStore;

use super::model::{validate_alias, KeyFamily, KeyHandle, KeyRecord, KeyTag};

type AliasLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

pub struct KeyLifecycle {
    gateway: Arc<AuthGateway>,
    store: Arc<dyn SecureBlobStore>,
    provider: Arc<dyn CryptoProvider>,
    alias_locks: AliasLocks,
}

/// Exclusive hold on one alias. Dropping it releases the alias and prunes
/// the lock entry once nobody else is waiting on it.
struct AliasGuard<'a> {
    locks: &'a AliasLocks,
    alias: String,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for AliasGuard<'_> {
    fn drop(&mut self) {
        self.held.take();
        let mut locks = self.locks.lock();
        if locks
            .get(&self.alias)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&self.alias);
        }
    }
}

impl KeyLifecycle {
    pub fn new(
        gateway: Arc<AuthGateway>,
        store: Arc<dyn SecureBlobStore>,
        provider: Arc<dyn CryptoProvider>,
    ) -> Self {
        Self {
            gateway,
            store,
            provider,
            alias_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Whether any storage tag exists for `alias`.
    pub async fn exists(&self, alias: &str) -> Result<bool, VaultError> {
        Ok(!self.present_tags(alias).await?.is_empty())
    }

    /// Generate a private/public pair and persist it. Only the public half
    /// is returned. `policy` is registered once the pair is stored, unless
    /// the alias already has one.
    pub async fn generate_key_pair(
        &self,
        alias: &str,
        family: KeyFamily,
        policy: Option<AuthTimeout>,
    ) -> Result<KeyRecord, VaultError> {
        validate_alias(alias)?;
        if !family.is_pair() {
            return Err(VaultError::InvalidAlgorithm(format!(
                "{} keys are single secrets; use generate_hmac_key",
                family
            )));
        }

        let _guard = self.lock_alias(alias).await;

        if self.exists(alias).await? {
            return Err(VaultError::KeyAlreadyExists(alias.to_string()));
        }
        self.mint_new(alias, family, policy).await
    }

    /// Idempotent: an existing key is reported as success without
    /// regenerating, and its policy is left alone. The first writer wins;
    /// this is not a rotation.
    pub async fn generate_symmetric_key(&self, alias: &str, policy: Option<AuthTimeout>) -> Result<bool, VaultError> {
        validate_alias(alias)?;

        let _guard = self.lock_alias(alias).await;

        if self.exists(alias).await? {
            tracing::debug!(alias = %alias, "Symmetric key already present");
            return Ok(true);
        }
        self.mint_new(alias, KeyFamily::Aes, policy).await?;
        Ok(true)
    }

    /// Generate a 256-bit HMAC secret under `alias.secret`, replacing any
    /// previous secret. An alias holding a key pair is refused.
    pub async fn generate_hmac_key(&self, alias: &str) -> Result<KeyRecord, VaultError> {
        validate_alias(alias)?;

        let _guard = self.lock_alias(alias).await;

        let present = self.present_tags(alias).await?;
        if present.iter().any(|tag| *tag != KeyTag::Secret) {
            return Err(VaultError::KeyAlreadyExists(alias.to_string()));
        }
        self.refuse_secret_account(alias).await?;
        self.gateway.require(alias).await?;

        let generated = self
            .provider
            .generate_key_material(&KeyFamily::Hmac.params())
            .await?;
        let tag = KeyTag::Secret.for_alias(alias);
        self.store.store_key(&generated.private, &tag).await?;

        tracing::info!(alias = %alias, "HMAC key generated");
        Ok(KeyRecord {
            alias: alias.to_string(),
            family: KeyFamily::Hmac,
            tags: vec![tag],
            created_at: Utc::now(),
            public_key: None,
        })
    }

    /// Delete the existing key material and generate fresh material under
    /// the same alias. Not transactional. The policy is kept.
    pub async fn rotate_key_pair(&self, alias: &str, family: KeyFamily) -> Result<KeyRecord, VaultError> {
        validate_alias(alias)?;
        if !family.is_pair() {
            return Err(VaultError::InvalidAlgorithm(format!(
                "{} keys cannot be rotated as a pair",
                family
            )));
        }

        let _guard = self.lock_alias(alias).await;

        let present = self.present_tags(alias).await?;
        if present.is_empty() {
            return Err(VaultError::KeyNotFound(alias.to_string()));
        }
        self.gateway.require(alias).await?;

        self.remove_tags(alias, &present).await?;
        tracing::info!(alias = %alias, %family, "Old key material deleted for rotation");

        self.mint_pair(alias, family).await.map_err(|e| {
            tracing::warn!(alias = %alias, error = %e, "Rotation failed after delete; alias has no key");
            e
        })
    }

    /// Remove every storage tag of `alias`. Partial removal is an error.
    ///
    /// The alias's policy goes with the key unless a secret account still
    /// shares the name.
    pub async fn delete_key_pair(&self, alias: &str) -> Result<bool, VaultError> {
        validate_alias(alias)?;

        let _guard = self.lock_alias(alias).await;

        let present = self.present_tags(alias).await?;
        if present.is_empty() {
            return Err(VaultError::KeyNotFound(alias.to_string()));
        }
        self.gateway.require(alias).await?;

        self.remove_tags(alias, &present).await?;
        tracing::info!(alias = %alias, "Key deleted");

        match self.store.retrieve_blob(alias).await {
            Ok(None) => {
                if !self.gateway.policies().remove(alias).await {
                    tracing::warn!(alias = %alias, "Deleted key's policy could not be removed");
                }
            }
            Ok(Some(_)) => {}
            Err(e) => {
                tracing::warn!(alias = %alias, error = %e, "Kept policy; secret account state unknown");
            }
        }
        Ok(true)
    }

    /// Change the policy of `alias` after passing its current one.
    /// Returns whether the change was persisted.
    pub async fn set_policy(&self, alias: &str, timeout: AuthTimeout) -> Result<bool, VaultError> {
        validate_alias(alias)?;

        let _guard = self.lock_alias(alias).await;

        self.gateway.require(alias).await?;
        Ok(self.gateway.policies().set(alias, timeout).await)
    }

    /// The stored public half of `alias`.
    pub async fn public_key(&self, alias: &str) -> Result<KeyHandle, VaultError> {
        validate_alias(alias)?;
        self.gateway.require(alias).await?;

        self.store
            .retrieve_key(&KeyTag::Public.for_alias(alias))
            .await?
            .ok_or_else(|| VaultError::KeyNotFound(alias.to_string()))
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    async fn lock_alias(&self, alias: &str) -> AliasGuard<'_> {
        let entry = {
            let mut locks = self.alias_locks.lock();
            Arc::clone(locks.entry(alias.to_string()).or_default())
        };
        let held = entry.lock_owned().await;
        AliasGuard {
            locks: &self.alias_locks,
            alias: alias.to_string(),
            held: Some(held),
        }
    }

    #[cfg(test)]
    fn tracked_aliases(&self) -> usize {
        self.alias_locks.lock().len()
    }

    async fn present_tags(&self, alias: &str) -> Result<Vec<KeyTag>, VaultError> {
        let mut present = Vec::new();
        for tag in KeyTag::ALL {
            if self.store.exists(&tag.for_alias(alias)).await? {
                present.push(tag);
            }
        }
        Ok(present)
    }

    /// A secret account already carries the alias's policy; a key must not
    /// take the name over.
    async fn refuse_secret_account(&self, alias: &str) -> Result<(), VaultError> {
        if self.store.retrieve_blob(alias).await?.is_some() {
            tracing::warn!(alias = %alias, "Refusing key generation over a secret account");
            return Err(VaultError::KeyAlreadyExists(alias.to_string()));
        }
        Ok(())
    }

    /// Gate, mint, then register `policy`. Caller holds the alias lock and
    /// has checked that no key tags exist.
    async fn mint_new(
        &self,
        alias: &str,
        family: KeyFamily,
        policy: Option<AuthTimeout>,
    ) -> Result<KeyRecord, VaultError> {
        self.refuse_secret_account(alias).await?;

        let policies = self.gateway.policies();
        let mut register = policy;
        if register.is_some() && policies.contains(alias).await? {
            tracing::info!(alias = %alias, "Keeping the policy already registered for this alias");
            register = None;
        }

        self.gateway.require(alias).await?;
        let record = self.mint_pair(alias, family).await?;

        if let Some(timeout) = register {
            if !policies.set(alias, timeout).await {
                tracing::warn!(alias = %alias, ?timeout, "Continuing without a persisted policy");
            }
        }
        Ok(record)
    }

    /// Ask the provider for fresh material and persist both halves. Caller
    /// holds the alias lock and has already passed the gateway.
    async fn mint_pair(&self, alias: &str, family: KeyFamily) -> Result<KeyRecord, VaultError> {
        let generated = self.provider.generate_key_material(&family.params()).await?;
        let public = generated.public.ok_or_else(|| {
            VaultError::Provider(format!("{} generation returned no public key", family))
        })?;

        let private_tag = KeyTag::Private.for_alias(alias);
        let public_tag = KeyTag::Public.for_alias(alias);

        self.store.store_key(&generated.private, &private_tag).await?;
        if let Err(e) = self.store.store_key(&public, &public_tag).await {
            // Leave no orphaned half behind
            if let Err(cleanup) = self.store.delete_key(&private_tag).await {
                tracing::warn!(alias = %alias, error = %cleanup, "Failed to discard private key after write failure");
            }
            return Err(e.into());
        }

        tracing::info!(alias = %alias, %family, "Key pair generated");
        Ok(KeyRecord {
            alias: alias.to_string(),
            family,
            tags: vec![private_tag, public_tag],
            created_at: Utc::now(),
            public_key: Some(public),
        })
    }

    async fn remove_tags(&self, alias: &str, tags: &[KeyTag]) -> Result<(), VaultError> {
        let mut remaining = Vec::new();
        for tag in tags {
            let name = tag.for_alias(alias);
            match self.store.delete_key(&name).await {
                Ok(true) => {}
                Ok(false) => remaining.push(name),
                Err(e) => {
                    tracing::warn!(tag = %name, error = %e, "Failed to delete key tag");
                    remaining.push(name);
                }
            }
        }

        if remaining.is_empty() {
            Ok(())
        } else {
            Err(VaultError::StoreWriteFailed(format!(
                "partial deletion of '{}': could not remove {}",
                alias,
                remaining.join(", ")
            )))
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
