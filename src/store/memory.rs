// Keyvault — In-memory blob store
//
// Process-local `SecureBlobStore` for tests and embedders that bring their
// own persistence. Clones share the same maps, so a clone handed to a fresh
// `PolicyCache` behaves like the same store after a restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::keys::KeyHandle;

use super::{SecureBlobStore, StoreError};

#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    keys: Arc<RwLock<HashMap<String, KeyHandle>>>,
    blobs: Arc<RwLock<HashMap<String, Zeroizing<Vec<u8>>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of key handles currently stored.
    pub fn key_count(&self) -> usize {
        self.keys.read().len()
    }
}

#[async_trait]
impl SecureBlobStore for MemoryBlobStore {
    async fn store_key(&self, key: &KeyHandle, tag: &str) -> Result<(), StoreError> {
        self.keys.write().insert(tag.to_string(), key.clone());
        Ok(())
    }

    async fn retrieve_key(&self, tag: &str) -> Result<Option<KeyHandle>, StoreError> {
        Ok(self.keys.read().get(tag).cloned())
    }

    async fn delete_key(&self, tag: &str) -> Result<bool, StoreError> {
        Ok(self.keys.write().remove(tag).is_some())
    }

    async fn store_blob(&self, data: &[u8], account: &str) -> Result<(), StoreError> {
        self.blobs
            .write()
            .insert(account.to_string(), Zeroizing::new(data.to_vec()));
        Ok(())
    }

    async fn retrieve_blob(&self, account: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        Ok(self.blobs.read().get(account).cloned())
    }

    async fn exists(&self, tag: &str) -> Result<bool, StoreError> {
        Ok(self.keys.read().contains_key(tag))
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.keys.write().clear();
        self.blobs.write().clear();
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyFamily;

    #[tokio::test]
    async fn test_keys_and_blobs_are_separate_namespaces() {
        let store = MemoryBlobStore::new();
        store
            .store_key(&KeyHandle::new(KeyFamily::Rsa, vec![1, 2, 3]), "shared")
            .await
            .unwrap();

        assert!(store.exists("shared").await.unwrap());
        assert!(store.retrieve_blob("shared").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryBlobStore::new();
        let clone = store.clone();
        store.store_blob(b"value", "account").await.unwrap();

        let read = clone.retrieve_blob("account").await.unwrap().unwrap();
        assert_eq!(read.as_slice(), b"value");
    }

    #[tokio::test]
    async fn test_delete_reports_whether_anything_was_removed() {
        let store = MemoryBlobStore::new();
        store
            .store_key(&KeyHandle::new(KeyFamily::Ec, vec![9]), "k.private")
            .await
            .unwrap();

        assert!(store.delete_key("k.private").await.unwrap());
        assert!(!store.delete_key("k.private").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_all_empties_everything() {
        let store = MemoryBlobStore::new();
        store
            .store_key(&KeyHandle::new(KeyFamily::Aes, vec![7]), "a.private")
            .await
            .unwrap();
        store.store_blob(b"x", "acct").await.unwrap();

        store.clear_all().await.unwrap();
        assert_eq!(store.key_count(), 0);
        assert!(store.retrieve_blob("acct").await.unwrap().is_none());
    }
}
