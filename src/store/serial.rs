// Keyvault — Sequential store access
//
// Wraps any `SecureBlobStore` so that calls against one logical namespace
// run strictly one at a time, in arrival order. tokio's `Mutex` is FIFO-fair,
// which makes it a sequential queue without a dedicated worker task.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use crate::keys::KeyHandle;

use super::{SecureBlobStore, StoreError};

pub struct SerialStore {
    namespace: String,
    inner: Arc<dyn SecureBlobStore>,
    queue: Mutex<()>,
}

impl SerialStore {
    pub fn new(namespace: impl Into<String>, inner: Arc<dyn SecureBlobStore>) -> Self {
        Self {
            namespace: namespace.into(),
            inner,
            queue: Mutex::new(()),
        }
    }
}

#[async_trait]
impl SecureBlobStore for SerialStore {
    async fn store_key(&self, key: &KeyHandle, tag: &str) -> Result<(), StoreError> {
        let _turn = self.queue.lock().await;
        self.inner.store_key(key, tag).await
    }

    async fn retrieve_key(&self, tag: &str) -> Result<Option<KeyHandle>, StoreError> {
        let _turn = self.queue.lock().await;
        self.inner.retrieve_key(tag).await
    }

    async fn delete_key(&self, tag: &str) -> Result<bool, StoreError> {
        let _turn = self.queue.lock().await;
        self.inner.delete_key(tag).await
    }

    async fn store_blob(&self, data: &[u8], account: &str) -> Result<(), StoreError> {
        let _turn = self.queue.lock().await;
        self.inner.store_blob(data, account).await
    }

    async fn retrieve_blob(&self, account: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        let _turn = self.queue.lock().await;
        self.inner.retrieve_blob(account).await
    }

    async fn exists(&self, tag: &str) -> Result<bool, StoreError> {
        let _turn = self.queue.lock().await;
        self.inner.exists(tag).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let _turn = self.queue.lock().await;
        tracing::warn!(namespace = %self.namespace, "Clearing every key and blob");
        self.inner.clear_all().await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
