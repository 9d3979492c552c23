// Keyvault — Secure Blob Store contract
//
// The vault never touches persistent storage directly; everything goes
// through this trait. Keys live under storage tags (`alias.private`, ...),
// free-form secrets under blob accounts. The two namespaces are disjoint.

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::keys::KeyHandle;

use super::StoreError;

/// Durable keyed storage for key handles and secret blobs.
///
/// Each call is individually atomic. Callers that need ordering across
/// calls wrap the store in a [`SerialStore`](super::SerialStore).
#[async_trait]
pub trait SecureBlobStore: Send + Sync {
    /// Persist a key handle under `tag`, replacing any previous handle.
    async fn store_key(&self, key: &KeyHandle, tag: &str) -> Result<(), StoreError>;

    async fn retrieve_key(&self, tag: &str) -> Result<Option<KeyHandle>, StoreError>;

    /// Remove the handle under `tag`. Returns true if something was removed.
    async fn delete_key(&self, tag: &str) -> Result<bool, StoreError>;

    /// Persist a secret blob under `account`, replacing any previous value.
    async fn store_blob(&self, data: &[u8], account: &str) -> Result<(), StoreError>;

    async fn retrieve_blob(&self, account: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError>;

    /// Whether a key handle exists under `tag`.
    async fn exists(&self, tag: &str) -> Result<bool, StoreError>;

    /// Remove every key and blob.
    async fn clear_all(&self) -> Result<(), StoreError>;
}
