// Keyvault — SQLCipher-backed blob store
//
// Durable `SecureBlobStore` over the encrypted database. rusqlite is
// synchronous, so every call hops onto the blocking pool while holding the
// single connection.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use zeroize::Zeroizing;

use crate::keys::{KeyFamily, KeyHandle};

use super::db::Database;
use super::{SecureBlobStore, StoreError};

#[derive(Clone)]
pub struct SqliteBlobStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteBlobStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open the encrypted store file at `path` with the hex-encoded key.
    pub fn open(path: &Path, hex_key: &str) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(path, hex_key)?))
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db.lock();
            f(guard.conn())
        })
        .await
        .map_err(|e| StoreError::Other(format!("store task failed: {}", e)))?
    }
}

#[async_trait]
impl SecureBlobStore for SqliteBlobStore {
    async fn store_key(&self, key: &KeyHandle, tag: &str) -> Result<(), StoreError> {
        let tag = tag.to_string();
        let family = key.family().as_str();
        let material = Zeroizing::new(key.as_bytes().to_vec());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO key_items (tag, family, material, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![tag, family, material.as_slice(), Utc::now().to_rfc3339()],
            )
            .map_err(|e| StoreError::write(&tag, e))?;
            Ok(())
        })
        .await
    }

    async fn retrieve_key(&self, tag: &str) -> Result<Option<KeyHandle>, StoreError> {
        let tag = tag.to_string();
        self.with_conn(move |conn| {
            let row: Option<(String, Vec<u8>)> = conn
                .query_row(
                    "SELECT family, material FROM key_items WHERE tag = ?1",
                    params![tag],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(|e| StoreError::read(&tag, e))?;

            match row {
                Some((family, material)) => {
                    let family: KeyFamily =
                        family.parse().map_err(|e| StoreError::read(&tag, e))?;
                    Ok(Some(KeyHandle::new(family, material)))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn delete_key(&self, tag: &str) -> Result<bool, StoreError> {
        let tag = tag.to_string();
        self.with_conn(move |conn| {
            let affected = conn
                .execute("DELETE FROM key_items WHERE tag = ?1", params![tag])
                .map_err(|e| StoreError::write(&tag, e))?;
            Ok(affected > 0)
        })
        .await
    }

    async fn store_blob(&self, data: &[u8], account: &str) -> Result<(), StoreError> {
        let account = account.to_string();
        let data = Zeroizing::new(data.to_vec());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO blob_items (account, data, updated_at)
                 VALUES (?1, ?2, ?3)",
                params![account, data.as_slice(), Utc::now().to_rfc3339()],
            )
            .map_err(|e| StoreError::write(&account, e))?;
            Ok(())
        })
        .await
    }

    async fn retrieve_blob(&self, account: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        let account = account.to_string();
        self.with_conn(move |conn| {
            let data: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT data FROM blob_items WHERE account = ?1",
                    params![account],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::read(&account, e))?;
            Ok(data.map(Zeroizing::new))
        })
        .await
    }

    async fn exists(&self, tag: &str) -> Result<bool, StoreError> {
        let tag = tag.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT count(*) FROM key_items WHERE tag = ?1",
                    params![tag],
                    |row| row.get(0),
                )
                .map_err(|e| StoreError::read(&tag, e))?;
            Ok(count > 0)
        })
        .await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch("DELETE FROM key_items; DELETE FROM blob_items;")
                .map_err(|e| StoreError::write("*", e))?;
            Ok(())
        })
        .await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
