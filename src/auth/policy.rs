// Keyvault — Policy Cache
//
// Mirrors the per-alias authentication timeouts persisted under the reserved
// `keyAuthMap` blob account.
//
// Flow:
//   1. The cache starts `Uninitialized`. The first `get()` awaits a single
//      store read, decodes the JSON map, and flips to `Hydrated`.
//   2. Hot reads (`try_get()`) never touch the store.
//   3. `set()` updates the mirror first (read-your-write), then writes the
//      whole map back. A failed write is logged and NOT rolled back.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::error::VaultError;
use crate::store::SecureBlobStore;

/// Blob account holding the serialized policy map.
pub const POLICY_ACCOUNT: &str = "keyAuthMap";

/// Policy applied to aliases that never had one set: fail closed.
pub const DEFAULT_AUTH_TIMEOUT: AuthTimeout = AuthTimeout::Always;

/// How long a successful authentication stays valid for one alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTimeout {
    /// Never prompt (`-1`).
    Never,
    /// Prompt on every use (`0`).
    Always,
    /// Reuse a successful authentication for N seconds.
    Seconds(u64),
}

impl AuthTimeout {
    /// Decode the wire form: negative → Never, 0 → Always, N → Seconds(N).
    pub fn from_seconds(seconds: i64) -> Self {
        match seconds {
            s if s < 0 => AuthTimeout::Never,
            0 => AuthTimeout::Always,
            s => AuthTimeout::Seconds(s as u64),
        }
    }

    pub fn as_seconds(&self) -> i64 {
        match self {
            AuthTimeout::Never => -1,
            AuthTimeout::Always => 0,
            AuthTimeout::Seconds(n) => i64::try_from(*n).unwrap_or(i64::MAX),
        }
    }

    /// Policy for a key registered with `auth_required` / `auth_timeout`.
    /// A required key with a negative timeout is treated as Always.
    pub fn from_registration(auth_required: bool, auth_timeout: i32) -> Self {
        if !auth_required {
            return AuthTimeout::Never;
        }
        if auth_timeout <= 0 {
            AuthTimeout::Always
        } else {
            AuthTimeout::Seconds(auth_timeout as u64)
        }
    }
}

enum Mirror {
    Uninitialized,
    Hydrated(HashMap<String, AuthTimeout>),
}

/// Injectable cache of authentication policies backed by a blob store.
pub struct PolicyCache {
    store: Arc<dyn SecureBlobStore>,
    mirror: RwLock<Mirror>,
    hydration: Mutex<()>,
    persist: Mutex<()>,
}

impl PolicyCache {
    pub fn new(store: Arc<dyn SecureBlobStore>) -> Self {
        Self {
            store,
            mirror: RwLock::new(Mirror::Uninitialized),
            hydration: Mutex::new(()),
            persist: Mutex::new(()),
        }
    }

    pub fn is_hydrated(&self) -> bool {
        matches!(*self.mirror.read(), Mirror::Hydrated(_))
    }

    /// Non-blocking mirror read. `None` until the cache has been hydrated.
    pub fn try_get(&self, alias: &str) -> Option<AuthTimeout> {
        match &*self.mirror.read() {
            Mirror::Hydrated(map) => Some(map.get(alias).copied().unwrap_or(DEFAULT_AUTH_TIMEOUT)),
            Mirror::Uninitialized => None,
        }
    }

    /// Timeout policy for `alias`, hydrating from the store on first use.
    pub async fn get(&self, alias: &str) -> Result<AuthTimeout, VaultError> {
        if let Some(timeout) = self.try_get(alias) {
            return Ok(timeout);
        }
        self.hydrate().await?;
        Ok(self.try_get(alias).unwrap_or(DEFAULT_AUTH_TIMEOUT))
    }

    /// Record a policy and write the full map through to the store.
    ///
    /// Returns whether the write was persisted. The in-process value is kept
    /// either way.
    pub async fn set(&self, alias: &str, timeout: AuthTimeout) -> bool {
        // Hydrate first so the write-back cannot clobber persisted entries.
        if let Err(e) = self.hydrate().await {
            tracing::warn!(alias = %alias, error = %e, "Policy not recorded: cache could not hydrate");
            return false;
        }

        {
            let mut mirror = self.mirror.write();
            match &mut *mirror {
                Mirror::Hydrated(map) => {
                    map.insert(alias.to_string(), timeout);
                }
                Mirror::Uninitialized => {
                    // reset() raced with us; start a fresh map rather than drop the write
                    let mut map = HashMap::new();
                    map.insert(alias.to_string(), timeout);
                    *mirror = Mirror::Hydrated(map);
                }
            }
        }

        tracing::debug!(alias = %alias, timeout = timeout.as_seconds(), "Auth policy recorded");
        self.write_back(alias).await
    }

    /// Whether `alias` has an explicitly registered policy, as opposed to
    /// falling back to the default.
    pub async fn contains(&self, alias: &str) -> Result<bool, VaultError> {
        self.hydrate().await?;
        Ok(match &*self.mirror.read() {
            Mirror::Hydrated(map) => map.contains_key(alias),
            Mirror::Uninitialized => false,
        })
    }

    /// Drop the policy of `alias` so it falls back to the default. Returns
    /// whether the removal was persisted.
    pub async fn remove(&self, alias: &str) -> bool {
        if let Err(e) = self.hydrate().await {
            tracing::warn!(alias = %alias, error = %e, "Policy not removed: cache could not hydrate");
            return false;
        }

        let removed = match &mut *self.mirror.write() {
            Mirror::Hydrated(map) => map.remove(alias).is_some(),
            Mirror::Uninitialized => false,
        };
        if !removed {
            return true;
        }
        self.write_back(alias).await
    }

    /// Forget the mirror, as after a process restart.
    pub fn reset(&self) {
        *self.mirror.write() = Mirror::Uninitialized;
    }

    /// Mark the cache as hydrated with no policies (the store was wiped).
    pub fn clear(&self) {
        *self.mirror.write() = Mirror::Hydrated(HashMap::new());
    }

    async fn write_back(&self, alias: &str) -> bool {
        // Snapshot inside the lock so the last persisted map is the newest one
        let _turn = self.persist.lock().await;
        let encoded = match self.encode_mirror() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(alias = %alias, error = %e, "Failed to serialize auth policies");
                return false;
            }
        };

        match self.store.store_blob(&encoded, POLICY_ACCOUNT).await {
            Ok(()) => {
                tracing::debug!(alias = %alias, "Auth policies written back");
                true
            }
            Err(e) => {
                tracing::warn!(alias = %alias, error = %e, "Failed to persist auth policies");
                false
            }
        }
    }

    async fn hydrate(&self) -> Result<(), VaultError> {
        let _guard = self.hydration.lock().await;
        if self.is_hydrated() {
            return Ok(());
        }

        let map = match self.store.retrieve_blob(POLICY_ACCOUNT).await? {
            Some(bytes) => decode_policies(&bytes)?,
            None => HashMap::new(),
        };

        tracing::debug!(entries = map.len(), "Policy cache hydrated");
        *self.mirror.write() = Mirror::Hydrated(map);
        Ok(())
    }

    fn encode_mirror(&self) -> Result<Vec<u8>, VaultError> {
        let mirror = self.mirror.read();
        let flat: BTreeMap<&str, i64> = match &*mirror {
            Mirror::Hydrated(map) => map
                .iter()
                .map(|(alias, timeout)| (alias.as_str(), timeout.as_seconds()))
                .collect(),
            Mirror::Uninitialized => BTreeMap::new(),
        };
        Ok(serde_json::to_vec(&flat)?)
    }
}

/// Decode a flat `{alias: seconds}` object. Seconds may be written as
/// integers or floats; fractions are truncated.
fn decode_policies(bytes: &[u8]) -> Result<HashMap<String, AuthTimeout>, VaultError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(HashMap::new());
    }
    let raw: HashMap<String, f64> = serde_json::from_slice(bytes)?;
    Ok(raw
        .into_iter()
        .filter(|(alias, _)| alias != POLICY_ACCOUNT)
        .map(|(alias, seconds)| (alias, AuthTimeout::from_seconds(seconds as i64)))
        .collect())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::InstrumentedStore;

    fn cache_over(store: &Arc<InstrumentedStore>) -> PolicyCache {
        PolicyCache::new(Arc::clone(store) as Arc<dyn SecureBlobStore>)
    }

    #[test]
    fn test_timeout_wire_form() {
        assert_eq!(AuthTimeout::from_seconds(-1), AuthTimeout::Never);
        assert_eq!(AuthTimeout::from_seconds(-30), AuthTimeout::Never);
        assert_eq!(AuthTimeout::from_seconds(0), AuthTimeout::Always);
        assert_eq!(AuthTimeout::from_seconds(30), AuthTimeout::Seconds(30));
        assert_eq!(AuthTimeout::Seconds(30).as_seconds(), 30);
        assert_eq!(AuthTimeout::Never.as_seconds(), -1);
    }

    #[test]
    fn test_registration_mapping() {
        assert_eq!(AuthTimeout::from_registration(false, 30), AuthTimeout::Never);
        assert_eq!(AuthTimeout::from_registration(true, 0), AuthTimeout::Always);
        assert_eq!(AuthTimeout::from_registration(true, -1), AuthTimeout::Always);
        assert_eq!(AuthTimeout::from_registration(true, 45), AuthTimeout::Seconds(45));
    }

    #[tokio::test]
    async fn test_unset_alias_uses_pinned_default() {
        let store = Arc::new(InstrumentedStore::new());
        let cache = cache_over(&store);

        assert_eq!(cache.get("never-set").await.unwrap(), AuthTimeout::Always);
        assert_eq!(DEFAULT_AUTH_TIMEOUT, AuthTimeout::Always);
    }

    #[tokio::test]
    async fn test_read_your_write_without_store_round_trip() {
        let store = Arc::new(InstrumentedStore::new());
        let cache = cache_over(&store);

        assert!(cache.set("sig-key", AuthTimeout::Seconds(30)).await);
        let reads_after_set = store.blob_reads();

        assert_eq!(cache.try_get("sig-key"), Some(AuthTimeout::Seconds(30)));
        assert_eq!(cache.get("sig-key").await.unwrap(), AuthTimeout::Seconds(30));
        assert_eq!(
            store.blob_reads(),
            reads_after_set,
            "Hot reads must not touch the store"
        );
    }

    #[tokio::test]
    async fn test_cold_hydration_after_restart() {
        let store = Arc::new(InstrumentedStore::new());
        let cache = cache_over(&store);
        assert!(cache.set("sig-key", AuthTimeout::Seconds(30)).await);

        // Same store, fresh process
        cache.reset();
        assert!(!cache.is_hydrated());
        assert_eq!(cache.try_get("sig-key"), None);

        let reads_before = store.blob_reads();
        assert_eq!(cache.get("sig-key").await.unwrap(), AuthTimeout::Seconds(30));
        assert_eq!(store.blob_reads(), reads_before + 1);
        assert!(cache.is_hydrated());

        let other = cache_over(&store);
        assert_eq!(other.get("sig-key").await.unwrap(), AuthTimeout::Seconds(30));
    }

    #[tokio::test]
    async fn test_concurrent_cold_reads_hydrate_once() {
        let store = Arc::new(InstrumentedStore::new());
        let cache = Arc::new(cache_over(&store));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move { cache.get("any").await.unwrap() }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), DEFAULT_AUTH_TIMEOUT);
        }
        assert_eq!(store.blob_reads(), 1);
    }

    #[tokio::test]
    async fn test_set_keeps_previously_persisted_entries() {
        let store = Arc::new(InstrumentedStore::new());
        store
            .inner()
            .store_blob(br#"{"old-key": -1}"#, POLICY_ACCOUNT)
            .await
            .unwrap();

        let cache = cache_over(&store);
        assert!(cache.set("new-key", AuthTimeout::Seconds(10)).await);

        let fresh = cache_over(&store);
        assert_eq!(fresh.get("old-key").await.unwrap(), AuthTimeout::Never);
        assert_eq!(fresh.get("new-key").await.unwrap(), AuthTimeout::Seconds(10));
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_mirror_value() {
        let store = Arc::new(InstrumentedStore::new());
        let cache = cache_over(&store);
        cache.get("warm-up").await.unwrap();

        store.fail_writes(true);
        assert!(!cache.set("sig-key", AuthTimeout::Never).await);
        assert_eq!(
            cache.try_get("sig-key"),
            Some(AuthTimeout::Never),
            "Mirror update must not be rolled back"
        );

        // Nothing reached the store
        cache.reset();
        store.fail_writes(false);
        assert_eq!(cache.get("sig-key").await.unwrap(), DEFAULT_AUTH_TIMEOUT);
    }

    #[tokio::test]
    async fn test_decodes_float_seconds_and_skips_reserved_entry() {
        let store = Arc::new(InstrumentedStore::new());
        store
            .inner()
            .store_blob(br#"{"keyAuthMap": -1, "a": 30.0, "b": 0}"#, POLICY_ACCOUNT)
            .await
            .unwrap();

        let cache = cache_over(&store);
        assert_eq!(cache.get("a").await.unwrap(), AuthTimeout::Seconds(30));
        assert_eq!(cache.get("b").await.unwrap(), AuthTimeout::Always);
        assert_eq!(cache.get(POLICY_ACCOUNT).await.unwrap(), DEFAULT_AUTH_TIMEOUT);
    }

    #[tokio::test]
    async fn test_corrupt_map_is_a_serialization_error() {
        let store = Arc::new(InstrumentedStore::new());
        store
            .inner()
            .store_blob(b"not json", POLICY_ACCOUNT)
            .await
            .unwrap();

        let cache = cache_over(&store);
        let err = cache.get("a").await.unwrap_err();
        assert_eq!(err.code(), "SERIALIZATION_ERROR");
        assert!(!cache.is_hydrated());
    }

    #[tokio::test]
    async fn test_clear_leaves_hydrated_empty_map() {
        let store = Arc::new(InstrumentedStore::new());
        let cache = cache_over(&store);
        cache.set("a", AuthTimeout::Never).await;

        cache.clear();
        assert!(cache.is_hydrated());
        assert_eq!(cache.try_get("a"), Some(DEFAULT_AUTH_TIMEOUT));
    }

    #[tokio::test]
    async fn test_contains_distinguishes_registered_from_default() {
        let store = Arc::new(InstrumentedStore::new());
        let cache = cache_over(&store);
        assert!(cache.set("explicit", AuthTimeout::Always).await);

        assert!(cache.contains("explicit").await.unwrap());
        assert!(
            !cache.contains("implicit").await.unwrap(),
            "Falling back to the default is not a registration"
        );

        cache.reset();
        assert!(cache.contains("explicit").await.unwrap(), "Persisted entries count after restart");
    }

    #[tokio::test]
    async fn test_remove_persists_and_restores_default() {
        let store = Arc::new(InstrumentedStore::new());
        let cache = cache_over(&store);
        cache.set("gone", AuthTimeout::Never).await;
        cache.set("kept", AuthTimeout::Seconds(5)).await;

        assert!(cache.remove("gone").await);
        assert!(cache.remove("never-there").await);

        let fresh = cache_over(&store);
        assert!(!fresh.contains("gone").await.unwrap());
        assert_eq!(fresh.get("gone").await.unwrap(), DEFAULT_AUTH_TIMEOUT);
        assert_eq!(fresh.get("kept").await.unwrap(), AuthTimeout::Seconds(5));
    }
}
