// Keyvault — Master secret and store key derivation
//
// The on-disk blob store is encrypted with a key that never touches disk:
//   1. A random 256-bit master secret lives in the platform keyring
//      (created on first use).
//   2. `derive_store_key` stretches it with Argon2id, salted per
//      installation, into the 32-byte SQLCipher key.
//   3. The key is handed to SQLCipher as hex and dropped (zeroized).

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::EnclaveError;

// ─── Constants ───────────────────────────────────────────────────────────────

const KEYRING_SERVICE: &str = "keyvault";

const KEYRING_USER: &str = "store-master-secret";

/// 256-bit master secret.
pub const MASTER_SECRET_LEN: usize = 32;

/// SQLCipher raw key length.
const STORE_KEY_LEN: usize = 32;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Where the master secret is kept. Implementations must never log it.
pub trait MasterSecretStore: Send + Sync {
    /// Fetch the master secret, generating and storing one on first use.
    fn load_or_create(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError>;

    /// Fetch the master secret without creating one.
    fn load(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError>;

    fn exists(&self) -> Result<bool, EnclaveError>;

    /// Remove the master secret. Anything encrypted under it becomes
    /// unreadable.
    fn destroy(&self) -> Result<(), EnclaveError>;

    /// Stable per-installation context mixed into the KDF salt.
    fn salt_context(&self) -> String;
}

fn generate_master_secret() -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(vec![0u8; MASTER_SECRET_LEN]);
    rand::rng().fill_bytes(&mut secret);
    secret
}

// ─── Keyring ─────────────────────────────────────────────────────────────────

/// Master secret in the OS keyring: Secret Service on Linux, Keychain on
/// macOS, Credential Manager on Windows.
pub struct KeyringSecretStore {
    service: String,
    user: String,
}

impl KeyringSecretStore {
    pub fn new() -> Self {
        Self::with_names(KEYRING_SERVICE, KEYRING_USER)
    }

    pub fn with_names(service: &str, user: &str) -> Self {
        Self {
            service: service.to_string(),
            user: user.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, EnclaveError> {
        keyring::Entry::new(&self.service, &self.user)
            .map_err(|e| EnclaveError::Keyring(format!("failed to open keyring entry: {}", e)))
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterSecretStore for KeyringSecretStore {
    fn load_or_create(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        match self.load() {
            Err(EnclaveError::MasterSecretNotFound) => {
                tracing::info!(service = %self.service, "No master secret found, generating one");
                let secret = generate_master_secret();
                self.entry()?.set_secret(&secret).map_err(|e| {
                    EnclaveError::Keyring(format!("failed to store master secret: {}", e))
                })?;
                Ok(secret)
            }
            other => other,
        }
    }

    fn load(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        match self.entry()?.get_secret() {
            Ok(secret) => {
                let secret = Zeroizing::new(secret);
                if secret.len() != MASTER_SECRET_LEN {
                    return Err(EnclaveError::InvalidSecretLength(secret.len(), MASTER_SECRET_LEN));
                }
                tracing::debug!("Master secret loaded from keyring");
                Ok(secret)
            }
            Err(keyring::Error::NoEntry) => Err(EnclaveError::MasterSecretNotFound),
            Err(e) => Err(EnclaveError::Keyring(format!(
                "failed to read master secret: {}",
                e
            ))),
        }
    }

    fn exists(&self) -> Result<bool, EnclaveError> {
        match self.load() {
            Ok(_) => Ok(true),
            Err(EnclaveError::MasterSecretNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn destroy(&self) -> Result<(), EnclaveError> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                tracing::warn!(service = %self.service, "Master secret deleted; the store is now unreadable");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(EnclaveError::Keyring(format!(
                "failed to delete master secret: {}",
                e
            ))),
        }
    }

    fn salt_context(&self) -> String {
        format!("{}::{}", self.service, self.user)
    }
}

// ─── Derivation ──────────────────────────────────────────────────────────────

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfCost {
    /// Memory in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub lanes: u32,
}

impl Default for KdfCost {
    /// 64 MiB, 3 passes, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            lanes: 4,
        }
    }
}

/// Derive the hex-encoded SQLCipher key from `master`. Deterministic for a
/// given secret, salt context, and cost.
pub fn derive_store_key(
    master: &[u8],
    salt_context: &str,
    cost: KdfCost,
) -> Result<Zeroizing<String>, EnclaveError> {
    if master.len() != MASTER_SECRET_LEN {
        return Err(EnclaveError::InvalidSecretLength(master.len(), MASTER_SECRET_LEN));
    }

    let salt = Sha256::digest(salt_context.as_bytes());
    let params = Params::new(cost.memory_kib, cost.iterations, cost.lanes, Some(STORE_KEY_LEN))
        .map_err(|e| EnclaveError::Derivation(format!("invalid Argon2 params: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new(vec![0u8; STORE_KEY_LEN]);
    argon2
        .hash_password_into(master, &salt, &mut key)
        .map_err(|e| EnclaveError::Derivation(format!("Argon2id failed: {}", e)))?;

    Ok(Zeroizing::new(key.iter().map(|b| format!("{:02x}", b)).collect()))
}

// ─── In-Memory Mock for Testing ──────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────
