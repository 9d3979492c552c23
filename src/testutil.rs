// Keyvault — Test doubles
//
// Deterministic stand-ins for the three external collaborators: a
// software crypto provider, a scripted biometric capability, and a store
// wrapper that counts, delays, and fails on demand.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::auth::{AuthDecision, BiometricCapability, PromptCopy};
use crate::crypto::{CryptoProvider, ProviderError};
use crate::keys::{
    EncryptionScheme, GeneratedKey, KeyHandle, KeyParams, MacScheme, SignatureScheme,
};
use crate::store::{MemoryBlobStore, SecureBlobStore, StoreError};

// ─── StubProvider ────────────────────────────────────────────────────────────

/// Hash-based provider: not secure, but signatures only verify under the
/// matching public half and ciphertexts only decrypt under the matching
/// private half.
pub struct StubProvider {
    generations: AtomicUsize,
    fail_generation: AtomicBool,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            generations: AtomicUsize::new(0),
            fail_generation: AtomicBool::new(false),
        }
    }

    /// Successful `generate_key_material` calls so far.
    pub fn generations(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    pub fn fail_generation(&self, fail: bool) {
        self.fail_generation.store(fail, Ordering::SeqCst);
    }

    fn public_for(private: &[u8]) -> Vec<u8> {
        digest(&[b"public".as_slice(), private])
    }

    fn keystream_tag(public: &[u8], nonce: &[u8], body: &[u8]) -> Vec<u8> {
        digest(&[b"tag".as_slice(), public, nonce, body])[..16].to_vec()
    }

    fn apply_keystream(public: &[u8], nonce: &[u8], data: &[u8]) -> Vec<u8> {
        data.iter()
            .enumerate()
            .map(|(i, byte)| {
                let block = digest(&[b"stream".as_slice(), public, nonce, &(i / 32).to_be_bytes()]);
                byte ^ block[i % 32]
            })
            .collect()
    }
}

fn digest(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

#[async_trait]
impl CryptoProvider for StubProvider {
    async fn generate_key_material(&self, params: &KeyParams) -> Result<GeneratedKey, ProviderError> {
        if self.fail_generation.load(Ordering::SeqCst) {
            return Err(ProviderError::Generation("stub configured to fail".to_string()));
        }
        self.generations.fetch_add(1, Ordering::SeqCst);

        let private: [u8; 32] = rand::random();
        let public = params
            .family
            .is_pair()
            .then(|| KeyHandle::new(params.family, Self::public_for(&private)));
        Ok(GeneratedKey {
            private: KeyHandle::new(params.family, private.to_vec()),
            public,
        })
    }

    async fn sign(
        &self,
        private: &KeyHandle,
        scheme: SignatureScheme,
        payload: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        let public = Self::public_for(private.as_bytes());
        Ok(digest(&[format!("{:?}", scheme).as_bytes(), &public, payload]))
    }

    async fn verify(
        &self,
        public: &KeyHandle,
        scheme: SignatureScheme,
        payload: &[u8],
        signature: &[u8],
    ) -> bool {
        digest(&[format!("{:?}", scheme).as_bytes(), public.as_bytes(), payload]) == signature
    }

    async fn encrypt_asymmetric(
        &self,
        public: &KeyHandle,
        _scheme: EncryptionScheme,
        payload: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        let nonce: [u8; 12] = rand::random();
        let body = Self::apply_keystream(public.as_bytes(), &nonce, payload);
        let tag = Self::keystream_tag(public.as_bytes(), &nonce, &body);

        let mut out = nonce.to_vec();
        out.extend_from_slice(&body);
        out.extend_from_slice(&tag);
        Ok(out)
    }

    async fn decrypt_asymmetric(
        &self,
        private: &KeyHandle,
        _scheme: EncryptionScheme,
        payload: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, ProviderError> {
        if payload.len() < 12 + 16 {
            return Err(ProviderError::Operation("ciphertext too short".to_string()));
        }
        let public = Self::public_for(private.as_bytes());
        let (nonce, rest) = payload.split_at(12);
        let (body, tag) = rest.split_at(rest.len() - 16);

        if Self::keystream_tag(&public, nonce, body) != tag {
            return Err(ProviderError::Operation("authentication tag mismatch".to_string()));
        }
        Ok(Zeroizing::new(Self::apply_keystream(&public, nonce, body)))
    }

    async fn hmac(&self, secret: &KeyHandle, _scheme: MacScheme, payload: &[u8]) -> Vec<u8> {
        digest(&[secret.as_bytes(), payload])
    }
}

// ─── ScriptedBiometrics ──────────────────────────────────────────────────────

/// Answers queued decisions in order, then the default. Tracks how many
/// prompts were shown and how many overlapped.
pub struct ScriptedBiometrics {
    default: AuthDecision,
    script: Mutex<VecDeque<AuthDecision>>,
    delay: Duration,
    prompts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    last_prompt: Mutex<Option<PromptCopy>>,
}

impl ScriptedBiometrics {
    pub fn granting() -> Self {
        Self {
            default: AuthDecision::Granted,
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            prompts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a one-shot answer for the next prompt.
    pub fn push(&self, decision: AuthDecision) {
        self.script.lock().push_back(decision);
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<PromptCopy> {
        self.last_prompt.lock().clone()
    }
}

#[async_trait]
impl BiometricCapability for ScriptedBiometrics {
    fn is_available(&self) -> bool {
        true
    }

    async fn authenticate(&self, prompt: &PromptCopy) -> AuthDecision {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        *self.last_prompt.lock() = Some(prompt.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let decision = self.script.lock().pop_front().unwrap_or(self.default);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        decision
    }
}

// ─── InstrumentedStore ───────────────────────────────────────────────────────

/// `MemoryBlobStore` wrapper with call counting, overlap tracking, an
/// optional per-call delay, and failure injection.
#[derive(Default)]
pub struct InstrumentedStore {
    inner: MemoryBlobStore,
    delay: Duration,
    blob_reads: AtomicUsize,
    in_flight: AtomicUsize,
    max_concurrent: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    failing_writes: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Direct access to the wrapped store, bypassing counters and failures.
    pub fn inner(&self) -> &MemoryBlobStore {
        &self.inner
    }

    pub fn blob_reads(&self) -> usize {
        self.blob_reads.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    /// Fail every read (key and blob).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fail every write (key and blob).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail `store_key` for one tag only.
    pub fn fail_writes_to(&self, tag: &str) {
        self.failing_writes.lock().insert(tag.to_string());
    }

    /// Fail `delete_key` for one tag only.
    pub fn fail_deletes_of(&self, tag: &str) {
        self.failing_deletes.lock().insert(tag.to_string());
    }

    async fn enter(&self) -> CallGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        CallGuard(&self.in_flight)
    }

    fn check_read(&self, target: &str) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::read(target, "injected read failure"));
        }
        Ok(())
    }

    fn check_write(&self, target: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) || self.failing_writes.lock().contains(target) {
            return Err(StoreError::write(target, "injected write failure"));
        }
        Ok(())
    }
}

struct CallGuard<'a>(&'a AtomicUsize);

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SecureBlobStore for InstrumentedStore {
    async fn store_key(&self, key: &KeyHandle, tag: &str) -> Result<(), StoreError> {
        let _call = self.enter().await;
        self.check_write(tag)?;
        self.inner.store_key(key, tag).await
    }

    async fn retrieve_key(&self, tag: &str) -> Result<Option<KeyHandle>, StoreError> {
        let _call = self.enter().await;
        self.check_read(tag)?;
        self.inner.retrieve_key(tag).await
    }

    async fn delete_key(&self, tag: &str) -> Result<bool, StoreError> {
        let _call = self.enter().await;
        if self.fail_writes.load(Ordering::SeqCst) || self.failing_deletes.lock().contains(tag) {
            return Err(StoreError::write(tag, "injected delete failure"));
        }
        self.inner.delete_key(tag).await
    }

    async fn store_blob(&self, data: &[u8], account: &str) -> Result<(), StoreError> {
        let _call = self.enter().await;
        self.check_write(account)?;
        self.inner.store_blob(data, account).await
    }

    async fn retrieve_blob(&self, account: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        let _call = self.enter().await;
        self.blob_reads.fetch_add(1, Ordering::SeqCst);
        self.check_read(account)?;
        self.inner.retrieve_blob(account).await
    }

    async fn exists(&self, tag: &str) -> Result<bool, StoreError> {
        let _call = self.enter().await;
        self.check_read(tag)?;
        self.inner.exists(tag).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let _call = self.enter().await;
        self.check_write("*")?;
        self.inner.clear_all().await
    }
}
