// Keyvault — Console presence and provider stand-ins
//
// The command-line build has no biometric sensor and no platform crypto
// provider. User presence falls back to an explicit confirmation on the
// controlling terminal; key operations fail with a provider error.

use std::io::{BufRead, IsTerminal, Write};

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::auth::{AuthDecision, DenyReason, PresenceCheck, PromptCopy};
use crate::crypto::{CryptoProvider, ProviderError};
use crate::keys::{EncryptionScheme, GeneratedKey, KeyHandle, KeyParams, MacScheme, SignatureScheme};

// ─── Presence ────────────────────────────────────────────────────────────────

/// A sensor that is never present.
pub struct NoSensor;

#[async_trait]
impl PresenceCheck for NoSensor {
    fn is_available(&self) -> bool {
        false
    }

    async fn verify(&self, _prompt: &PromptCopy) -> AuthDecision {
        AuthDecision::Denied(DenyReason::Unavailable)
    }
}

/// Asks the user to type `yes` on the terminal.
pub struct ConsoleConfirmation;

impl ConsoleConfirmation {
    fn is_affirmative(answer: &str) -> bool {
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

#[async_trait]
impl PresenceCheck for ConsoleConfirmation {
    fn is_available(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    async fn verify(&self, prompt: &PromptCopy) -> AuthDecision {
        let prompt = prompt.clone();
        let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut stderr = std::io::stderr();
            writeln!(stderr, "{}", prompt.title)?;
            write!(stderr, "{} [y/N]: ", prompt.description)?;
            stderr.flush()?;

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) if Self::is_affirmative(&line) => AuthDecision::Granted,
            Ok(Ok(_)) => AuthDecision::Denied(DenyReason::UserCancelled),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Could not read confirmation from terminal");
                AuthDecision::Denied(DenyReason::Unavailable)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Confirmation task failed");
                AuthDecision::Denied(DenyReason::Unavailable)
            }
        }
    }
}

// ─── Provider ────────────────────────────────────────────────────────────────

/// Placeholder provider for builds without a cryptographic backend.
pub struct NullProvider;

fn detached() -> ProviderError {
    ProviderError::Operation("no cryptographic provider is attached".to_string())
}

#[async_trait]
impl CryptoProvider for NullProvider {
    async fn generate_key_material(&self, _params: &KeyParams) -> Result<GeneratedKey, ProviderError> {
        Err(detached())
    }

    async fn sign(
        &self,
        _private: &KeyHandle,
        _scheme: SignatureScheme,
        _payload: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        Err(detached())
    }

    async fn verify(
        &self,
        _public: &KeyHandle,
        _scheme: SignatureScheme,
        _payload: &[u8],
        _signature: &[u8],
    ) -> bool {
        false
    }

    async fn encrypt_asymmetric(
        &self,
        _public: &KeyHandle,
        _scheme: EncryptionScheme,
        _payload: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        Err(detached())
    }

    async fn decrypt_asymmetric(
        &self,
        _private: &KeyHandle,
        _scheme: EncryptionScheme,
        _payload: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, ProviderError> {
        Err(detached())
    }

    async fn hmac(&self, _secret: &KeyHandle, _scheme: MacScheme, _payload: &[u8]) -> Vec<u8> {
        Vec::new()
    }
}
