// Keyvault — Authentication Gateway
//
// Decides whether `alias` needs a fresh user-presence proof and obtains it
// at most once process-wide at any instant.
//
// Flow for `authorize(alias)`:
//   1. Look up the alias's timeout in the Policy Cache.
//   2. Never → granted without prompting, last-success untouched.
//   3. Seconds(n) and last success for this alias ≤ n seconds ago → granted.
//   4. Otherwise wait for the single prompt slot, re-check step 3 for this
//      alias only, then prompt. Success records `now` for this alias.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use crate::error::VaultError;

use super::biometric::{AuthDecision, BiometricCapability, PromptCopy};
use super::policy::{AuthTimeout, PolicyCache};

pub struct AuthGateway {
    policies: Arc<PolicyCache>,
    biometrics: Arc<dyn BiometricCapability>,
    last_success: Mutex<HashMap<String, Instant>>,
    /// Held for the whole duration of a prompt.
    slot: tokio::sync::Mutex<()>,
    prompt: RwLock<PromptCopy>,
}

impl AuthGateway {
    pub fn new(policies: Arc<PolicyCache>, biometrics: Arc<dyn BiometricCapability>) -> Self {
        Self {
            policies,
            biometrics,
            last_success: Mutex::new(HashMap::new()),
            slot: tokio::sync::Mutex::new(()),
            prompt: RwLock::new(PromptCopy::default()),
        }
    }

    pub fn with_prompt(self, prompt: PromptCopy) -> Self {
        *self.prompt.write() = prompt;
        self
    }

    pub fn policies(&self) -> &Arc<PolicyCache> {
        &self.policies
    }

    /// Replace the copy shown on subsequent prompts.
    pub fn set_prompt(&self, title: &str, description: &str) {
        *self.prompt.write() = PromptCopy {
            title: title.to_string(),
            description: description.to_string(),
        };
    }

    pub fn prompt(&self) -> PromptCopy {
        self.prompt.read().clone()
    }

    pub fn biometrics_available(&self) -> bool {
        self.biometrics.is_available()
    }

    /// Last successful authentication for `alias` in this process.
    pub fn last_success(&self, alias: &str) -> Option<Instant> {
        self.last_success.lock().get(alias).copied()
    }

    /// Drop every recorded grant, e.g. after all keys were wiped.
    pub fn forget_grants(&self) {
        self.last_success.lock().clear();
    }

    pub async fn authorize(&self, alias: &str) -> Result<AuthDecision, VaultError> {
        let timeout = self.policies.get(alias).await?;
        if self.is_fresh(alias, timeout) {
            tracing::debug!(alias = %alias, ?timeout, "Authorization satisfied by policy");
            return Ok(AuthDecision::Granted);
        }

        let _slot = self.slot.lock().await;

        // A previous slot holder may have authenticated this same alias
        if self.is_fresh(alias, timeout) {
            tracing::debug!(alias = %alias, "Authorization satisfied while waiting for prompt");
            return Ok(AuthDecision::Granted);
        }

        let prompt = self.prompt();
        let decision = self.biometrics.authenticate(&prompt).await;

        match decision {
            AuthDecision::Granted => {
                self.last_success
                    .lock()
                    .insert(alias.to_string(), Instant::now());
                tracing::info!(alias = %alias, "User authenticated");
            }
            AuthDecision::Denied(reason) => {
                tracing::warn!(alias = %alias, %reason, "Authentication denied");
            }
        }

        Ok(decision)
    }

    /// Like `authorize`, but a denial becomes `VaultError::AuthDenied`.
    pub async fn require(&self, alias: &str) -> Result<(), VaultError> {
        match self.authorize(alias).await? {
            AuthDecision::Granted => Ok(()),
            AuthDecision::Denied(reason) => Err(VaultError::AuthDenied(reason)),
        }
    }

    fn is_fresh(&self, alias: &str, timeout: AuthTimeout) -> bool {
        match timeout {
            AuthTimeout::Never => true,
            AuthTimeout::Always => false,
            AuthTimeout::Seconds(window) => self
                .last_success
                .lock()
                .get(alias)
                .map(|at| at.elapsed() <= Duration::from_secs(window))
                .unwrap_or(false),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
