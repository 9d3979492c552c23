// Keyvault — Biometric Capability
//
// The vault only sees `BiometricCapability`. Platforms usually have two
// presence checks (a biometric sensor and the device passcode);
// `BiometricWithFallback` composes them so that a locked-out or missing
// sensor falls through to the passcode.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Why a presence check did not grant access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    UserCancelled,
    LockedOut,
    Unavailable,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::UserCancelled => "AUTH_CANCELLED",
            DenyReason::LockedOut => "AUTH_LOCKED_OUT",
            DenyReason::Unavailable => "AUTH_UNAVAILABLE",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DenyReason::UserCancelled => "user cancelled authentication",
            DenyReason::LockedOut => "authentication is locked out",
            DenyReason::Unavailable => "no authentication method is available",
        };
        f.write_str(text)
    }
}

/// Outcome of a gateway or presence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Granted,
    Denied(DenyReason),
}

impl AuthDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AuthDecision::Granted)
    }
}

/// Text shown on the system authentication prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptCopy {
    pub title: String,
    pub description: String,
}

impl Default for PromptCopy {
    fn default() -> Self {
        Self {
            title: "Authentication required".to_string(),
            description: "Authenticate to access your keys".to_string(),
        }
    }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// User-presence check as consumed by the gateway. Implementations handle
/// passcode fallback internally.
#[async_trait]
pub trait BiometricCapability: Send + Sync {
    /// Synchronous, I/O-free hardware check.
    fn is_available(&self) -> bool;

    async fn authenticate(&self, prompt: &PromptCopy) -> AuthDecision;
}

/// A single presence mechanism: a fingerprint reader, face sensor, device
/// passcode, console confirmation...
#[async_trait]
pub trait PresenceCheck: Send + Sync {
    fn is_available(&self) -> bool;

    async fn verify(&self, prompt: &PromptCopy) -> AuthDecision;
}

// ─── Fallback composition ────────────────────────────────────────────────────

/// Biometric sensor first; device passcode when the sensor is missing,
/// unavailable, or locked out. A user cancel on the sensor is final.
pub struct BiometricWithFallback<S, P> {
    sensor: S,
    passcode: P,
}

impl<S, P> BiometricWithFallback<S, P>
where
    S: PresenceCheck,
    P: PresenceCheck,
{
    pub fn new(sensor: S, passcode: P) -> Self {
        Self { sensor, passcode }
    }

    async fn fall_back(&self, prompt: &PromptCopy) -> AuthDecision {
        if !self.passcode.is_available() {
            return AuthDecision::Denied(DenyReason::Unavailable);
        }
        self.passcode.verify(prompt).await
    }
}

#[async_trait]
impl<S, P> BiometricCapability for BiometricWithFallback<S, P>
where
    S: PresenceCheck,
    P: PresenceCheck,
{
    fn is_available(&self) -> bool {
        self.sensor.is_available()
    }

    async fn authenticate(&self, prompt: &PromptCopy) -> AuthDecision {
        if !self.sensor.is_available() {
            tracing::debug!("Biometric sensor unavailable, using passcode");
            return self.fall_back(prompt).await;
        }

        match self.sensor.verify(prompt).await {
            AuthDecision::Denied(reason @ (DenyReason::LockedOut | DenyReason::Unavailable)) => {
                tracing::info!(%reason, "Biometric check failed, falling back to passcode");
                self.fall_back(prompt).await
            }
            decision => decision,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedCheck {
        available: bool,
        decision: AuthDecision,
        calls: Arc<AtomicUsize>,
    }

    impl FixedCheck {
        fn new(available: bool, decision: AuthDecision) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    available,
                    decision,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl PresenceCheck for FixedCheck {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn verify(&self, _prompt: &PromptCopy) -> AuthDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.decision
        }
    }

    #[tokio::test]
    async fn test_sensor_success_skips_passcode() {
        let (sensor, sensor_calls) = FixedCheck::new(true, AuthDecision::Granted);
        let (passcode, passcode_calls) =
            FixedCheck::new(true, AuthDecision::Denied(DenyReason::UserCancelled));
        let chain = BiometricWithFallback::new(sensor, passcode);

        assert_eq!(chain.authenticate(&PromptCopy::default()).await, AuthDecision::Granted);
        assert_eq!(sensor_calls.load(Ordering::SeqCst), 1);
        assert_eq!(passcode_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lockout_falls_back_to_passcode() {
        let (sensor, _) = FixedCheck::new(true, AuthDecision::Denied(DenyReason::LockedOut));
        let (passcode, passcode_calls) = FixedCheck::new(true, AuthDecision::Granted);
        let chain = BiometricWithFallback::new(sensor, passcode);

        assert_eq!(chain.authenticate(&PromptCopy::default()).await, AuthDecision::Granted);
        assert_eq!(passcode_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_sensor_uses_passcode() {
        let (sensor, sensor_calls) = FixedCheck::new(false, AuthDecision::Granted);
        let (passcode, _) = FixedCheck::new(true, AuthDecision::Granted);
        let chain = BiometricWithFallback::new(sensor, passcode);

        assert!(!chain.is_available());
        assert!(chain.authenticate(&PromptCopy::default()).await.is_granted());
        assert_eq!(
            sensor_calls.load(Ordering::SeqCst),
            0,
            "An unavailable sensor must not be prompted"
        );
    }

    #[tokio::test]
    async fn test_user_cancel_is_final() {
        let (sensor, _) = FixedCheck::new(true, AuthDecision::Denied(DenyReason::UserCancelled));
        let (passcode, passcode_calls) = FixedCheck::new(true, AuthDecision::Granted);
        let chain = BiometricWithFallback::new(sensor, passcode);

        assert_eq!(
            chain.authenticate(&PromptCopy::default()).await,
            AuthDecision::Denied(DenyReason::UserCancelled)
        );
        assert_eq!(passcode_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_nothing_available_is_unavailable() {
        let (sensor, _) = FixedCheck::new(false, AuthDecision::Granted);
        let (passcode, _) = FixedCheck::new(false, AuthDecision::Granted);
        let chain = BiometricWithFallback::new(sensor, passcode);

        assert_eq!(
            chain.authenticate(&PromptCopy::default()).await,
            AuthDecision::Denied(DenyReason::Unavailable)
        );
    }
}
