// Keyvault — Authentication Module
//
// The Authentication Gateway decides whether an alias needs a fresh
// user-presence proof, using the per-alias timeout policy held by the
// Policy Cache, and runs at most one prompt at a time process-wide.

mod biometric;
mod gateway;
mod policy;

pub use biometric::{
    AuthDecision, BiometricCapability, BiometricWithFallback, DenyReason, PresenceCheck,
    PromptCopy,
};
pub use gateway::AuthGateway;
pub use policy::{AuthTimeout, PolicyCache, DEFAULT_AUTH_TIMEOUT, POLICY_ACCOUNT};
