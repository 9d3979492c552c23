// Keyvault — Key data models
//
// SECURITY: `KeyHandle` material is zeroized on drop and never appears in
// Debug output. Only public handles are ever returned to callers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::auth::POLICY_ACCOUNT;
use crate::error::VaultError;

// ─── Families ────────────────────────────────────────────────────────────────

/// Algorithm family of a logical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyFamily {
    Rsa,
    Ec,
    Aes,
    Hmac,
}

impl KeyFamily {
    pub const ALL: [KeyFamily; 4] = [KeyFamily::Rsa, KeyFamily::Ec, KeyFamily::Aes, KeyFamily::Hmac];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyFamily::Rsa => "RSA",
            KeyFamily::Ec => "EC",
            KeyFamily::Aes => "AES",
            KeyFamily::Hmac => "HMAC",
        }
    }

    /// Whether this family stores a private/public pair (as opposed to a
    /// single secret).
    pub fn is_pair(&self) -> bool {
        !matches!(self, KeyFamily::Hmac)
    }

    /// Canonical generation and usage parameters for this family.
    ///
    /// AES keys are P-256 agreement keys used for ECIES hybrid encryption,
    /// never raw block-cipher keys. EC signatures default to ECDSA/SHA-1 to
    /// stay verifiable by consumers of previously issued signatures.
    pub fn params(&self) -> KeyParams {
        match self {
            KeyFamily::Rsa => KeyParams {
                family: *self,
                key_bits: 2048,
                curve: None,
                signature: Some(SignatureScheme::RsaPkcs1v15Sha256),
                encryption: None,
                mac: None,
            },
            KeyFamily::Ec => KeyParams {
                family: *self,
                key_bits: 256,
                curve: Some(Curve::P256),
                signature: Some(SignatureScheme::EcdsaSha1),
                encryption: None,
                mac: None,
            },
            KeyFamily::Aes => KeyParams {
                family: *self,
                key_bits: 256,
                curve: Some(Curve::P256),
                signature: None,
                encryption: Some(EncryptionScheme::EciesCofactorX963Sha256AesGcm),
                mac: None,
            },
            KeyFamily::Hmac => KeyParams {
                family: *self,
                key_bits: 256,
                curve: None,
                signature: None,
                encryption: None,
                mac: Some(MacScheme::HmacSha256),
            },
        }
    }
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyFamily {
    type Err = VaultError;

    /// Accepts the family names callers have historically used, including
    /// `ECR1` for P-256 signing keys.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RSA" => Ok(KeyFamily::Rsa),
            "EC" | "ECR1" => Ok(KeyFamily::Ec),
            "AES" => Ok(KeyFamily::Aes),
            "HMAC" => Ok(KeyFamily::Hmac),
            other => Err(VaultError::InvalidAlgorithm(format!(
                "unknown key family '{}'",
                other
            ))),
        }
    }
}

// ─── Parameter table ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    RsaPkcs1v15Sha256,
    /// Legacy: kept so existing EC signatures still verify.
    EcdsaSha1,
    EcdsaSha256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionScheme {
    EciesCofactorX963Sha256AesGcm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacScheme {
    HmacSha256,
}

/// Everything a provider needs to mint material for one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyParams {
    pub family: KeyFamily,
    pub key_bits: u32,
    pub curve: Option<Curve>,
    pub signature: Option<SignatureScheme>,
    pub encryption: Option<EncryptionScheme>,
    pub mac: Option<MacScheme>,
}

// ─── Handles ─────────────────────────────────────────────────────────────────

/// Opaque provider-issued key material, tagged with its family.
#[derive(Clone)]
pub struct KeyHandle {
    family: KeyFamily,
    material: Zeroizing<Vec<u8>>,
}

impl KeyHandle {
    pub fn new(family: KeyFamily, material: Vec<u8>) -> Self {
        Self {
            family,
            material: Zeroizing::new(material),
        }
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    /// Raw handle bytes. Only stores and providers should need these.
    pub fn as_bytes(&self) -> &[u8] {
        &self.material
    }
}

/// Custom Debug implementation that NEVER reveals the material.
impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("family", &self.family)
            .field("material", &"[REDACTED]")
            .field("len", &self.material.len())
            .finish()
    }
}

/// Output of `CryptoProvider::generate_key_material`. `public` is `None` for
/// single-secret families.
#[derive(Debug)]
pub struct GeneratedKey {
    pub private: KeyHandle,
    pub public: Option<KeyHandle>,
}

// ─── Storage tags ────────────────────────────────────────────────────────────

/// The storage tags a single alias can occupy in the blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTag {
    Private,
    Public,
    Secret,
}

impl KeyTag {
    pub const ALL: [KeyTag; 3] = [KeyTag::Private, KeyTag::Public, KeyTag::Secret];

    pub fn suffix(&self) -> &'static str {
        match self {
            KeyTag::Private => "private",
            KeyTag::Public => "public",
            KeyTag::Secret => "secret",
        }
    }

    pub fn for_alias(&self, alias: &str) -> String {
        format!("{}.{}", alias, self.suffix())
    }
}

/// Metadata describing a generated key. Carries public material only.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub alias: String,
    pub family: KeyFamily,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub public_key: Option<KeyHandle>,
}

/// Reject aliases that are empty or collide with reserved store entries.
pub fn validate_alias(alias: &str) -> Result<(), VaultError> {
    if alias.trim().is_empty() {
        return Err(VaultError::InvalidAlias("alias must not be empty".to_string()));
    }
    if alias == POLICY_ACCOUNT {
        return Err(VaultError::InvalidAlias(format!(
            "'{}' is reserved for authentication policies",
            alias
        )));
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
