// Keyvault — Keys Module
//
// Key families, their parameter table, opaque key handles, and the gated
// lifecycle manager that generates, rotates, and deletes key material.

mod lifecycle;
mod model;

pub use lifecycle::KeyLifecycle;
pub use model::{
    validate_alias, Curve, EncryptionScheme, GeneratedKey, KeyFamily, KeyHandle, KeyParams,
    KeyRecord, KeyTag, MacScheme, SignatureScheme,
};
