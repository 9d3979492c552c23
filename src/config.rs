// Keyvault — Configuration
//
// Resolves where the encrypted store lives and what the authentication
// prompt says. Values come from the environment, falling back to the
// platform data directory and built-in prompt copy.

use std::path::PathBuf;

use crate::auth::PromptCopy;

pub const ENV_DATA_DIR: &str = "KEYVAULT_DATA_DIR";
pub const ENV_PROMPT_TITLE: &str = "KEYVAULT_PROMPT_TITLE";
pub const ENV_PROMPT_DESCRIPTION: &str = "KEYVAULT_PROMPT_DESCRIPTION";

const DEFAULT_STORE_FILE: &str = "keyvault.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    pub data_dir: PathBuf,
    pub store_file: String,
    pub prompt: PromptCopy,
}

impl Default for VaultConfig {
    fn default() -> Self {
        let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            data_dir: base.join("keyvault"),
            store_file: DEFAULT_STORE_FILE.to_string(),
            prompt: PromptCopy::default(),
        }
    }
}

impl VaultConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(title) = get(ENV_PROMPT_TITLE) {
            config.prompt.title = title;
        }
        if let Some(description) = get(ENV_PROMPT_DESCRIPTION) {
            config.prompt.description = description;
        }
        config
    }

    /// Full path of the encrypted store file.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = VaultConfig::from_lookup(|_| None);
        assert!(config.data_dir.ends_with("keyvault"));
        assert_eq!(config.store_file, "keyvault.db");
        assert_eq!(config.prompt, PromptCopy::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = VaultConfig::from_lookup(lookup_from(&[
            (ENV_DATA_DIR, "/tmp/vault-data"),
            (ENV_PROMPT_TITLE, "Unlock wallet"),
            (ENV_PROMPT_DESCRIPTION, "Confirm it's you"),
        ]));

        assert_eq!(config.store_path(), PathBuf::from("/tmp/vault-data/keyvault.db"));
        assert_eq!(config.prompt.title, "Unlock wallet");
        assert_eq!(config.prompt.description, "Confirm it's you");
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = VaultConfig::from_lookup(lookup_from(&[(ENV_PROMPT_TITLE, "   ")]));
        assert_eq!(config.prompt.title, PromptCopy::default().title);
    }
}
