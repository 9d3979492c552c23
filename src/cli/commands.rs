// Keyvault — CLI Command Handlers
//
// Each function handles one CLI subcommand. They open the encrypted store
// with the keyring-held master secret and drive the `Vault` facade over it.

use std::sync::Arc;

use crate::auth::{AuthTimeout, BiometricCapability, BiometricWithFallback};
use crate::config::VaultConfig;
use crate::enclave::{derive_store_key, KdfCost, KeyringSecretStore, MasterSecretStore};
use crate::error::VaultError;
use crate::store::SqliteBlobStore;
use crate::vault::Vault;

use super::console::{ConsoleConfirmation, NoSensor, NullProvider};
use super::{Commands, PolicyAction, SecretAction};

/// Execute the parsed CLI command.
pub async fn execute(command: Commands) -> Result<(), VaultError> {
    let config = VaultConfig::from_env();
    let secrets = KeyringSecretStore::new();

    match command {
        Commands::Init => return cmd_init(&config, &secrets),
        Commands::Reset { yes } => return cmd_reset(&config, &secrets, yes),
        _ => {}
    }

    let vault = open_vault(&config, &secrets, KdfCost::default(), console_presence())?;
    match command {
        Commands::Init | Commands::Reset { .. } => Ok(()),
        Commands::Policy { action } => cmd_policy(&vault, action).await,
        Commands::Secret { action } => cmd_secret(&vault, action).await,
        Commands::Exists { alias } => cmd_exists(&vault, &alias).await,
        Commands::Clear { yes } => cmd_clear(&vault, yes).await,
        Commands::Biometrics => cmd_biometrics(&vault),
    }
}

fn console_presence() -> Arc<dyn BiometricCapability> {
    Arc::new(BiometricWithFallback::new(NoSensor, ConsoleConfirmation))
}

// ─── Init ────────────────────────────────────────────────────────────────────

fn cmd_init(config: &VaultConfig, secrets: &dyn MasterSecretStore) -> Result<(), VaultError> {
    init_store(config, secrets, KdfCost::default())?;

    println!("✓ Keyvault initialized");
    println!("  Store: {}", config.store_path().display());
    println!("  Master secret kept in the platform keyring");
    Ok(())
}

/// Create the master secret (if needed), the data directory, and the
/// encrypted store file.
pub fn init_store(
    config: &VaultConfig,
    secrets: &dyn MasterSecretStore,
    cost: KdfCost,
) -> Result<(), VaultError> {
    std::fs::create_dir_all(&config.data_dir)?;

    let master = secrets.load_or_create()?;
    let key = derive_store_key(&master, &secrets.salt_context(), cost)?;
    SqliteBlobStore::open(&config.store_path(), &key)?;

    tracing::info!(path = %config.store_path().display(), "Store initialized");
    Ok(())
}

// ─── Reset ───────────────────────────────────────────────────────────────────

fn cmd_reset(config: &VaultConfig, secrets: &dyn MasterSecretStore, confirmed: bool) -> Result<(), VaultError> {
    if !confirmed {
        println!("Refusing to reset without --yes");
        return Ok(());
    }
    reset_store(config, secrets)?;
    println!("✓ Keyvault reset; run `keyvault init` to start over");
    Ok(())
}

/// Delete the store file and the master secret it was encrypted under.
/// Resetting an uninitialized vault is not an error.
pub fn reset_store(config: &VaultConfig, secrets: &dyn MasterSecretStore) -> Result<(), VaultError> {
    let path = config.store_path();
    match std::fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    secrets.destroy()?;

    tracing::warn!(path = %path.display(), "Store and master secret deleted");
    Ok(())
}

/// Open the initialized store and wrap it in a `Vault` using `presence`
/// for authentication.
pub fn open_vault(
    config: &VaultConfig,
    secrets: &dyn MasterSecretStore,
    cost: KdfCost,
    presence: Arc<dyn BiometricCapability>,
) -> Result<Vault, VaultError> {
    let path = config.store_path();
    if !secrets.exists()? || !path.exists() {
        return Err(VaultError::Other(
            "Keyvault is not initialized. Run `keyvault init` first.".to_string(),
        ));
    }

    let master = secrets.load()?;
    let key = derive_store_key(&master, &secrets.salt_context(), cost)?;
    let store = SqliteBlobStore::open(&path, &key)?;

    Ok(Vault::new(Arc::new(store), Arc::new(NullProvider), presence).with_prompt(config.prompt.clone()))
}

// ─── Policy ──────────────────────────────────────────────────────────────────

async fn cmd_policy(vault: &Vault, action: PolicyAction) -> Result<(), VaultError> {
    match action {
        PolicyAction::Set {
            alias,
            auth_required,
            timeout,
        } => {
            let persisted = vault.set_auth_policy(&alias, auth_required, timeout).await?;
            let policy = AuthTimeout::from_registration(auth_required, timeout);
            if persisted {
                println!("✓ Policy for '{}' set to {}", alias, describe(policy));
            } else {
                println!("Policy for '{}' applies to this session only (could not be saved)", alias);
            }
        }
        PolicyAction::Get { alias } => {
            let policy = vault.policies().get(&alias).await?;
            println!("{}: {}", alias, describe(policy));
        }
    }
    Ok(())
}

fn describe(policy: AuthTimeout) -> String {
    match policy {
        AuthTimeout::Never => "no authentication".to_string(),
        AuthTimeout::Always => "authenticate on every use".to_string(),
        AuthTimeout::Seconds(n) => format!("authenticate every {}s", n),
    }
}

// ─── Secrets ─────────────────────────────────────────────────────────────────

async fn cmd_secret(vault: &Vault, action: SecretAction) -> Result<(), VaultError> {
    match action {
        SecretAction::Put { account, value } => {
            vault.store_secret(&account, value.as_bytes()).await?;
            println!("✓ Secret stored under '{}'", account);
        }
        SecretAction::Get { account } => {
            let secret = vault.retrieve_secret(&account).await?;
            println!("{}", String::from_utf8_lossy(&secret));
        }
    }
    Ok(())
}

// ─── Exists / Clear / Biometrics ─────────────────────────────────────────────

async fn cmd_exists(vault: &Vault, alias: &str) -> Result<(), VaultError> {
    if vault.has_alias(alias).await? {
        println!("'{}' has key material", alias);
    } else {
        println!("No key material for '{}'", alias);
    }
    Ok(())
}

async fn cmd_clear(vault: &Vault, confirmed: bool) -> Result<(), VaultError> {
    if !confirmed {
        println!("Refusing to wipe the store without --yes");
        return Ok(());
    }
    vault.clear_keys().await?;
    println!("✓ All keys, secrets, and policies deleted");
    Ok(())
}

fn cmd_biometrics(vault: &Vault) -> Result<(), VaultError> {
    if vault.has_biometrics_enabled() {
        println!("Biometric sensor: available");
    } else {
        println!("Biometric sensor: not available");
        println!("Terminal confirmation is used instead when a prompt is required");
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
