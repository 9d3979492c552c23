// Keyvault — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, reset, policy, secret, exists, clear, biometrics.

mod commands;
mod console;

use clap::{Parser, Subcommand};

pub use commands::{execute, init_store, open_vault, reset_store};
pub use console::{ConsoleConfirmation, NoSensor, NullProvider};

/// Keyvault: biometric-gated secrets and keys on the local machine.
#[derive(Parser, Debug)]
#[command(name = "keyvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the master secret and the encrypted store.
    Init,

    /// Delete the master secret and the store file. Everything stored is
    /// lost; run `init` again afterwards.
    Reset {
        /// Confirm the reset. Without it nothing is deleted.
        #[arg(long)]
        yes: bool,
    },

    /// Inspect or change an alias's re-authentication policy.
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Store or read a secret blob.
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },

    /// Check whether any key material exists for an alias.
    Exists {
        alias: String,
    },

    /// Delete every key, secret, and policy in the store.
    Clear {
        /// Confirm the wipe. Without it nothing is deleted.
        #[arg(long)]
        yes: bool,
    },

    /// Report which presence checks are available.
    Biometrics,
}

#[derive(Subcommand, Debug)]
pub enum PolicyAction {
    /// Set how often `alias` requires a fresh authentication.
    Set {
        alias: String,

        /// Require authentication at all.
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        auth_required: bool,

        /// Seconds a successful authentication stays valid; 0 prompts on
        /// every use.
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        timeout: i32,
    },

    /// Show the policy in effect for `alias`.
    Get {
        alias: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SecretAction {
    /// Store a secret under an account name.
    Put {
        account: String,

        /// The secret value. Prefer setting it interactively to keep it out
        /// of shell history.
        #[arg(long)]
        value: String,
    },

    /// Print the secret stored under an account name.
    Get {
        account: String,
    },
}
