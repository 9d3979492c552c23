// Keyvault — Application Entry Point
//
// Parses CLI arguments, installs structured logging (the default filter
// never emits secret values), and dispatches to the command handler.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use keyvault::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // RUST_LOG=keyvault=debug for verbose output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keyvault=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli.command).await {
        eprintln!("Error [{}]: {}", e.code(), e);
        std::process::exit(1);
    }
}
