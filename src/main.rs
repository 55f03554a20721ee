// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands, StoreCommands, TrustCommands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // One cooperative event loop; blocking transfers go to its blocking pool
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    let config = cli.config.as_deref();
    match cli.command {
        Some(Commands::Select { solve, xml, explain }) => commands::cmd_select(config, &solve, xml, explain),
        Some(Commands::Fetch { solve, xml }) => runtime.block_on(commands::cmd_fetch(config, &solve, xml)),
        Some(Commands::Import {
            url,
            feed,
            signature,
            yes,
        }) => runtime.block_on(commands::cmd_import(config, &url, &feed, signature.as_deref(), yes)),
        Some(Commands::Store(command)) => match command {
            StoreCommands::Add {
                digest,
                source,
                extract,
                mime_type,
            } => commands::cmd_store_add(config, &digest, &source, extract.as_deref(), mime_type.as_deref()),
            StoreCommands::Find { digest } => commands::cmd_store_find(config, &digest),
            StoreCommands::Verify { paths } => commands::cmd_store_verify(config, &paths),
            StoreCommands::List => commands::cmd_store_list(config),
            StoreCommands::Manifest { dir, algorithm } => commands::cmd_store_manifest(&dir, algorithm.as_deref()),
        },
        Some(Commands::Trust(command)) => match command {
            TrustCommands::Add { fingerprint, domain } => commands::cmd_trust_add(config, &fingerprint, &domain),
            TrustCommands::Remove { fingerprint, domain } => commands::cmd_trust_remove(config, &fingerprint, &domain),
            TrustCommands::List => commands::cmd_trust_list(config),
        },
        None => {
            // No command provided, show help
            println!("injector v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'injector --help' for usage information");
            Ok(())
        }
    }
}
