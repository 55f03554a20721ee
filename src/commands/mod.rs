// src/commands/mod.rs
//! Command handlers for the injector CLI

mod fetch;
mod import;
mod select;
mod store;
mod trust;

pub use fetch::cmd_fetch;
pub use import::cmd_import;
pub use select::cmd_select;
pub use store::{cmd_store_add, cmd_store_find, cmd_store_list, cmd_store_manifest, cmd_store_verify};
pub use trust::{cmd_trust_add, cmd_trust_list, cmd_trust_remove};

use crate::cli::SolveArgs;
use anyhow::{Context as _, Result};
use injector::model::{ImplSource, InterfaceCatalog};
use injector::solver::{NetworkPolicy, Requirements, Selections, SolverPolicy};
use injector::version::Restriction;
use injector::{Config, Context, Store};
use std::path::Path;

/// Load the configuration and build the run context
pub fn open_context(config_path: Option<&Path>) -> Result<Context> {
    let config = match config_path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    Ok(Context::new(config)?)
}

/// Merge `--catalog` files into the context's catalog
fn load_catalogs(context: &mut Context, paths: &[impl AsRef<Path>]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        let catalog = InterfaceCatalog::load(path).with_context(|| format!("loading catalog {}", path.display()))?;
        context.catalog.merge(catalog);
    }
    Ok(())
}

fn requirements(args: &SolveArgs) -> Result<Requirements> {
    let mut requirements = Requirements::new(&args.interface);
    requirements.command = args.command.clone();
    requirements.source = args.source;
    if let Some(expr) = &args.version_expr {
        requirements
            .restrictions
            .push(Restriction::expression(expr).with_context(|| format!("invalid version expression {:?}", expr))?);
    }
    Ok(requirements)
}

fn solver_policy(context: &Context, args: &SolveArgs) -> SolverPolicy {
    let mut policy = context.config.solver_policy();
    if args.offline {
        policy.network_use = NetworkPolicy::Offline;
    } else if args.minimal {
        policy.network_use = NetworkPolicy::Minimal;
    }
    policy
}

/// Human-readable listing of a selections set
fn print_selections(selections: &Selections, store: &Store) {
    println!("{}", selections.interface);
    if let Some(command) = &selections.command {
        println!("  command: {}", command);
    }
    for (uri, selection) in &selections.selections {
        match selection {
            Some(s) => {
                let location = match &s.source {
                    ImplSource::LocalPath(path) => path.display().to_string(),
                    ImplSource::Package { package_id, .. } => format!("(package {})", package_id),
                    ImplSource::Digests(digests) => match store.lookup_any(digests) {
                        Some(path) => path.display().to_string(),
                        None => "(not downloaded)".to_string(),
                    },
                };
                println!("  {}: {} ({}) {}", uri, s.version, s.id, location);
            }
            None => println!("  {}: (none)", uri),
        }
    }
    for note in &selections.notes {
        println!("note: {}", note);
    }
    if !selections.ready {
        println!("\nSome required interfaces could not be satisfied.");
    }
}
