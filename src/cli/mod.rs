// src/cli/mod.rs
//! CLI definitions for injector
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `select` - Solve and print the chosen implementations
//! - `fetch` - Solve and download whatever is missing
//! - `import` - Check a signed feed and add it to the cache
//! - `store` - Inspect and maintain the implementation store
//! - `trust` - Manage trusted feed signing keys

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod store;
mod trust;

pub use store::StoreCommands;
pub use trust::TrustCommands;

#[derive(Parser)]
#[command(name = "injector")]
#[command(version)]
#[command(about = "Decentralized software installation with a content-addressed store", long_about = None)]
pub struct Cli {
    /// Configuration file (default: <config dir>/injector/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// What to solve for
#[derive(Args, Debug, Clone)]
pub struct SolveArgs {
    /// Root interface URI
    pub interface: String,

    /// Catalog JSON files merged over the feed cache
    #[arg(long = "catalog", value_name = "FILE")]
    pub catalogs: Vec<PathBuf>,

    /// Command the root implementation must provide
    #[arg(long)]
    pub command: Option<String>,

    /// Version expression for the root, e.g. "1.0..!2.0 | 3"
    #[arg(long = "version", value_name = "EXPR")]
    pub version_expr: Option<String>,

    /// Select source code instead of a binary
    #[arg(long)]
    pub source: bool,

    /// Use only implementations that are already available
    #[arg(long)]
    pub offline: bool,

    /// Prefer available implementations over better uncached ones
    #[arg(long, conflicts_with = "offline")]
    pub minimal: bool,

    /// Solve exactly with the SAT formulation
    #[arg(long)]
    pub exact: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose implementations for an interface and print them
    Select {
        #[command(flatten)]
        solve: SolveArgs,

        /// Print the selections document as XML
        #[arg(long)]
        xml: bool,

        /// Show ranked candidates and rejection reasons
        #[arg(long)]
        explain: bool,
    },

    /// Choose implementations and download any that are missing
    Fetch {
        #[command(flatten)]
        solve: SolveArgs,

        /// Print the selections document as XML
        #[arg(long)]
        xml: bool,
    },

    /// Verify a signed feed and add it to the feed cache
    Import {
        /// URL the feed was downloaded from
        url: String,

        /// Feed document (JSON)
        feed: PathBuf,

        /// Detached OpenPGP signature
        #[arg(long)]
        signature: Option<PathBuf>,

        /// Trust new signing keys without asking
        #[arg(long)]
        yes: bool,
    },

    /// Implementation store
    #[command(subcommand)]
    Store(StoreCommands),

    /// Trusted feed signing keys
    #[command(subcommand)]
    Trust(TrustCommands),
}
