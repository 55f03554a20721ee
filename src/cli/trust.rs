// src/cli/trust.rs
//! Trust database commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum TrustCommands {
    /// Trust a key fingerprint for a domain
    Add {
        fingerprint: String,

        /// Host (and optional port) whose feeds the key may sign
        domain: String,
    },

    /// Stop trusting a key for a domain
    Remove {
        fingerprint: String,
        domain: String,
    },

    /// List trusted keys
    List,
}
