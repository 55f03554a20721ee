// src/cli/store.rs
//! Implementation store commands

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum StoreCommands {
    /// Add a directory or archive under its digest
    Add {
        /// Expected digest, e.g. sha256new_...
        digest: String,

        /// Directory or archive to add
        source: PathBuf,

        /// Only add this sub-directory of the archive
        #[arg(long)]
        extract: Option<String>,

        /// Archive MIME type (guessed from the file name by default)
        #[arg(long = "type")]
        mime_type: Option<String>,
    },

    /// Print the path of a stored implementation
    Find {
        digest: String,
    },

    /// Check stored trees against their digests
    ///
    /// With no arguments every entry of every store root is checked.
    Verify {
        /// Store entries or digests
        paths: Vec<String>,
    },

    /// List stored implementations
    List,

    /// Print the manifest of a directory and its digest
    Manifest {
        dir: PathBuf,

        /// sha1, sha1new, sha256, or sha256new
        #[arg(long)]
        algorithm: Option<String>,
    },
}
