// src/lib.rs

//! Injector: decentralized software installation
//!
//! Programs are named by interface URIs. Feeds list the implementations of
//! each interface; the solver picks a compatible set, the fetcher downloads
//! and verifies whatever is missing, and the content-addressed store keeps
//! every implementation under the digest of its own tree.
//!
//! # Architecture
//!
//! - [`solver`]: greedy ranking walk with restrictions and machine groups,
//!   plus an exact SAT formulation
//! - [`store`]: `<root>/<algorithm>=<digest>` trees, added atomically and
//!   verified against their manifests
//! - [`fetch`]: archives, recipes, and native packages, with mirror fallback
//! - [`download`]: per-site admission, redirects re-scheduled per site
//! - [`trust`]: OpenPGP-signed feeds and per-domain key trust
//! - [`tasks`]: blockers for cooperative waiting

pub mod archive;
pub mod compression;
pub mod config;
pub mod download;
pub mod driver;
mod error;
pub mod fetch;
pub mod filesystem;
pub mod hash;
pub mod manifest;
pub mod model;
pub mod solver;
pub mod store;
pub mod tasks;
pub mod trust;
pub mod version;

pub use config::{Config, Context};
pub use driver::Driver;
pub use error::{Error, Result, TrustError};
pub use hash::{DigestAlgorithm, ManifestDigest};
pub use model::{Feed, Implementation, InterfaceCatalog};
pub use solver::{Requirements, Selections, Solver};
pub use store::Store;
