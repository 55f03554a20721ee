// src/trust/mod.rs

//! Feed signatures and key trust
//!
//! - [`TrustDb`]: which key fingerprints are trusted for which domains
//! - [`OpenPgpVerifier`]: detached signature checks against a keyring
//! - [`FeedCache`]: imported feeds on disk, with their declared timestamps
//! - [`FeedImporter`]: the gate every downloaded feed passes before it
//!   reaches the catalog

mod cache;
mod db;
mod import;
mod verify;

pub use cache::{FeedCache, escape, unescape};
pub use db::{TrustDb, domain_from_url, normalize_fingerprint};
pub use import::{FeedImporter, TrustConfirmation, TrustDecision};
pub use verify::{OpenPgpVerifier, SignatureVerifier, ValidSignature};
