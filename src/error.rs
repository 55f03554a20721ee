// src/error.rs

//! Crate-wide error type
//!
//! Every failure the solver, store, fetcher and scheduler report in-band is a
//! variant of [`Error`]. Callers decide whether to retry, prompt or abort.

use std::io;
use thiserror::Error;

/// Trust failures raised while importing a signed feed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustError {
    #[error("no valid OpenPGP signatures on {url}")]
    NoValidSignatures { url: String },

    #[error("no signing key of {url} is trusted for domain {domain}")]
    NotTrusted { url: String, domain: String },

    #[error("feed {url} is not newer than the cached copy ({new} <= {cached}); possible rollback")]
    Rollback { url: String, new: i64, cached: i64 },

    #[error("feed {url} has no timestamp but the cached copy is dated {cached}; possible rollback")]
    MissingTimestamp { url: String, cached: i64 },

    #[error("import of {url} rejected: keys were not confirmed")]
    Rejected { url: String },
}

/// Errors returned by the library
#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot resolve {interface}: {reason}")]
    ResolutionFailed { interface: String, reason: String },

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        expected: String,
        actual: String,
        detail: Option<String>,
    },

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error("download failed: {0}")]
    DownloadError(String),

    #[error("too many redirects ({hops}) while fetching {url}")]
    RedirectLoop { url: String, hops: usize },

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("aborted by user")]
    Aborted,

    #[error("path escapes its assembly directory: {0}")]
    PathTraversal(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("package installation failed: {0}")]
    PackageInstall(String),
}

impl Error {
    /// Whether a failed primary download may be retried against the mirror
    pub fn allows_mirror_fallback(&self) -> bool {
        !matches!(
            self,
            Error::Trust(_)
                | Error::Aborted
                | Error::DigestMismatch { .. }
                | Error::PathTraversal(_)
                | Error::UnsupportedFormat(_)
        )
    }

    /// Build a digest mismatch without a manifest diagnostic
    pub fn digest_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::DigestMismatch {
            expected: expected.into(),
            actual: actual.into(),
            detail: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
