// src/download/mod.rs

//! Download scheduling
//!
//! Every transfer is admitted against the [`Site`] it talks to, runs on the
//! blocking pool through a [`Transport`], and is raced against an optional
//! abort blocker and a timeout. A redirect ends the current hop, releases its
//! slot, and re-enters admission at the new site, so the target host's own
//! limit applies. Hops are capped to stop redirect loops.
//!
//! This is the only place where work crosses onto other threads.

mod scheduler;
mod site;
mod transport;

pub use scheduler::{DownloadScheduler, SiteLoad, SitePermit};
pub use site::Site;
pub use transport::{NetworkTransport, TransferOutcome, TransferRequest, Transport};

use crate::error::{Error, Result};
use crate::tasks::{self, Blocker};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempPath;
use tracing::{debug, info};
use url::Url;

/// Default maximum number of redirect hops per download
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// A logical download, possibly spanning several redirect hops
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: Url,
    pub dest: PathBuf,
    pub if_modified_since: Option<SystemTime>,
    /// Upper bound on the body size, if known
    pub max_bytes: Option<u64>,
}

impl DownloadRequest {
    pub fn new(url: Url, dest: impl Into<PathBuf>) -> Self {
        Self {
            url,
            dest: dest.into(),
            if_modified_since: None,
            max_bytes: None,
        }
    }
}

/// How a logical download finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Complete { size: u64, final_url: Url },
    NotModified,
}

/// Scheduler plus transport plus limits
#[derive(Clone)]
pub struct Downloader {
    scheduler: DownloadScheduler,
    transport: Arc<dyn Transport>,
    max_redirects: usize,
    timeout: Duration,
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>, max_per_site: usize) -> Self {
        Self {
            scheduler: DownloadScheduler::new(max_per_site),
            transport,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn scheduler(&self) -> &DownloadScheduler {
        &self.scheduler
    }

    /// Run a download to completion, following redirects hop by hop
    ///
    /// Firing `abort` at any point ends the download with [`Error::Aborted`];
    /// the caller must not retry it.
    pub async fn download(&self, request: &DownloadRequest, abort: Option<&Blocker>) -> Result<DownloadOutcome> {
        let mut url = request.url.clone();

        for hop in 0..=self.max_redirects {
            let site = Site::from_url(&url)?;
            let permit = tokio::select! {
                permit = self.scheduler.admit(&site) => permit,
                _ = wait_abort(abort) => return Err(Error::Aborted),
            };
            debug!("Transfer {} admitted at {} (hop {})", url, site, hop);

            let outcome = self.transfer(request, &url, abort).await;
            drop(permit);

            match outcome? {
                TransferOutcome::Complete { size } => {
                    info!("Downloaded {} ({} bytes)", url, size);
                    return Ok(DownloadOutcome::Complete { size, final_url: url });
                }
                TransferOutcome::NotModified => {
                    debug!("{} not modified", url);
                    return Ok(DownloadOutcome::NotModified);
                }
                TransferOutcome::Redirect(next) => {
                    info!("Redirected from {} to {}", url, next);
                    url = next;
                }
            }
        }

        Err(Error::RedirectLoop {
            url: request.url.to_string(),
            hops: self.max_redirects + 1,
        })
    }

    /// One hop, staged in its own temporary file
    ///
    /// The staging file travels with the blocking worker. A worker that
    /// outlives a timeout or abort drops it unseen, so it can never land on
    /// `dest` after a later attempt has.
    async fn transfer(&self, request: &DownloadRequest, url: &Url, abort: Option<&Blocker>) -> Result<TransferOutcome> {
        let staging = staging_path(&request.dest)?;
        let transfer = TransferRequest {
            url: url.clone(),
            dest: staging.to_path_buf(),
            if_modified_since: request.if_modified_since,
            max_bytes: request.max_bytes,
        };
        let transport = self.transport.clone();
        let worker = tokio::task::spawn_blocking(move || (transport.fetch(&transfer), staging));
        let timer = tasks::timeout(self.timeout);

        tokio::select! {
            joined = worker => {
                let (outcome, staging) = joined
                    .map_err(|e| Error::DownloadError(format!("transfer of {} failed: {e}", url)))?;
                let outcome = outcome?;
                if let TransferOutcome::Complete { .. } = outcome {
                    staging.persist(&request.dest).map_err(|e| {
                        Error::IoError(format!("Failed to move download to {}: {e}", request.dest.display()))
                    })?;
                }
                Ok(outcome)
            }
            _ = timer.wait() => Err(Error::Timeout(self.timeout)),
            _ = wait_abort(abort) => Err(Error::Aborted),
        }
    }
}

fn staging_path(dest: &Path) -> Result<TempPath> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let file = tempfile::Builder::new().prefix(".download-").tempfile_in(parent)?;
    Ok(file.into_temp_path())
}

async fn wait_abort(abort: Option<&Blocker>) {
    match abort {
        Some(blocker) => blocker.wait().await,
        None => std::future::pending().await,
    }
}
