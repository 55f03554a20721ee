// src/download/transport.rs

//! Blocking transfer backends
//!
//! A [`Transport`] performs exactly one request and never follows redirects
//! itself; the downloader re-schedules each hop against its own site. Calls
//! are blocking and run on Tokio's blocking pool.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{IF_MODIFIED_SINCE, LOCATION};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;
use url::Url;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// One request for one URL
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: Url,
    /// Where the body is written on success
    pub dest: PathBuf,
    /// Send a conditional request against a cached copy of this age
    pub if_modified_since: Option<SystemTime>,
    /// Fail once the body grows past this many bytes
    pub max_bytes: Option<u64>,
}

/// How a single request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The body was written to `dest`
    Complete { size: u64 },
    /// Conditional request confirmed the cached copy
    NotModified,
    /// The server pointed elsewhere; nothing was written
    Redirect(Url),
}

/// A blocking transfer backend
pub trait Transport: Send + Sync {
    fn fetch(&self, request: &TransferRequest) -> Result<TransferOutcome>;
}

/// HTTP(S) via reqwest, plus `file://` URLs
pub struct NetworkTransport {
    client: Client,
}

impl NetworkTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("injector/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn fetch_http(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        let mut builder = self.client.get(request.url.clone());
        if let Some(since) = request.if_modified_since {
            builder = builder.header(IF_MODIFIED_SINCE, http_date(since));
        }
        let response = builder
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to fetch {}: {}", request.url, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(TransferOutcome::NotModified);
        }
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    Error::DownloadError(format!("HTTP {} from {} without Location", status, request.url))
                })?;
            let next = request.url.join(location).map_err(|e| {
                Error::DownloadError(format!("bad redirect target {:?} from {}: {e}", location, request.url))
            })?;
            return Ok(TransferOutcome::Redirect(next));
        }
        if !status.is_success() {
            return Err(Error::DownloadError(format!("HTTP {} from {}", status, request.url)));
        }

        let size = write_atomically(&request.dest, response, request.max_bytes, &request.url)?;
        Ok(TransferOutcome::Complete { size })
    }

    fn fetch_file(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        let path = request
            .url
            .to_file_path()
            .map_err(|_| Error::DownloadError(format!("not a local path: {}", request.url)))?;
        if let (Some(since), Ok(meta)) = (request.if_modified_since, fs::metadata(&path))
            && let Ok(modified) = meta.modified()
            && modified <= since
        {
            return Ok(TransferOutcome::NotModified);
        }
        let source = File::open(&path)
            .map_err(|e| Error::DownloadError(format!("Failed to open {}: {e}", path.display())))?;
        let size = write_atomically(&request.dest, source, request.max_bytes, &request.url)?;
        Ok(TransferOutcome::Complete { size })
    }
}

impl Transport for NetworkTransport {
    fn fetch(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        debug!("Fetching {}", request.url);
        match request.url.scheme() {
            "http" | "https" => self.fetch_http(request),
            "file" => self.fetch_file(request),
            other => Err(Error::DownloadError(format!(
                "unsupported URL scheme {:?}: {}",
                other, request.url
            ))),
        }
    }
}

fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Stream `body` into a fresh temporary file beside `dest` and rename it over `dest`
///
/// Every call gets its own temporary file, so two transfers aimed at the
/// same destination never write into each other.
fn write_atomically(dest: &Path, mut body: impl Read, max_bytes: Option<u64>, url: &Url) -> Result<u64> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut file = tempfile::Builder::new()
        .prefix(".part-")
        .tempfile_in(parent)
        .map_err(|e| Error::IoError(format!("Failed to create file in {}: {e}", parent.display())))?;

    let mut written: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];
    loop {
        let n = body
            .read(&mut buffer)
            .map_err(|e| Error::DownloadError(format!("Failed to read response from {url}: {e}")))?;
        if n == 0 {
            break;
        }
        written += n as u64;
        if let Some(limit) = max_bytes
            && written > limit
        {
            return Err(Error::DownloadError(format!(
                "{} is larger than the expected {} bytes",
                url, limit
            )));
        }
        file.write_all(&buffer[..n])
            .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;
    }
    file.as_file().sync_all()?;

    file.persist(dest)
        .map_err(|e| Error::IoError(format!("Failed to move download to {}: {e}", dest.display())))?;
    Ok(written)
}
