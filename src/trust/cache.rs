// src/trust/cache.rs

//! On-disk cache of imported feeds
//!
//! Each feed lives in one file named by its escaped URL, with its signature
//! next to it as `<name>.sig`. Rollback checks read the declared
//! modification time back out of the cached feed; the file's mtime is only
//! stamped with it for tools that list the directory.

use crate::error::{Error, Result};
use crate::model::Feed;
use filetime::FileTime;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SIGNATURE_SUFFIX: &str = ".sig";

/// Escape a URL into a single file name
///
/// Alphanumerics, `-`, `_`, and `.` are kept; every other byte becomes
/// `%xx`. A leading `.` is escaped too so no entry is hidden.
pub fn escape(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    for (i, byte) in url.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') || (byte == b'.' && i > 0);
        if keep {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02x}", byte));
        }
    }
    escaped
}

/// Inverse of [`escape`]
pub fn unescape(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Directory of cached feeds
#[derive(Debug, Clone)]
pub struct FeedCache {
    dir: PathBuf,
}

impl FeedCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(escape(url))
    }

    /// Store a feed's bytes and signature, stamping the declared time
    pub fn store(&self, url: &str, data: &[u8], signature: Option<&[u8]>, last_modified: Option<i64>) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(url);
        write_atomically(&path, data)?;

        let sig_path = signature_path(&path);
        match signature {
            Some(sig) => write_atomically(&sig_path, sig)?,
            None if sig_path.exists() => fs::remove_file(&sig_path)?,
            None => {}
        }

        if let Some(time) = last_modified {
            filetime::set_file_mtime(&path, FileTime::from_unix_time(time, 0))?;
        }
        debug!("Cached feed {} at {}", url, path.display());
        Ok(())
    }

    /// Declared modification time of the cached copy
    ///
    /// `None` when nothing is cached or the cached feed carries no time. The
    /// filesystem mtime is never consulted: an undated feed keeps whatever
    /// time the write gave it.
    pub fn last_modified(&self, url: &str) -> Result<Option<i64>> {
        Ok(self.load_feed(url)?.and_then(|feed| feed.last_modified))
    }

    /// Raw bytes of the cached copy, if any
    pub fn load_bytes(&self, url: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(url)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn load_feed(&self, url: &str) -> Result<Option<Feed>> {
        let path = self.path_for(url);
        if !path.exists() {
            return Ok(None);
        }
        parse_feed(&path).map(Some)
    }

    /// Every cached feed; unparsable entries are skipped
    pub fn load_all(&self) -> Result<Vec<Feed>> {
        let mut feeds = Vec::new();
        if !self.dir.exists() {
            return Ok(feeds);
        }
        let mut names: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.ends_with(SIGNATURE_SUFFIX) && unescape(n).is_some())
            })
            .collect();
        names.sort();

        for path in names {
            match parse_feed(&path) {
                Ok(feed) => feeds.push(feed),
                Err(e) => warn!("Ignoring cached feed {}: {}", path.display(), e),
            }
        }
        Ok(feeds)
    }
}

fn signature_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(SIGNATURE_SUFFIX);
    PathBuf::from(name)
}

fn parse_feed(path: &Path) -> Result<Feed> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| Error::ParseError(format!("{}: {}", path.display(), e)))
}

fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.persist(path)
        .map_err(|e| Error::IoError(format!("Failed to write {}: {}", path.display(), e)))?;
    Ok(())
}
