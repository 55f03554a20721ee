// src/manifest/entry.rs

//! Parsed manifest lines

use crate::error::{Error, Result};
use std::fmt;

/// One line of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEntry {
    Directory {
        path: String,
        /// Only present in legacy manifests
        mtime: Option<i64>,
    },
    File {
        hash: String,
        mtime: i64,
        size: u64,
        name: String,
        executable: bool,
    },
    Symlink {
        hash: String,
        size: u64,
        name: String,
    },
}

impl ManifestEntry {
    /// Parse a single line (without its trailing newline)
    pub fn parse(line: &str) -> Result<Self> {
        let bad = || Error::ParseError(format!("malformed manifest line: {:?}", line));
        let (kind, rest) = line.split_once(' ').ok_or_else(bad)?;

        match kind {
            "D" => {
                if rest.starts_with('/') {
                    return Ok(Self::Directory {
                        path: rest.to_string(),
                        mtime: None,
                    });
                }
                let (mtime, path) = rest.split_once(' ').ok_or_else(bad)?;
                Ok(Self::Directory {
                    path: path.to_string(),
                    mtime: Some(mtime.parse().map_err(|_| bad())?),
                })
            }
            "F" | "X" => {
                let mut parts = rest.splitn(4, ' ');
                let hash = parts.next().ok_or_else(bad)?;
                let mtime = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
                let size = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
                let name = parts.next().ok_or_else(bad)?;
                Ok(Self::File {
                    hash: hash.to_string(),
                    mtime,
                    size,
                    name: name.to_string(),
                    executable: kind == "X",
                })
            }
            "S" => {
                let mut parts = rest.splitn(3, ' ');
                let hash = parts.next().ok_or_else(bad)?;
                let size = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
                let name = parts.next().ok_or_else(bad)?;
                Ok(Self::Symlink {
                    hash: hash.to_string(),
                    size,
                    name: name.to_string(),
                })
            }
            _ => Err(bad()),
        }
    }

    /// Parse a whole manifest
    pub fn parse_all(manifest: &str) -> Result<Vec<Self>> {
        manifest.lines().map(Self::parse).collect()
    }

    /// The entry name (directory path for directories)
    pub fn name(&self) -> &str {
        match self {
            Self::Directory { path, .. } => path,
            Self::File { name, .. } | Self::Symlink { name, .. } => name,
        }
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory { path, mtime: None } => write!(f, "D {}", path),
            Self::Directory {
                path,
                mtime: Some(mtime),
            } => write!(f, "D {} {}", mtime, path),
            Self::File {
                hash,
                mtime,
                size,
                name,
                executable,
            } => {
                let kind = if *executable { 'X' } else { 'F' };
                write!(f, "{} {} {} {} {}", kind, hash, mtime, size, name)
            }
            Self::Symlink { hash, size, name } => write!(f, "S {} {} {}", hash, size, name),
        }
    }
}
