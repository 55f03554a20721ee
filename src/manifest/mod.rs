// src/manifest/mod.rs

//! Canonical manifests of directory trees
//!
//! A manifest lists every entry of a tree, one line each, in a deterministic
//! name-sorted depth-first order. The digest of a tree is the hash of its
//! manifest text, so two trees share a digest exactly when their contents,
//! executable bits, symlink targets and structure agree.
//!
//! Line formats:
//!
//! ```text
//! D /sub/dir                      directory (new algorithms)
//! D <mtime> /sub/dir              directory (legacy sha1)
//! F <hash> <mtime> <size> <name>  regular file
//! X <hash> <mtime> <size> <name>  executable file
//! S <hash> <size> <name>          symlink, hash of the target string
//! ```
//!
//! New algorithms list a directory's files and symlinks first, then descend
//! into its subdirectories. The legacy walk interleaves everything by name.

mod entry;

pub use entry::ManifestEntry;

use crate::error::{Error, Result};
use crate::hash::{self, DigestAlgorithm, ManifestDigest};
use filetime::FileTime;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Name of the cached manifest at the root of a stored implementation
pub const MANIFEST_FILE: &str = ".manifest";

/// Generate the manifest text of the tree at `root`
///
/// Every line, including the last, is terminated by `\n`.
pub fn generate(root: &Path, algorithm: DigestAlgorithm) -> Result<String> {
    let meta = fs::symlink_metadata(root)?;
    if !meta.is_dir() {
        return Err(Error::InvalidPath(format!("not a directory: {}", root.display())));
    }

    let mut out = String::new();
    if algorithm.is_legacy() {
        walk_legacy(root, "", algorithm, &mut out)?;
    } else {
        walk_new(root, "", algorithm, &mut out)?;
    }
    Ok(out)
}

/// Digest of an already generated manifest
pub fn digest_of(manifest: &str, algorithm: DigestAlgorithm) -> ManifestDigest {
    let mut hasher = algorithm.hasher();
    hasher.update(manifest.as_bytes());
    ManifestDigest::from_raw(algorithm, &hasher.finalize())
}

/// Generate the manifest of `root` and return both the text and its digest
pub fn tree_digest(root: &Path, algorithm: DigestAlgorithm) -> Result<(String, ManifestDigest)> {
    let manifest = generate(root, algorithm)?;
    let digest = digest_of(&manifest, algorithm);
    debug!("Manifest of {}: {}", root.display(), digest);
    Ok((manifest, digest))
}

/// Write `manifest` to `<root>/.manifest`
pub fn write_cached(root: &Path, manifest: &str) -> Result<()> {
    let mut file = File::create(root.join(MANIFEST_FILE))?;
    file.write_all(manifest.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Read `<root>/.manifest` if present
pub fn read_cached(root: &Path) -> Result<Option<String>> {
    match fs::read(root.join(MANIFEST_FILE)) {
        Ok(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| Error::ParseError(format!("cached manifest is not UTF-8: {e}"))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn sorted_names(dir: &Path) -> Result<Vec<OsString>> {
    let mut names = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<std::io::Result<Vec<_>>>()?;
    // Byte order of UTF-8 names is code point order
    names.sort_by(|a, b| a.as_encoded_bytes().cmp(b.as_encoded_bytes()));
    Ok(names)
}

fn checked_name(name: &OsString, dir: &Path) -> Result<String> {
    let name = name
        .to_str()
        .ok_or_else(|| Error::InvalidPath(format!("non UTF-8 name in {}", dir.display())))?;
    if name.contains('\n') {
        return Err(Error::InvalidPath(format!(
            "newline in file name {:?} under {}",
            name,
            dir.display()
        )));
    }
    Ok(name.to_string())
}

fn mtime_of(meta: &fs::Metadata) -> i64 {
    FileTime::from_last_modification_time(meta).unix_seconds()
}

fn file_line(path: &Path, meta: &fs::Metadata, name: &str, algorithm: DigestAlgorithm) -> Result<String> {
    let mut file = File::open(path)?;
    let hash = hash::hash_reader(algorithm, &mut file)?;
    let kind = if is_executable(meta) { 'X' } else { 'F' };
    Ok(format!("{} {} {} {} {}\n", kind, hash, mtime_of(meta), meta.len(), name))
}

fn symlink_line(path: &Path, name: &str, algorithm: DigestAlgorithm) -> Result<String> {
    let target = fs::read_link(path)?;
    let target = target.as_os_str().as_encoded_bytes();
    let hash = hash::hash_bytes(algorithm, target);
    Ok(format!("S {} {} {}\n", hash, target.len(), name))
}

fn walk_new(root: &Path, sub: &str, algorithm: DigestAlgorithm, out: &mut String) -> Result<()> {
    let dir = if sub.is_empty() { root.to_path_buf() } else { root.join(&sub[1..]) };
    if !sub.is_empty() {
        out.push_str(&format!("D {}\n", sub));
    }

    let mut subdirs = Vec::new();
    for raw in sorted_names(&dir)? {
        let name = checked_name(&raw, &dir)?;
        if sub.is_empty() && name == MANIFEST_FILE {
            continue;
        }
        let path = dir.join(&raw);
        let meta = fs::symlink_metadata(&path)?;
        let file_type = meta.file_type();
        if file_type.is_file() {
            out.push_str(&file_line(&path, &meta, &name, algorithm)?);
        } else if file_type.is_symlink() {
            out.push_str(&symlink_line(&path, &name, algorithm)?);
        } else if file_type.is_dir() {
            subdirs.push(name);
        } else {
            return Err(unknown_entry(&path));
        }
    }

    for name in subdirs {
        walk_new(root, &format!("{}/{}", sub, name), algorithm, out)?;
    }
    Ok(())
}

fn walk_legacy(root: &Path, sub: &str, algorithm: DigestAlgorithm, out: &mut String) -> Result<()> {
    let dir = if sub.is_empty() { root.to_path_buf() } else { root.join(&sub[1..]) };

    for raw in sorted_names(&dir)? {
        let name = checked_name(&raw, &dir)?;
        if sub.is_empty() && name == MANIFEST_FILE {
            continue;
        }
        let path = dir.join(&raw);
        let meta = fs::symlink_metadata(&path)?;
        let file_type = meta.file_type();
        if file_type.is_dir() {
            let child = format!("{}/{}", sub, name);
            out.push_str(&format!("D {} {}\n", mtime_of(&meta), child));
            walk_legacy(root, &child, algorithm, out)?;
        } else if file_type.is_file() {
            out.push_str(&file_line(&path, &meta, &name, algorithm)?);
        } else if file_type.is_symlink() {
            out.push_str(&symlink_line(&path, &name, algorithm)?);
        } else {
            return Err(unknown_entry(&path));
        }
    }
    Ok(())
}

fn unknown_entry(path: &Path) -> Error {
    Error::UnsupportedFormat(format!(
        "{} is not a file, directory or symlink",
        path.display()
    ))
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}
