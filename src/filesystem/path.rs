// src/filesystem/path.rs

//! Confinement of untrusted relative paths
//!
//! Recipe steps and archive entries name paths inside an assembly directory.
//! Those names come from feeds and archives downloaded off the network, so
//! every one of them goes through [`relative_path`] or [`resolve_within`]
//! before anything touches the filesystem.
//!
//! Unlike a lenient sanitizer, absolute paths are rejected rather than made
//! relative: a recipe that says `/etc/passwd` is corrupt, not sloppy.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Validate an untrusted relative path and return it in normalized form
///
/// Rejects absolute paths, `..` components and empty paths. `.` components
/// are dropped.
///
/// # Examples
///
/// ```
/// use injector::filesystem::path::relative_path;
/// use std::path::PathBuf;
///
/// assert_eq!(relative_path("./bin/tool").unwrap(), PathBuf::from("bin/tool"));
/// assert!(relative_path("/etc/passwd").is_err());
/// assert!(relative_path("lib/../../x").is_err());
/// ```
pub fn relative_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::PathTraversal(path.display().to_string()));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathTraversal(format!(
                    "absolute path not allowed: {}",
                    path.display()
                )));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!(
            "empty path: {:?}",
            path.display().to_string()
        )));
    }

    Ok(normalized)
}

/// Join an untrusted relative path onto `root`, refusing to pass through symlinks
///
/// Every intermediate component that already exists must be a real
/// directory. The final component may be anything (including a symlink,
/// which callers may legitimately rename or remove) or may not exist yet.
pub fn resolve_within(root: &Path, path: impl AsRef<Path>) -> Result<PathBuf> {
    let relative = relative_path(path.as_ref())?;
    let mut current = root.to_path_buf();
    let mut components = relative.components().peekable();

    while let Some(component) = components.next() {
        current.push(component);
        if components.peek().is_none() {
            break;
        }
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(Error::PathTraversal(format!(
                    "{} passes through symlink {}",
                    relative.display(),
                    current.display()
                )));
            }
            Ok(meta) if !meta.is_dir() => {
                return Err(Error::InvalidPath(format!(
                    "{} is not a directory",
                    current.display()
                )));
            }
            Ok(_) => {}
            // Nothing below a missing component can be a symlink yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                current.extend(components);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(current)
}
