// src/filesystem/mod.rs

//! Filesystem helpers shared by the store, archive unpacker and recipes
//!
//! - [`path`]: confinement of untrusted paths inside an assembly directory
//! - [`copy_tree`]: faithful copy of a directory (permissions, symlinks, mtimes)

pub mod path;

use crate::error::{Error, Result};
use filetime::FileTime;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Copy a directory tree, preserving executable bits, symlinks and mtimes
///
/// `dest` must not exist yet or must be an empty directory. Entries other
/// than regular files, directories and symlinks are refused.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;

    // Directory mtimes are fixed up after their contents are written
    let mut dirs = Vec::new();

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError(format!("walking {}: {e}", src.display())))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::InvalidPath(e.to_string()))?;
        let target = dest.join(relative);
        let meta = entry.path().symlink_metadata()?;
        let file_type = meta.file_type();

        if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            symlink(&link, &target)?;
        } else if file_type.is_dir() {
            fs::create_dir(&target)?;
            dirs.push((target, FileTime::from_last_modification_time(&meta)));
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
            filetime::set_file_mtime(&target, FileTime::from_last_modification_time(&meta))?;
        } else {
            return Err(Error::UnsupportedFormat(format!(
                "cannot copy special file {}",
                entry.path().display()
            )));
        }
    }

    for (dir, mtime) in dirs.into_iter().rev() {
        filetime::set_file_mtime(&dir, mtime)?;
    }

    debug!("Copied tree {} -> {}", src.display(), dest.display());
    Ok(())
}

#[cfg(unix)]
pub(crate) fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn symlink(_target: &Path, link: &Path) -> Result<()> {
    Err(Error::UnsupportedFormat(format!(
        "symlinks are not supported on this platform: {}",
        link.display()
    )))
}

/// Set or clear all executable bits of a file
#[cfg(unix)]
pub(crate) fn set_executable(path: &Path, executable: bool) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o755 } else { 0o644 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn set_executable(_path: &Path, _executable: bool) -> Result<()> {
    Ok(())
}
