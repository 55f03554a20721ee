// src/archive.rs

//! Archive unpacking into assembly directories
//!
//! Supports tar (plain, gzip, xz, zstd) and zip. Every entry name is confined
//! to the destination with the same rules as recipe paths, so a hostile
//! archive cannot write outside the directory it is unpacked into.

use crate::compression::{self, TarCompression};
use crate::error::{Error, Result};
use crate::filesystem::path::{relative_path, resolve_within};
use crate::filesystem::{set_executable, symlink};
use chrono::NaiveDate;
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Archive container type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Tar(TarCompression),
    Zip,
}

impl ArchiveType {
    /// Parse a declared MIME type
    pub fn from_mime(mime: &str) -> Result<Self> {
        match mime {
            "application/x-tar" => Ok(Self::Tar(TarCompression::Plain)),
            "application/x-compressed-tar" => Ok(Self::Tar(TarCompression::Gzip)),
            "application/x-xz-compressed-tar" => Ok(Self::Tar(TarCompression::Xz)),
            "application/x-zstd-compressed-tar" => Ok(Self::Tar(TarCompression::Zstd)),
            "application/zip" => Ok(Self::Zip),
            other => Err(Error::UnsupportedFormat(format!("archive type {}", other))),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Tar(TarCompression::Plain) => "application/x-tar",
            Self::Tar(TarCompression::Gzip) => "application/x-compressed-tar",
            Self::Tar(TarCompression::Xz) => "application/x-xz-compressed-tar",
            Self::Tar(TarCompression::Zstd) => "application/x-zstd-compressed-tar",
            Self::Zip => "application/zip",
        }
    }

    /// Guess the type from the suffix of a URL or file name
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        if url.ends_with(".tar.gz") || url.ends_with(".tgz") {
            Some(Self::Tar(TarCompression::Gzip))
        } else if url.ends_with(".tar.xz") || url.ends_with(".txz") {
            Some(Self::Tar(TarCompression::Xz))
        } else if url.ends_with(".tar.zst") || url.ends_with(".tar.zstd") {
            Some(Self::Tar(TarCompression::Zstd))
        } else if url.ends_with(".tar") {
            Some(Self::Tar(TarCompression::Plain))
        } else if url.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// Declared MIME type wins, then the URL suffix
    pub fn detect(mime: Option<&str>, url: &str) -> Result<Self> {
        match mime {
            Some(mime) => Self::from_mime(mime),
            None => Self::from_url(url).ok_or_else(|| {
                Error::UnsupportedFormat(format!("cannot guess archive type of {}", url))
            }),
        }
    }
}

/// Where and how to unpack one archive
#[derive(Debug, Clone, Default)]
pub struct UnpackOptions {
    /// Only this sub-directory of the archive becomes the result
    pub extract: Option<String>,
    /// Leading bytes to skip before the archive data starts
    pub start_offset: u64,
}

/// Unpack `archive` into the existing directory `dest`
///
/// Without `extract` the entries land directly in `dest`. With it, the
/// archive is unpacked into a scratch directory next to `dest` and only the
/// named sub-directory's contents are merged into `dest`.
pub fn unpack(archive: &Path, dest: &Path, kind: ArchiveType, options: &UnpackOptions) -> Result<()> {
    debug!(
        "Unpacking {} ({}) into {}",
        archive.display(),
        kind.mime(),
        dest.display()
    );

    let Some(extract) = options.extract.as_deref() else {
        return unpack_all(archive, dest, kind, options.start_offset);
    };

    let scratch_parent = dest.parent().unwrap_or(dest);
    let scratch = tempfile::Builder::new()
        .prefix("unpack-")
        .tempdir_in(scratch_parent)?;
    unpack_all(archive, scratch.path(), kind, options.start_offset)?;

    let selected = resolve_within(scratch.path(), extract)?;
    let meta = fs::symlink_metadata(&selected).map_err(|_| {
        Error::NotFound(format!("{} does not contain {}", archive.display(), extract))
    })?;
    if !meta.is_dir() {
        return Err(Error::InvalidPath(format!(
            "extract target {} is not a directory",
            extract
        )));
    }
    merge_into(&selected, dest)
}

fn unpack_all(archive: &Path, dest: &Path, kind: ArchiveType, start_offset: u64) -> Result<()> {
    let mut file = File::open(archive)?;
    file.seek(SeekFrom::Start(start_offset))?;
    match kind {
        ArchiveType::Tar(format) => unpack_tar(compression::decoder(file, format)?, dest),
        ArchiveType::Zip if start_offset == 0 => unpack_zip(file, dest),
        ArchiveType::Zip => {
            // Zip reads its central directory from the end; give it a clean file
            let mut trimmed = tempfile::tempfile()?;
            io::copy(&mut file, &mut trimmed)?;
            trimmed.seek(SeekFrom::Start(0))?;
            unpack_zip(trimmed, dest)
        }
    }
}

/// Confine an archive entry name, `None` for the archive root itself
fn entry_target(dest: &Path, name: &Path) -> Result<Option<PathBuf>> {
    match relative_path(name) {
        Ok(_) => resolve_within(dest, name).map(Some),
        Err(Error::InvalidPath(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn ensure_parent(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Remove whatever an earlier entry left at `target` so the next write
/// cannot follow it
fn clear_target(target: &Path) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => Err(Error::InvalidPath(format!(
            "cannot replace directory {} with a file",
            target.display()
        ))),
        Ok(_) => Ok(fs::remove_file(target)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Create a fresh regular file, never opening an existing path
fn create_entry_file(target: &Path) -> Result<File> {
    clear_target(target)?;
    Ok(fs::OpenOptions::new().write(true).create_new(true).open(target)?)
}

/// Source of a hard link: must be a regular file already unpacked inside `dest`
fn link_source(dest: &Path, link: &Path) -> Result<PathBuf> {
    let source = resolve_within(dest, link)?;
    let meta = fs::symlink_metadata(&source)
        .map_err(|_| Error::NotFound(format!("hard link target {} is not in the archive", link.display())))?;
    if !meta.file_type().is_file() {
        return Err(Error::PathTraversal(format!(
            "hard link target {} is not a regular file",
            link.display()
        )));
    }
    Ok(source)
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    let mut dir_mtimes = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.into_owned();
        let Some(target) = entry_target(dest, &name)? else {
            continue;
        };
        let header = entry.header();
        let mtime = header.mtime().unwrap_or(0) as i64;
        let mode = header.mode().unwrap_or(0o644);

        match header.entry_type() {
            tar::EntryType::Directory => {
                fs::create_dir_all(&target)?;
                dir_mtimes.push((target, mtime));
            }
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                ensure_parent(&target)?;
                let mut out = create_entry_file(&target)?;
                io::copy(&mut entry, &mut out)?;
                drop(out);
                set_executable(&target, mode & 0o111 != 0)?;
                filetime::set_file_mtime(&target, FileTime::from_unix_time(mtime, 0))?;
            }
            tar::EntryType::Symlink => {
                let link = entry
                    .link_name()?
                    .ok_or_else(|| Error::ParseError(format!("symlink {} has no target", name.display())))?
                    .into_owned();
                ensure_parent(&target)?;
                clear_target(&target)?;
                symlink(&link, &target)?;
            }
            tar::EntryType::Link => {
                let link = entry
                    .link_name()?
                    .ok_or_else(|| Error::ParseError(format!("hard link {} has no target", name.display())))?
                    .into_owned();
                let source = link_source(dest, &link)?;
                ensure_parent(&target)?;
                clear_target(&target)?;
                fs::copy(&source, &target)?;
                let meta = fs::symlink_metadata(&source)?;
                filetime::set_file_mtime(&target, FileTime::from_last_modification_time(&meta))?;
            }
            tar::EntryType::XGlobalHeader | tar::EntryType::XHeader => {}
            other => {
                warn!("Skipping unsupported tar entry {} ({:?})", name.display(), other);
            }
        }
    }

    for (dir, mtime) in dir_mtimes.into_iter().rev() {
        filetime::set_file_mtime(&dir, FileTime::from_unix_time(mtime, 0))?;
    }
    Ok(())
}

fn zip_error(e: zip::result::ZipError) -> Error {
    Error::ParseError(format!("zip archive: {e}"))
}

fn zip_mtime(time: zip::DateTime) -> i64 {
    NaiveDate::from_ymd_opt(time.year() as i32, time.month() as u32, time.day() as u32)
        .and_then(|d| d.and_hms_opt(time.hour() as u32, time.minute() as u32, time.second() as u32))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

fn unpack_zip<R: Read + Seek>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(reader).map_err(zip_error)?;

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(zip_error)?;
        let name = PathBuf::from(file.name());
        let Some(target) = entry_target(dest, &name)? else {
            continue;
        };
        let mode = file.unix_mode().unwrap_or(0o644);
        let mtime = zip_mtime(file.last_modified());

        if file.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        ensure_parent(&target)?;
        if mode & 0o170000 == 0o120000 {
            let mut link = String::new();
            file.read_to_string(&mut link)?;
            clear_target(&target)?;
            symlink(Path::new(&link), &target)?;
            continue;
        }

        let mut out = create_entry_file(&target)?;
        io::copy(&mut file, &mut out)?;
        drop(out);
        set_executable(&target, mode & 0o111 != 0)?;
        filetime::set_file_mtime(&target, FileTime::from_unix_time(mtime, 0))?;
    }
    Ok(())
}

/// Move every child of `src` into `dest`, merging directories
fn merge_into(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let from_is_dir = entry.file_type()?.is_dir();

        match fs::symlink_metadata(&to) {
            Ok(existing) if existing.is_dir() && from_is_dir => merge_into(&from, &to)?,
            Ok(existing) if existing.is_dir() => {
                return Err(Error::InvalidPath(format!(
                    "cannot replace directory {} with a file",
                    to.display()
                )));
            }
            Ok(_) => {
                fs::remove_file(&to)?;
                fs::rename(&from, &to)?;
            }
            Err(_) => fs::rename(&from, &to)?,
        }
    }
    Ok(())
}
