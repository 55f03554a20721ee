// src/store/mod.rs

//! Content-addressed implementation store
//!
//! Each stored implementation lives in a directory named after its manifest
//! digest, e.g. `<root>/sha256new_ABC.../`. Entries are assembled in a private
//! staging directory under the writable root, verified, and only then renamed
//! into place, so a digest-named directory always holds exactly the content
//! its name promises.
//!
//! Lookups search the writable root first, then every read-only root in the
//! order they were configured.

mod verify;

pub use verify::{VerifyProblem, VerifyReport, verify_tree};

use crate::archive::{self, ArchiveType, UnpackOptions};
use crate::error::{Error, Result};
use crate::filesystem::copy_tree;
use crate::hash::ManifestDigest;
use crate::manifest;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Prefix of in-flight assembly directories under the writable root
const STAGING_PREFIX: &str = "tmp-";

/// Implementation store over one writable root and any number of read-only roots
#[derive(Debug, Clone)]
pub struct Store {
    writable: PathBuf,
    read_only: Vec<PathBuf>,
}

impl Store {
    /// Open a store, creating the writable root if needed
    pub fn new(writable: impl Into<PathBuf>, read_only: Vec<PathBuf>) -> Result<Self> {
        let writable = writable.into();
        if !writable.exists() {
            fs::create_dir_all(&writable)?;
            debug!("Created store root {}", writable.display());
        }
        Ok(Self { writable, read_only })
    }

    pub fn writable_root(&self) -> &Path {
        &self.writable
    }

    /// All roots in lookup order
    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.writable.as_path()).chain(self.read_only.iter().map(PathBuf::as_path))
    }

    /// Path of a stored implementation, searching roots in order
    pub fn lookup(&self, digest: &ManifestDigest) -> Option<PathBuf> {
        let name = digest.to_string();
        self.roots().map(|root| root.join(&name)).find(|path| path.is_dir())
    }

    /// First stored implementation among several equivalent digests
    pub fn lookup_any<'a>(&self, digests: impl IntoIterator<Item = &'a ManifestDigest>) -> Option<PathBuf> {
        digests.into_iter().find_map(|d| self.lookup(d))
    }

    pub fn contains(&self, digest: &ManifestDigest) -> bool {
        self.lookup(digest).is_some()
    }

    /// A fresh private assembly directory under the writable root
    ///
    /// Dropping the returned directory without passing it to
    /// [`Store::add_staged`] discards it.
    pub fn staging(&self) -> Result<TempDir> {
        Ok(tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.writable)?)
    }

    /// Add a copy of an existing directory tree
    pub fn add_dir(&self, required: &ManifestDigest, source: &Path) -> Result<PathBuf> {
        if let Some(existing) = self.lookup(required) {
            debug!("{} already stored at {}", required, existing.display());
            return Ok(existing);
        }
        let staging = self.staging()?;
        let tree = staging.path().join("tree");
        copy_tree(source, &tree)?;
        self.add_staged_at(required, staging, &tree)
    }

    /// Unpack an archive and add the result
    pub fn add_archive(
        &self,
        required: &ManifestDigest,
        archive_path: &Path,
        kind: ArchiveType,
        options: &UnpackOptions,
    ) -> Result<PathBuf> {
        if let Some(existing) = self.lookup(required) {
            debug!("{} already stored at {}", required, existing.display());
            return Ok(existing);
        }
        let staging = self.staging()?;
        archive::unpack(archive_path, staging.path(), kind, options)?;
        self.add_staged(required, staging)
    }

    /// Verify an assembled staging directory and move it into place
    ///
    /// On a digest mismatch the staging directory is deleted and the error
    /// carries the generated manifest. If the digest is already stored the
    /// call succeeds without touching the existing entry.
    pub fn add_staged(&self, required: &ManifestDigest, staging: TempDir) -> Result<PathBuf> {
        let tree = staging.path().to_path_buf();
        self.add_staged_at(required, staging, &tree)
    }

    fn add_staged_at(&self, required: &ManifestDigest, staging: TempDir, tree: &Path) -> Result<PathBuf> {
        let target = self.writable.join(required.to_string());
        if target.is_dir() {
            debug!("{} already stored; discarding staged copy", required);
            return Ok(target);
        }

        let (manifest_text, actual) = manifest::tree_digest(tree, required.algorithm)?;
        if &actual != required {
            warn!("Digest mismatch: expected {}, got {}", required, actual);
            return Err(Error::DigestMismatch {
                expected: required.to_string(),
                actual: actual.to_string(),
                detail: Some(manifest_text),
            });
        }
        manifest::write_cached(tree, &manifest_text)?;

        let staged_dir = staging.keep();
        let result = fs::rename(tree, &target);
        if staged_dir.exists() {
            let _ = fs::remove_dir_all(&staged_dir);
        }
        match result {
            Ok(()) => {}
            // Someone else stored the same digest first
            Err(_) if target.is_dir() => {
                debug!("{} appeared concurrently; keeping existing entry", required);
            }
            Err(e) => return Err(e.into()),
        }

        info!("Added {} to store", required);
        Ok(target)
    }

    /// Every stored implementation, writable root first
    pub fn list(&self) -> Result<Vec<(ManifestDigest, PathBuf)>> {
        let mut found = Vec::new();
        for root in self.roots() {
            let entries = match fs::read_dir(root) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let mut here = Vec::new();
            for entry in entries {
                let entry = entry?;
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if name.starts_with(STAGING_PREFIX) || !entry.file_type()?.is_dir() {
                    continue;
                }
                if let Ok(digest) = name.parse::<ManifestDigest>() {
                    here.push((digest, entry.path()));
                }
            }
            here.sort();
            found.extend(here);
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::DigestAlgorithm;

    fn sample_source() -> TempDir {
        let src = TempDir::new().unwrap();
        fs::create_dir(src.path().join("bin")).unwrap();
        fs::write(src.path().join("bin/tool"), b"tool").unwrap();
        fs::write(src.path().join("README"), b"hi").unwrap();
        src
    }

    #[test]
    fn test_add_dir_and_lookup() {
        let root = TempDir::new().unwrap();
        let store = Store::new(root.path().join("impls"), vec![]).unwrap();
        let src = sample_source();
        let (_, digest) = manifest::tree_digest(src.path(), DigestAlgorithm::Sha256New).unwrap();

        let path = store.add_dir(&digest, src.path()).unwrap();
        assert_eq!(path, store.writable_root().join(digest.to_string()));
        assert_eq!(store.lookup(&digest), Some(path.clone()));
        assert!(path.join(manifest::MANIFEST_FILE).exists());
        assert_eq!(fs::read(path.join("bin/tool")).unwrap(), b"tool");

        // Nothing left behind in staging
        let names: Vec<_> = fs::read_dir(store.writable_root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![digest.to_string()]);
    }

    #[test]
    fn test_add_is_idempotent() {
        let root = TempDir::new().unwrap();
        let store = Store::new(root.path(), vec![]).unwrap();
        let src = sample_source();
        let (_, digest) = manifest::tree_digest(src.path(), DigestAlgorithm::Sha1New).unwrap();

        let first = store.add_dir(&digest, src.path()).unwrap();
        let staging = store.staging().unwrap();
        copy_tree(src.path(), staging.path()).unwrap();
        let second = store.add_staged(&digest, staging).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_mismatch_leaves_no_trace() {
        let root = TempDir::new().unwrap();
        let store = Store::new(root.path(), vec![]).unwrap();
        let src = sample_source();
        let wrong: ManifestDigest = "sha256=0000".parse().unwrap();

        let err = store.add_dir(&wrong, src.path()).unwrap_err();
        match err {
            Error::DigestMismatch { expected, detail, .. } => {
                assert_eq!(expected, "sha256=0000");
                assert!(detail.unwrap().contains("F "));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.lookup(&wrong).is_none());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_read_only_roots_searched_after_writable() {
        let writable = TempDir::new().unwrap();
        let shared = TempDir::new().unwrap();
        let src = sample_source();
        let (_, digest) = manifest::tree_digest(src.path(), DigestAlgorithm::Sha256).unwrap();

        let shared_store = Store::new(shared.path(), vec![]).unwrap();
        let shared_path = shared_store.add_dir(&digest, src.path()).unwrap();

        let store = Store::new(writable.path(), vec![shared.path().to_path_buf()]).unwrap();
        assert_eq!(store.lookup(&digest), Some(shared_path));
        let other: ManifestDigest = "sha1new=abcd".parse().unwrap();
        assert!(store.lookup_any([&other, &digest]).is_some());
        assert!(!store.contains(&other));
    }
}
