// src/store/verify.rs

//! Three-way verification of stored implementations
//!
//! A stored tree can disagree with itself in three ways: its live contents
//! may not match the digest in its directory name, and its cached
//! `.manifest` may match neither. The report keeps all three so the user can
//! tell a corrupted file from a stale cache.

use crate::error::{Error, Result};
use crate::hash::ManifestDigest;
use crate::manifest::{self, ManifestEntry};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One way a stored tree failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyProblem {
    /// Live contents do not hash to the expected digest
    ContentsMismatch,
    /// The cached manifest does not describe the live contents
    StaleCachedManifest,
    /// The cached manifest hashes to neither the name nor the contents
    CachedManifestMismatch,
}

/// Result of verifying one tree
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub path: PathBuf,
    /// Digest implied by the directory name, or the one supplied
    pub expected: ManifestDigest,
    /// Digest of the live contents
    pub actual: ManifestDigest,
    /// Digest of the cached `.manifest`, if the tree has one
    pub cached: Option<ManifestDigest>,
    /// Unified diff from the cached manifest to the live one when they differ
    pub diff: Option<String>,
    /// Entry names that differ between cached and live manifests
    pub changed_entries: Vec<String>,
}

impl VerifyReport {
    pub fn problems(&self) -> Vec<VerifyProblem> {
        let mut problems = Vec::new();
        if self.actual != self.expected {
            problems.push(VerifyProblem::ContentsMismatch);
        }
        if let Some(cached) = &self.cached {
            if cached != &self.actual {
                problems.push(VerifyProblem::StaleCachedManifest);
            }
            if cached != &self.actual && cached != &self.expected {
                problems.push(VerifyProblem::CachedManifestMismatch);
            }
        }
        problems
    }

    pub fn is_ok(&self) -> bool {
        self.problems().is_empty()
    }

    /// Convert a failed report into a digest mismatch error
    pub fn into_result(self) -> Result<PathBuf> {
        if self.is_ok() {
            return Ok(self.path);
        }
        Err(Error::DigestMismatch {
            expected: self.expected.to_string(),
            actual: self.actual.to_string(),
            detail: Some(self.to_string()),
        })
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "{}: OK", self.path.display());
        }
        writeln!(f, "{}: verification failed", self.path.display())?;
        writeln!(f, "  expected (name):  {}", self.expected)?;
        writeln!(f, "  actual contents:  {}", self.actual)?;
        match &self.cached {
            Some(cached) => writeln!(f, "  cached manifest:  {}", cached)?,
            None => writeln!(f, "  cached manifest:  (none)")?,
        }
        for problem in self.problems() {
            let text = match problem {
                VerifyProblem::ContentsMismatch => "contents do not match the name",
                VerifyProblem::StaleCachedManifest => "cached manifest is out of date",
                VerifyProblem::CachedManifestMismatch => "cached manifest matches neither name nor contents",
            };
            writeln!(f, "  - {}", text)?;
        }
        if !self.changed_entries.is_empty() {
            writeln!(f, "  changed entries: {}", self.changed_entries.join(", "))?;
        }
        if let Some(diff) = &self.diff {
            write!(f, "{}", diff)?;
        }
        Ok(())
    }
}

/// Recompute the manifest of `path` and compare it against its name and cache
///
/// `expected` overrides the digest otherwise parsed from the directory name.
pub fn verify_tree(path: &Path, expected: Option<&ManifestDigest>) -> Result<VerifyReport> {
    let expected = match expected {
        Some(digest) => digest.clone(),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?
            .parse::<ManifestDigest>()?,
    };

    let (live, actual) = manifest::tree_digest(path, expected.algorithm)?;
    let cached_text = manifest::read_cached(path)?;
    let cached = cached_text
        .as_deref()
        .map(|text| manifest::digest_of(text, expected.algorithm));

    let (diff, changed_entries) = match cached_text.as_deref() {
        Some(text) if text != live => (
            Some(diffy::create_patch(text, &live).to_string()),
            changed_entries(text, &live),
        ),
        _ => (None, Vec::new()),
    };

    let report = VerifyReport {
        path: path.to_path_buf(),
        expected,
        actual,
        cached,
        diff,
        changed_entries,
    };
    if report.is_ok() {
        debug!("Verified {}", path.display());
    } else {
        warn!("Verification of {} failed: {:?}", path.display(), report.problems());
    }
    Ok(report)
}

fn changed_entries(cached: &str, live: &str) -> Vec<String> {
    let parse = |text: &str| -> BTreeSet<String> {
        text.lines()
            .filter_map(|line| ManifestEntry::parse(line).ok())
            .map(|entry| entry.to_string())
            .collect()
    };
    let before = parse(cached);
    let after = parse(live);
    let mut names: Vec<String> = before
        .symmetric_difference(&after)
        .filter_map(|line| ManifestEntry::parse(line).ok())
        .map(|entry| entry.name().to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::DigestAlgorithm;
    use crate::store::Store;
    use std::fs;
    use tempfile::TempDir;

    fn stored_entry() -> (TempDir, PathBuf) {
        let root = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        fs::write(src.path().join("lib.so"), b"0123456789").unwrap();
        let (_, digest) = manifest::tree_digest(src.path(), DigestAlgorithm::Sha256New).unwrap();
        let store = Store::new(root.path(), vec![]).unwrap();
        let path = store.add_dir(&digest, src.path()).unwrap();
        (root, path)
    }

    #[test]
    fn test_verify_fresh_entry() {
        let (_root, path) = stored_entry();
        let report = verify_tree(&path, None).unwrap();
        assert!(report.is_ok(), "{}", report);
        assert!(report.cached.is_some());
    }

    #[test]
    fn test_corruption_reports_contents_mismatch() {
        let (_root, path) = stored_entry();
        let mut data = fs::read(path.join("lib.so")).unwrap();
        data[3] ^= 0xff;
        fs::write(path.join("lib.so"), data).unwrap();

        let report = verify_tree(&path, None).unwrap();
        let problems = report.problems();
        assert!(problems.contains(&VerifyProblem::ContentsMismatch));
        assert!(problems.contains(&VerifyProblem::StaleCachedManifest));
        assert!(!problems.contains(&VerifyProblem::CachedManifestMismatch));
        assert_eq!(report.changed_entries, vec!["lib.so".to_string()]);
        assert!(report.diff.is_some());
        assert!(matches!(report.into_result(), Err(Error::DigestMismatch { .. })));
    }

    #[test]
    fn test_missing_cached_manifest_is_fine() {
        let (_root, path) = stored_entry();
        fs::remove_file(path.join(manifest::MANIFEST_FILE)).unwrap();
        let report = verify_tree(&path, None).unwrap();
        assert!(report.is_ok());
        assert!(report.cached.is_none());
    }

    #[test]
    fn test_unnamed_directory_needs_digest() {
        let tmp = TempDir::new().unwrap();
        assert!(verify_tree(tmp.path(), None).is_err());
        let wrong: ManifestDigest = "sha1new=00".parse().unwrap();
        let report = verify_tree(tmp.path(), Some(&wrong)).unwrap();
        assert_eq!(report.problems(), vec![VerifyProblem::ContentsMismatch]);
    }
}
