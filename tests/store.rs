// tests/store.rs

//! Store and manifest behavior through the public API.

mod common;

use filetime::FileTime;
use injector::hash::{DigestAlgorithm, ManifestDigest};
use injector::manifest;
use injector::store::{VerifyProblem, verify_tree};
use injector::{Error, Store};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_tree(root: &Path, files: &[(String, Vec<u8>, i64)]) {
    for (name, contents, mtime) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(*mtime, 0)).unwrap();
    }
}

fn sample() -> TempDir {
    let src = TempDir::new().unwrap();
    write_tree(
        src.path(),
        &[
            ("bin/run".into(), b"#!/bin/sh\necho hi\n".to_vec(), 100),
            ("share/doc/README".into(), b"docs".to_vec(), 200),
        ],
    );
    src
}

#[test]
fn test_every_algorithm_round_trips_through_store() {
    let root = TempDir::new().unwrap();
    let store = Store::new(root.path(), vec![]).unwrap();
    let src = sample();

    for algorithm in DigestAlgorithm::ALL {
        let (_, digest) = manifest::tree_digest(src.path(), algorithm).unwrap();
        let path = store.add_dir(&digest, src.path()).unwrap();
        assert_eq!(store.lookup(&digest), Some(path.clone()));
        let report = verify_tree(&path, None).unwrap();
        assert!(report.is_ok(), "{}: {}", algorithm, report);
    }
    assert_eq!(store.list().unwrap().len(), DigestAlgorithm::ALL.len());
}

#[test]
fn test_second_add_keeps_first_copy() {
    let root = TempDir::new().unwrap();
    let store = Store::new(root.path(), vec![]).unwrap();
    let src = sample();
    let (_, digest) = manifest::tree_digest(src.path(), DigestAlgorithm::Sha256New).unwrap();

    let first = store.add_dir(&digest, src.path()).unwrap();
    fs::write(src.path().join("extra"), b"changed since").unwrap();
    // Already present, so the changed source is never examined
    let second = store.add_dir(&digest, src.path()).unwrap();
    assert_eq!(first, second);
    assert!(!second.join("extra").exists());
}

#[test]
fn test_corrupted_entry_is_reported() {
    let root = TempDir::new().unwrap();
    let store = Store::new(root.path(), vec![]).unwrap();
    let src = sample();
    let (_, digest) = manifest::tree_digest(src.path(), DigestAlgorithm::Sha256New).unwrap();
    let path = store.add_dir(&digest, src.path()).unwrap();

    fs::write(path.join("bin/run"), b"#!/bin/sh\nrm -rf ~\n").unwrap();
    let report = verify_tree(&path, Some(&digest)).unwrap();
    assert!(!report.is_ok());
    assert!(report.problems().contains(&VerifyProblem::ContentsMismatch));
    assert_eq!(report.changed_entries, vec!["run".to_string()]);
}

#[test]
fn test_wrong_digest_is_rejected() {
    let root = TempDir::new().unwrap();
    let store = Store::new(root.path(), vec![]).unwrap();
    let src = sample();
    let (_, real) = manifest::tree_digest(src.path(), DigestAlgorithm::Sha1New).unwrap();
    let claimed = ManifestDigest::new(DigestAlgorithm::Sha1New, "0123456789abcdef0123456789abcdef01234567").unwrap();

    let err = store.add_dir(&claimed, src.path()).unwrap_err();
    match err {
        Error::DigestMismatch { actual, .. } => assert_eq!(actual, real.to_string()),
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.list().unwrap().is_empty());
}

fn file_set() -> impl Strategy<Value = BTreeMap<String, (Vec<u8>, i64)>> {
    prop::collection::btree_map(
        "[a-z]{1,6}(/[a-z]{1,6}){0,2}",
        (prop::collection::vec(any::<u8>(), 0..64), 0i64..2_000_000_000),
        1..8,
    )
}

/// Drop entries whose path is a prefix directory of another entry
fn without_conflicts(files: BTreeMap<String, (Vec<u8>, i64)>) -> Vec<(String, Vec<u8>, i64)> {
    let names: Vec<String> = files.keys().cloned().collect();
    files
        .into_iter()
        .filter(|(name, _)| !names.iter().any(|other| other.starts_with(&format!("{}/", name))))
        .map(|(name, (contents, mtime))| (name, contents, mtime))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_manifest_ignores_creation_order(files in file_set()) {
        let files = without_conflicts(files);
        let forward = TempDir::new().unwrap();
        write_tree(forward.path(), &files);
        let mut reversed_files = files.clone();
        reversed_files.reverse();
        let reversed = TempDir::new().unwrap();
        write_tree(reversed.path(), &reversed_files);

        for algorithm in DigestAlgorithm::ALL.into_iter().filter(|a| !a.is_legacy()) {
            let (a_text, a) = manifest::tree_digest(forward.path(), algorithm).unwrap();
            let (b_text, b) = manifest::tree_digest(reversed.path(), algorithm).unwrap();
            prop_assert_eq!(a_text, b_text);
            prop_assert_eq!(a, b);
        }
    }
}
