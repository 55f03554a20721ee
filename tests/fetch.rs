// tests/fetch.rs

//! Fetching implementations over `file://` URLs into a real store.

mod common;

use common::{catalog, digest_of_archive, feed, linux_x86_64, tgz};
use injector::download::{Downloader, NetworkTransport};
use injector::fetch::Fetcher;
use injector::model::{ArchiveSource, Dependency, ImplSource, Implementation, Recipe, RecipeStep, RetrievalMethod, Stability};
use injector::solver::{Requirements, SolverPolicy};
use injector::{Driver, Error, Store};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

const PROG: &str = "http://example.com/prog.xml";
const LIB: &str = "http://example.com/lib.xml";

fn file_url(path: &Path) -> String {
    Url::from_file_path(path).unwrap().to_string()
}

fn fetcher(root: &Path) -> Fetcher {
    let store = Store::new(root.join("store"), vec![]).unwrap();
    let transport = NetworkTransport::new(Duration::from_secs(30)).unwrap();
    Fetcher::new(store, Downloader::new(Arc::new(transport), 2))
}

/// Write `body` next to the test and describe it as an archive implementation
fn archived(dir: &Path, id: &str, body: &[u8]) -> Implementation {
    let path = dir.join(format!("{}.tar.gz", id));
    std::fs::write(&path, body).unwrap();

    let mut imp = Implementation::new(id, "1.0".parse().unwrap());
    imp.upstream_stability = Stability::Stable;
    imp.source = ImplSource::Digests(vec![digest_of_archive(&path)]);
    let mut archive = ArchiveSource::new(file_url(&path));
    archive.size = Some(body.len() as u64);
    imp.retrieval_methods.push(RetrievalMethod::Archive(archive));
    imp
}

#[tokio::test]
async fn test_solve_and_download_over_file_urls() {
    let tmp = TempDir::new().unwrap();
    let mut prog = archived(tmp.path(), "prog", &tgz(&[("bin/prog", b"#!/bin/sh\n", 0o755)]));
    prog.requires.push(Dependency::new(LIB));
    let lib = archived(tmp.path(), "lib", &tgz(&[("lib/libfoo.so", b"ELF", 0o644)]));
    let catalog = catalog(vec![feed(PROG, vec![prog]), feed(LIB, vec![lib])]);

    let fetcher = fetcher(tmp.path());
    let driver = Driver::new(&catalog, &fetcher, SolverPolicy::default()).with_arch(linux_x86_64());
    let selections = driver
        .solve_with_downloads(&Requirements::new(PROG), None)
        .await
        .unwrap();

    assert!(selections.ready);
    for selection in selections.iter() {
        let path = fetcher.store().lookup_any(selection.digests()).unwrap();
        assert!(path.is_dir());
    }
    let prog_dir = fetcher.store().lookup_any(selections.get(PROG).unwrap().digests()).unwrap();
    assert_eq!(std::fs::read(prog_dir.join("bin/prog")).unwrap(), b"#!/bin/sh\n");
    assert_eq!(fetcher.store().list().unwrap().len(), 2);
}

#[tokio::test]
async fn test_tampered_archive_is_not_stored() {
    let tmp = TempDir::new().unwrap();
    let mut imp = archived(tmp.path(), "prog", &tgz(&[("data", b"original", 0o644)]));
    let tampered = tgz(&[("data", b"tampered", 0o644)]);
    std::fs::write(tmp.path().join("prog.tar.gz"), &tampered).unwrap();
    if let RetrievalMethod::Archive(archive) = &mut imp.retrieval_methods[0] {
        archive.size = Some(tampered.len() as u64);
    }

    let fetcher = fetcher(tmp.path());
    let method = fetcher.choose_method(&imp).unwrap().clone();
    let err = fetcher.download_impl(&imp, &method, None).await.unwrap_err();
    assert!(matches!(err, Error::DigestMismatch { .. }), "{}", err);
    assert!(fetcher.store().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_recipe_reshapes_archive() {
    let tmp = TempDir::new().unwrap();
    let upstream = tgz(&[
        ("pkg-1.0/bin/tool", b"tool", 0o755),
        ("pkg-1.0/README", b"read me", 0o644),
    ]);
    let upstream_path = tmp.path().join("pkg-1.0.tar.gz");
    std::fs::write(&upstream_path, &upstream).unwrap();

    let expected_path = tmp.path().join("expected.tar.gz");
    std::fs::write(&expected_path, tgz(&[("pkg/bin/tool", b"tool", 0o755)])).unwrap();

    let mut archive = ArchiveSource::new(file_url(&upstream_path));
    archive.size = Some(upstream.len() as u64);
    let recipe = Recipe {
        steps: vec![
            RecipeStep::Archive(archive),
            RecipeStep::Rename {
                source: "pkg-1.0".into(),
                dest: "pkg".into(),
            },
            RecipeStep::Remove {
                path: "pkg/README".into(),
            },
        ],
    };
    let mut imp = Implementation::new("pkg", "1.0".parse().unwrap());
    imp.source = ImplSource::Digests(vec![digest_of_archive(&expected_path)]);
    imp.retrieval_methods.push(RetrievalMethod::Recipe(recipe));

    let fetcher = fetcher(tmp.path());
    let method = imp.retrieval_methods[0].clone();
    fetcher.download_impl(&imp, &method, None).await.unwrap();

    let stored = fetcher.store().lookup_any(imp.digests()).unwrap();
    assert!(stored.join("pkg/bin/tool").is_file());
    assert!(!stored.join("pkg/README").exists());
    assert!(!stored.join("pkg-1.0").exists());
}

#[tokio::test]
async fn test_recipe_path_traversal_rejected() {
    let tmp = TempDir::new().unwrap();
    let body = tgz(&[("payload", b"x", 0o644)]);
    let path = tmp.path().join("payload.tar.gz");
    std::fs::write(&path, &body).unwrap();

    let recipe = Recipe {
        steps: vec![
            RecipeStep::Archive(ArchiveSource::new(file_url(&path))),
            RecipeStep::Rename {
                source: "payload".into(),
                dest: "../../outside".into(),
            },
        ],
    };
    let mut imp = Implementation::new("evil", "1.0".parse().unwrap());
    imp.source = ImplSource::Digests(vec![common::digest("evil")]);
    imp.retrieval_methods.push(RetrievalMethod::Recipe(recipe));

    let fetcher = fetcher(tmp.path());
    let method = imp.retrieval_methods[0].clone();
    let err = fetcher.download_impl(&imp, &method, None).await.unwrap_err();
    assert!(matches!(err, Error::PathTraversal(_)), "{}", err);
    assert!(fetcher.store().list().unwrap().is_empty());
    assert!(!tmp.path().join("outside").exists());
}
