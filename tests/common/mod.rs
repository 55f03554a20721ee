// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use injector::hash::{self, DigestAlgorithm, ManifestDigest};
use injector::model::{ArchiveSource, Feed, ImplSource, Implementation, RetrievalMethod, Stability};
use injector::solver::{ArchRanking, Availability};
use injector::{InterfaceCatalog, manifest};
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;

/// Availability keyed by digest string
#[derive(Default)]
pub struct Cached(pub HashSet<String>);

impl Availability for Cached {
    fn is_available(&self, source: &ImplSource) -> bool {
        source.digests().iter().any(|d| self.0.contains(&d.to_string()))
    }
}

/// A placeholder digest derived from an implementation id
pub fn digest(id: &str) -> ManifestDigest {
    ManifestDigest::new(DigestAlgorithm::Sha256, hash::hash_bytes(DigestAlgorithm::Sha256, id.as_bytes())).unwrap()
}

/// A stable implementation with one archive method
pub fn implementation(id: &str, version: &str) -> Implementation {
    let mut imp = Implementation::new(id, version.parse().unwrap());
    imp.upstream_stability = Stability::Stable;
    imp.source = ImplSource::Digests(vec![digest(id)]);
    imp.retrieval_methods = vec![RetrievalMethod::Archive(ArchiveSource::new(format!(
        "http://example.com/{}.tgz",
        id
    )))];
    imp
}

pub fn feed(url: &str, implementations: Vec<Implementation>) -> Feed {
    Feed {
        implementations,
        ..Feed::new(url)
    }
}

pub fn catalog(feeds: Vec<Feed>) -> InterfaceCatalog {
    let mut catalog = InterfaceCatalog::new();
    for feed in feeds {
        catalog.add_feed(feed);
    }
    catalog
}

pub fn linux_x86_64() -> ArchRanking {
    ArchRanking::for_host("Linux", "x86_64")
}

/// A gzipped tarball of `(path, contents, mode)` entries, all with mtime 1000
pub fn tgz(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, contents, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(*mode);
        header.set_mtime(1000);
        header.set_cksum();
        builder.append_data(&mut header, path, *contents).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Digest of the tree an archive unpacks to
pub fn digest_of_archive(path: &Path) -> ManifestDigest {
    let tmp = TempDir::new().unwrap();
    let file = std::fs::File::open(path).unwrap();
    tar::Archive::new(flate2::read::GzDecoder::new(file))
        .unpack(tmp.path())
        .unwrap();
    manifest::tree_digest(tmp.path(), DigestAlgorithm::Sha256New)
        .unwrap()
        .1
}
