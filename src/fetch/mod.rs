// src/fetch/mod.rs

//! Acquiring implementations
//!
//! The [`Fetcher`] turns a chosen retrieval method into a verified store
//! entry. Archives are downloaded through the [`Downloader`] and unpacked
//! straight into a staging directory; recipes fetch all of their downloads
//! concurrently and then apply their steps in order (see [`recipe`]);
//! distribution packages are handed to a [`PackageInstaller`].
//!
//! A primary download that fails for an ordinary transport reason is retried
//! exactly once against the configured mirror. If the mirror fails too, the
//! primary error is reported.

pub mod recipe;

use crate::archive::{ArchiveType, UnpackOptions};
use crate::download::{DownloadOutcome, DownloadRequest, Downloader};
use crate::error::{Error, Result};
use crate::hash::ManifestDigest;
use crate::model::{ArchiveSource, Implementation, PackageRef, RetrievalMethod};
use crate::store::Store;
use crate::tasks::Blocker;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Native package manager used for `package` retrieval methods
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Install the package; success means the implementation is now present
    async fn install(&self, package: &PackageRef, implementation: &Implementation) -> Result<()>;
}

/// Downloads, unpacks, and stores implementations
pub struct Fetcher {
    store: Store,
    downloader: Downloader,
    mirror: Option<Url>,
    installer: Option<Arc<dyn PackageInstaller>>,
}

impl Fetcher {
    pub fn new(store: Store, downloader: Downloader) -> Self {
        Self {
            store,
            downloader,
            mirror: None,
            installer: None,
        }
    }

    /// Retry failed downloads once against this mirror
    pub fn with_mirror(mut self, mirror: Url) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn with_installer(mut self, installer: Arc<dyn PackageInstaller>) -> Self {
        self.installer = Some(installer);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    /// The retrieval method to use for an implementation
    ///
    /// Package methods are skipped when no installer is configured.
    pub fn choose_method<'a>(&self, implementation: &'a Implementation) -> Option<&'a RetrievalMethod> {
        implementation
            .retrieval_methods
            .iter()
            .find(|m| !matches!(m, RetrievalMethod::Package(_)) || self.installer.is_some())
    }

    /// Acquire `implementation` using `method`
    ///
    /// For archives and recipes the result is verified against the best
    /// declared digest and added to the store; nothing is added on failure.
    pub async fn download_impl(
        &self,
        implementation: &Implementation,
        method: &RetrievalMethod,
        abort: Option<&Blocker>,
    ) -> Result<()> {
        if let RetrievalMethod::Package(package) = method {
            return self.install_package(package, implementation).await;
        }

        let required = implementation.best_digest().cloned().ok_or_else(|| {
            Error::NotFound(format!(
                "implementation {} of {} declares no manifest digest",
                implementation.id, implementation.feed
            ))
        })?;
        if self.store.contains(&required) {
            debug!("{} is already stored", required);
            return Ok(());
        }

        info!("Fetching {} ({})", implementation.id, required);
        match method {
            RetrievalMethod::Archive(archive) => self.fetch_archive(&required, archive, abort).await,
            RetrievalMethod::Recipe(steps) => recipe::fetch_recipe(self, &required, steps, abort).await,
            RetrievalMethod::Package(_) => Ok(()),
        }
    }

    async fn install_package(&self, package: &PackageRef, implementation: &Implementation) -> Result<()> {
        let installer = self.installer.as_ref().ok_or_else(|| {
            Error::PackageInstall(format!("no package manager available for {}", package.package))
        })?;
        info!("Installing distribution package {}", package.package);
        installer.install(package, implementation).await
    }

    async fn fetch_archive(
        &self,
        required: &ManifestDigest,
        archive: &ArchiveSource,
        abort: Option<&Blocker>,
    ) -> Result<()> {
        let kind = ArchiveType::detect(archive.mime_type.as_deref(), &archive.url)?;
        let downloads = tempfile::Builder::new().prefix("injector-download-").tempdir()?;
        let file = downloads.path().join("archive");
        let expected = archive.size.map(|size| size + archive.start_offset);
        self.fetch_to(&archive.url, &file, expected, abort).await?;

        let options = UnpackOptions {
            extract: archive.extract.clone(),
            start_offset: archive.start_offset,
        };
        self.store.add_archive(required, &file, kind, &options)?;
        Ok(())
    }

    /// Download `url` to `dest`, falling back to the mirror once
    pub(crate) async fn fetch_to(
        &self,
        url: &str,
        dest: &Path,
        expected_size: Option<u64>,
        abort: Option<&Blocker>,
    ) -> Result<u64> {
        let url = Url::parse(url).map_err(|e| Error::DownloadError(format!("invalid URL {:?}: {}", url, e)))?;
        let mut request = DownloadRequest::new(url.clone(), dest);
        request.max_bytes = expected_size;

        let error = match self.download_checked(&request, expected_size, abort).await {
            Ok(size) => return Ok(size),
            Err(e) => e,
        };
        if !error.allows_mirror_fallback() {
            return Err(error);
        }
        let Some(mirrored) = self.mirror_url(&url) else {
            return Err(error);
        };

        warn!("Download of {} failed ({}); trying mirror {}", url, error, mirrored);
        let request = DownloadRequest {
            url: mirrored,
            ..request
        };
        match self.download_checked(&request, expected_size, abort).await {
            Ok(size) => Ok(size),
            Err(mirror_error) => {
                debug!("Mirror failed as well: {}", mirror_error);
                Err(error)
            }
        }
    }

    async fn download_checked(
        &self,
        request: &DownloadRequest,
        expected_size: Option<u64>,
        abort: Option<&Blocker>,
    ) -> Result<u64> {
        match self.downloader.download(request, abort).await? {
            DownloadOutcome::Complete { size, final_url } => match expected_size {
                Some(expected) if size != expected => Err(Error::DownloadError(format!(
                    "{} is {} bytes, expected {}",
                    final_url, size, expected
                ))),
                _ => Ok(size),
            },
            DownloadOutcome::NotModified => Err(Error::DownloadError(format!(
                "{} answered not-modified to an unconditional request",
                request.url
            ))),
        }
    }

    /// Mirror location of a public http(s) URL
    pub fn mirror_url(&self, url: &Url) -> Option<Url> {
        let mirror = self.mirror.as_ref()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        match url.host_str() {
            None | Some("localhost" | "127.0.0.1" | "[::1]") => return None,
            Some(_) => {}
        }
        let escaped: String = url::form_urlencoded::byte_serialize(url.as_str().as_bytes()).collect();
        let base = mirror.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/archive/{}", base, escaped)).ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::download::{TransferOutcome, TransferRequest, Transport};
    use crate::manifest;
    use crate::model::RetrievalMethod;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Serves fixed bodies by URL and records every request
    #[derive(Default)]
    pub(crate) struct MapTransport {
        pub bodies: HashMap<String, Vec<u8>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MapTransport {
        pub fn with(mut self, url: &str, body: Vec<u8>) -> Self {
            self.bodies.insert(url.to_string(), body);
            self
        }
    }

    impl Transport for MapTransport {
        fn fetch(&self, request: &TransferRequest) -> Result<TransferOutcome> {
            self.requests.lock().push(request.url.to_string());
            let body = self
                .bodies
                .get(request.url.as_str())
                .ok_or_else(|| Error::DownloadError(format!("HTTP 404 from {}", request.url)))?;
            if let Some(parent) = request.dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&request.dest, body)?;
            Ok(TransferOutcome::Complete {
                size: body.len() as u64,
            })
        }
    }

    pub(crate) fn tgz(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, data, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            header.set_mtime(1000);
            header.set_entry_type(tar::EntryType::Regular);
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// Digest of an archive's contents, computed by unpacking it locally
    pub(crate) fn digest_of_tgz(body: &[u8], extract: Option<&str>) -> ManifestDigest {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.tgz");
        fs::write(&file, body).unwrap();
        let out = tmp.path().join("out");
        fs::create_dir(&out).unwrap();
        let options = UnpackOptions {
            extract: extract.map(str::to_string),
            start_offset: 0,
        };
        crate::archive::unpack(&file, &out, ArchiveType::detect(None, "a.tgz").unwrap(), &options).unwrap();
        manifest::tree_digest(&out, crate::hash::DigestAlgorithm::Sha256New).unwrap().1
    }

    fn fetcher(tmp: &TempDir, transport: MapTransport) -> Fetcher {
        let store = Store::new(tmp.path().join("store"), vec![]).unwrap();
        Fetcher::new(store, Downloader::new(Arc::new(transport), 2))
    }

    fn archive_impl(url: &str, size: usize, digest: ManifestDigest) -> (Implementation, RetrievalMethod) {
        let mut imp = Implementation::new("impl-1", "1.0".parse().unwrap());
        imp.feed = "http://example.com/prog.xml".into();
        imp.source = crate::model::ImplSource::Digests(vec![digest]);
        let mut archive = ArchiveSource::new(url);
        archive.size = Some(size as u64);
        archive.extract = Some("prog-1.0".into());
        let method = RetrievalMethod::Archive(archive);
        imp.retrieval_methods.push(method.clone());
        (imp, method)
    }

    #[tokio::test]
    async fn test_archive_fetch_stores_verified_tree() {
        let tmp = TempDir::new().unwrap();
        let body = tgz(&[("prog-1.0/bin/prog", b"#!/bin/sh\n", 0o755), ("prog-1.0/README", b"hi", 0o644)]);
        let digest = digest_of_tgz(&body, Some("prog-1.0"));
        let url = "http://example.com/prog-1.0.tar.gz";
        let fetcher = fetcher(&tmp, MapTransport::default().with(url, body.clone()));

        let (imp, method) = archive_impl(url, body.len(), digest.clone());
        fetcher.download_impl(&imp, &method, None).await.unwrap();

        let stored = fetcher.store().lookup(&digest).unwrap();
        assert!(stored.join("bin/prog").is_file());
        assert!(stored.join(manifest::MANIFEST_FILE).is_file());

        // Second call is a no-op
        fetcher.download_impl(&imp, &method, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_digest_mismatch_leaves_store_empty() {
        let tmp = TempDir::new().unwrap();
        let body = tgz(&[("prog-1.0/README", b"hi", 0o644)]);
        let url = "http://example.com/prog-1.0.tar.gz";
        let fetcher = fetcher(&tmp, MapTransport::default().with(url, body.clone()));
        let wrong: ManifestDigest = "sha256=0000000000000000000000000000000000000000000000000000000000000000"
            .parse()
            .unwrap();

        let (imp, method) = archive_impl(url, body.len(), wrong);
        let err = fetcher.download_impl(&imp, &method, None).await.unwrap_err();
        assert!(matches!(err, Error::DigestMismatch { .. }));
        assert!(fetcher.store().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_size_mismatch_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let body = tgz(&[("prog-1.0/README", b"hi", 0o644)]);
        let digest = digest_of_tgz(&body, Some("prog-1.0"));
        let url = "http://example.com/prog-1.0.tar.gz";
        let fetcher = fetcher(&tmp, MapTransport::default().with(url, body.clone()));

        let (imp, method) = archive_impl(url, body.len() + 10, digest);
        let err = fetcher.download_impl(&imp, &method, None).await.unwrap_err();
        assert!(matches!(err, Error::DownloadError(_)));
    }

    #[tokio::test]
    async fn test_mirror_fallback() {
        let tmp = TempDir::new().unwrap();
        let body = tgz(&[("prog-1.0/README", b"hi", 0o644)]);
        let digest = digest_of_tgz(&body, Some("prog-1.0"));
        let url = "http://example.com/prog-1.0.tar.gz";
        let mirrored = "http://mirror.example.org/archive/http%3A%2F%2Fexample.com%2Fprog-1.0.tar.gz";
        let fetcher = fetcher(&tmp, MapTransport::default().with(mirrored, body.clone()))
            .with_mirror(Url::parse("http://mirror.example.org/").unwrap());

        let (imp, method) = archive_impl(url, body.len(), digest.clone());
        fetcher.download_impl(&imp, &method, None).await.unwrap();
        assert!(fetcher.store().contains(&digest));
    }

    #[tokio::test]
    async fn test_mirror_failure_reports_original_error() {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(MapTransport::default());
        let store = Store::new(tmp.path().join("store"), vec![]).unwrap();
        let fetcher = Fetcher::new(store, Downloader::new(transport.clone(), 2))
            .with_mirror(Url::parse("http://mirror.example.org").unwrap());

        let dest: PathBuf = tmp.path().join("x");
        let err = fetcher
            .fetch_to("http://example.com/x.tgz", &dest, None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("http://example.com/x.tgz"));
        assert_eq!(transport.requests.lock().len(), 2);
    }

    #[test]
    fn test_mirror_url_skips_local_hosts() {
        let tmp = TempDir::new().unwrap();
        let fetcher = fetcher(&tmp, MapTransport::default())
            .with_mirror(Url::parse("http://mirror.example.org").unwrap());
        let local = Url::parse("http://localhost:8000/a.tgz").unwrap();
        let file = Url::parse("file:///tmp/a.tgz").unwrap();
        assert!(fetcher.mirror_url(&local).is_none());
        assert!(fetcher.mirror_url(&file).is_none());
    }

    struct RecordingInstaller(Mutex<Vec<String>>);

    #[async_trait]
    impl PackageInstaller for RecordingInstaller {
        async fn install(&self, package: &PackageRef, _implementation: &Implementation) -> Result<()> {
            self.0.lock().push(package.package.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_package_methods_use_installer() {
        let tmp = TempDir::new().unwrap();
        let mut imp = Implementation::new("package:deb:gcc:12", "12".parse().unwrap());
        let method = RetrievalMethod::Package(PackageRef {
            package: "gcc".into(),
            distributions: vec!["Debian".into()],
        });
        imp.retrieval_methods.push(method.clone());

        let plain = fetcher(&tmp, MapTransport::default());
        assert!(plain.choose_method(&imp).is_none());
        let err = plain.download_impl(&imp, &method, None).await.unwrap_err();
        assert!(matches!(err, Error::PackageInstall(_)));

        let installer = Arc::new(RecordingInstaller(Mutex::new(vec![])));
        let with_pm = fetcher(&tmp, MapTransport::default()).with_installer(installer.clone());
        assert!(with_pm.choose_method(&imp).is_some());
        with_pm.download_impl(&imp, &method, None).await.unwrap();
        assert_eq!(*installer.0.lock(), vec!["gcc".to_string()]);
    }
}
