// src/config.rs

//! Configuration file and the per-run context
//!
//! The configuration is TOML; every field has a default, so a missing file
//! or an empty one both yield a usable setup:
//!
//! ```toml
//! store_root = "/home/me/.cache/injector/implementations"
//! read_only_stores = ["/var/cache/injector/implementations"]
//! network_use = "minimal"
//! max_downloads_per_site = 2
//! mirror = "https://mirror.example.org/"
//! ```
//!
//! A [`Context`] owns everything that used to be process-wide state: the
//! configuration, the interface catalog, the store, and the trust database.

use crate::download::{Downloader, NetworkTransport};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::hash::DigestAlgorithm;
use crate::model::InterfaceCatalog;
use crate::solver::{NetworkPolicy, SolverPolicy};
use crate::store::Store;
use crate::trust::{FeedCache, FeedImporter, OpenPgpVerifier, TrustConfirmation, TrustDb};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Settings read from `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Writable implementation store
    #[serde(default = "default_store_root")]
    pub store_root: PathBuf,

    /// Extra stores searched after the writable one
    #[serde(default)]
    pub read_only_stores: Vec<PathBuf>,

    /// Where imported feeds are cached
    #[serde(default = "default_feed_cache")]
    pub feed_cache: PathBuf,

    #[serde(default = "default_trust_db")]
    pub trust_db: PathBuf,

    /// Directory of OpenPGP public keys used to check feed signatures
    #[serde(default = "default_keyring")]
    pub keyring: PathBuf,

    #[serde(default)]
    pub network_use: NetworkPolicy,

    /// Accept testing versions when an interface sets no policy
    #[serde(default)]
    pub help_with_testing: bool,

    /// Concurrent transfers per site (default: 2)
    #[serde(default = "default_max_downloads_per_site")]
    pub max_downloads_per_site: usize,

    /// Redirect hops per download (default: 10)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Per-download timeout in seconds (default: 300)
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Base URL of the archive mirror
    #[serde(default)]
    pub mirror: Option<String>,

    /// Algorithm for digests computed locally (default: sha256new)
    #[serde(default = "default_digest")]
    pub default_digest: String,
}

fn data_dir(kind: Option<PathBuf>) -> PathBuf {
    kind.unwrap_or_else(|| PathBuf::from(".")).join("injector")
}

fn default_store_root() -> PathBuf {
    data_dir(dirs::cache_dir()).join("implementations")
}

fn default_feed_cache() -> PathBuf {
    data_dir(dirs::cache_dir()).join("interfaces")
}

fn default_trust_db() -> PathBuf {
    data_dir(dirs::config_dir()).join("trustdb.toml")
}

fn default_keyring() -> PathBuf {
    data_dir(dirs::config_dir()).join("keyring")
}

fn default_max_downloads_per_site() -> usize {
    2
}

fn default_max_redirects() -> usize {
    crate::download::DEFAULT_MAX_REDIRECTS
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_digest() -> String {
    DigestAlgorithm::default().name().to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            read_only_stores: Vec::new(),
            feed_cache: default_feed_cache(),
            trust_db: default_trust_db(),
            keyring: default_keyring(),
            network_use: NetworkPolicy::default(),
            help_with_testing: false,
            max_downloads_per_site: default_max_downloads_per_site(),
            max_redirects: default_max_redirects(),
            download_timeout_secs: default_download_timeout_secs(),
            mirror: None,
            default_digest: default_digest(),
        }
    }
}

impl Config {
    /// `<config dir>/injector/config.toml`
    pub fn default_path() -> PathBuf {
        data_dir(dirs::config_dir()).join("config.toml")
    }

    /// Parse a config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path())
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_downloads_per_site == 0 {
            return Err(Error::Config("max_downloads_per_site must be at least 1".into()));
        }
        self.digest_algorithm()?;
        self.mirror_url()?;
        Ok(())
    }

    pub fn digest_algorithm(&self) -> Result<DigestAlgorithm> {
        self.default_digest
            .parse()
            .map_err(|_| Error::Config(format!("unknown digest algorithm {:?}", self.default_digest)))
    }

    pub fn mirror_url(&self) -> Result<Option<Url>> {
        self.mirror
            .as_deref()
            .map(|m| Url::parse(m).map_err(|e| Error::Config(format!("invalid mirror {:?}: {}", m, e))))
            .transpose()
    }

    pub fn solver_policy(&self) -> SolverPolicy {
        SolverPolicy {
            network_use: self.network_use,
            help_with_testing: self.help_with_testing,
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// A downloader over the network transport with the configured limits
    pub fn downloader(&self) -> Result<Downloader> {
        let transport = NetworkTransport::new(self.download_timeout())?;
        Ok(Downloader::new(Arc::new(transport), self.max_downloads_per_site)
            .with_max_redirects(self.max_redirects)
            .with_timeout(self.download_timeout()))
    }
}

/// Everything one run needs, built in a fixed order
pub struct Context {
    pub config: Config,
    pub catalog: InterfaceCatalog,
    pub store: Store,
    pub trust_db: Arc<Mutex<TrustDb>>,
}

impl Context {
    /// Build from `config`: the catalog from the feed cache, then the store,
    /// then the trust database
    pub fn new(config: Config) -> Result<Self> {
        let mut catalog = InterfaceCatalog::new();
        for feed in FeedCache::new(&config.feed_cache).load_all()? {
            catalog.add_feed(feed);
        }
        let store = Store::new(&config.store_root, config.read_only_stores.clone())?;
        let trust_db = TrustDb::load(&config.trust_db)?;
        debug!(
            "Context ready: {} feeds, store at {}",
            catalog.feeds().count(),
            store.writable_root().display()
        );
        Ok(Self {
            config,
            catalog,
            store,
            trust_db: Arc::new(Mutex::new(trust_db)),
        })
    }

    pub fn feed_cache(&self) -> FeedCache {
        FeedCache::new(&self.config.feed_cache)
    }

    pub fn fetcher(&self) -> Result<Fetcher> {
        let fetcher = Fetcher::new(self.store.clone(), self.config.downloader()?);
        Ok(match self.config.mirror_url()? {
            Some(mirror) => fetcher.with_mirror(mirror),
            None => fetcher,
        })
    }

    pub fn importer(&self, confirmation: Arc<dyn TrustConfirmation>) -> Result<FeedImporter> {
        let verifier = OpenPgpVerifier::from_keyring_dir(&self.config.keyring)?;
        Ok(FeedImporter::new(
            self.feed_cache(),
            Arc::new(verifier),
            self.trust_db.clone(),
            confirmation,
        ))
    }
}
