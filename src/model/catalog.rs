// src/model/catalog.rs

//! In-memory catalog of interfaces and feeds
//!
//! The catalog is owned by the caller's context and passed to the solver
//! explicitly. It only changes through [`InterfaceCatalog::add_feed`] (feed
//! import) and the user's per-interface settings.
//!
//! On disk a catalog is a JSON document:
//!
//! ```json
//! {
//!   "interfaces": [{"uri": "http://example.com/prog", "stability_policy": "testing"}],
//!   "feeds": [{"url": "http://example.com/prog", "implementations": [...]}]
//! }
//! ```

use super::{Feed, FeedReference, Implementation, Interface, Stability};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    interfaces: Vec<Interface>,
    #[serde(default)]
    feeds: Vec<Feed>,
}

/// Interfaces by URI and feeds by URL
#[derive(Debug, Clone, Default)]
pub struct InterfaceCatalog {
    interfaces: BTreeMap<String, Interface>,
    feeds: BTreeMap<String, Feed>,
}

impl InterfaceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)
            .map_err(|e| Error::ParseError(format!("invalid catalog: {}", e)))?;
        let mut catalog = Self::new();
        for interface in document.interfaces {
            catalog.interfaces.insert(interface.uri.clone(), interface);
        }
        for feed in document.feeds {
            catalog.add_feed(feed);
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| Error::IoError(format!("Failed to read catalog {}: {}", path.display(), e)))?;
        let catalog = Self::from_json(&json)?;
        debug!(
            "Loaded catalog {} ({} interfaces, {} feeds)",
            path.display(),
            catalog.interfaces.len(),
            catalog.feeds.len()
        );
        Ok(catalog)
    }

    pub fn to_json(&self) -> Result<String> {
        let document = CatalogDocument {
            interfaces: self.interfaces.values().cloned().collect(),
            feeds: self.feeds.values().cloned().collect(),
        };
        serde_json::to_string_pretty(&document).map_err(|e| Error::ParseError(e.to_string()))
    }

    /// Insert or replace a feed, stamping each implementation with its origin
    pub fn add_feed(&mut self, mut feed: Feed) {
        for implementation in &mut feed.implementations {
            implementation.feed = feed.url.clone();
        }
        self.ensure_interface(&feed.url);
        debug!("Catalog now has feed {} ({} implementations)", feed.url, feed.implementations.len());
        self.feeds.insert(feed.url.clone(), feed);
    }

    /// Take every feed and interface setting from `other`; `other` wins
    pub fn merge(&mut self, other: InterfaceCatalog) {
        for (uri, interface) in other.interfaces {
            self.interfaces.insert(uri, interface);
        }
        for (_, feed) in other.feeds {
            self.add_feed(feed);
        }
    }

    pub fn feed(&self, url: &str) -> Option<&Feed> {
        self.feeds.get(url)
    }

    pub fn feeds(&self) -> impl Iterator<Item = &Feed> {
        self.feeds.values()
    }

    pub fn interface(&self, uri: &str) -> Option<&Interface> {
        self.interfaces.get(uri)
    }

    /// The interface's settings, created on first reference
    pub fn ensure_interface(&mut self, uri: &str) -> &mut Interface {
        self.interfaces
            .entry(uri.to_string())
            .or_insert_with(|| Interface::new(uri))
    }

    pub fn stability_policy(&self, uri: &str) -> Option<Stability> {
        self.interface(uri).and_then(|i| i.stability_policy)
    }

    /// Every feed that may provide implementations of `uri`
    ///
    /// The interface's own feed comes first (with no restriction), then the
    /// secondary feeds it lists, then feeds the user added. Each URL appears
    /// once.
    pub fn feed_references(&self, uri: &str) -> Vec<FeedReference> {
        let mut refs = vec![FeedReference::new(uri)];
        if let Some(feed) = self.feed(uri) {
            refs.extend(feed.feeds.iter().cloned());
        }
        if let Some(interface) = self.interface(uri) {
            refs.extend(interface.feeds.iter().cloned());
        }
        let mut seen = std::collections::HashSet::new();
        refs.retain(|r| seen.insert(r.url.clone()));
        refs
    }

    pub fn implementation(&self, feed: &str, id: &str) -> Option<&Implementation> {
        self.feed(feed).and_then(|f| f.implementation(id))
    }

    /// Set or clear the user's stability rating of one implementation
    pub fn set_user_stability(&mut self, feed: &str, id: &str, stability: Option<Stability>) -> Result<()> {
        let implementation = self
            .feeds
            .get_mut(feed)
            .and_then(|f| f.implementations.iter_mut().find(|i| i.id == id))
            .ok_or_else(|| Error::NotFound(format!("implementation {} in {}", id, feed)))?;
        implementation.user_stability = stability;
        Ok(())
    }
}
