// src/trust/db.rs

//! Which keys are trusted for which domains
//!
//! Persisted as TOML:
//!
//! ```toml
//! [keys."92429807C9853C0744A68B9AAE07828059A53CC1"]
//! domains = ["example.com", "example.org:8080"]
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use url::Url;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrustFile {
    #[serde(default)]
    keys: BTreeMap<String, KeyEntry>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct KeyEntry {
    #[serde(default)]
    domains: BTreeSet<String>,
}

/// Fingerprint-to-domains trust relation
#[derive(Debug, Default)]
pub struct TrustDb {
    path: Option<PathBuf>,
    keys: BTreeMap<String, BTreeSet<String>>,
}

/// Canonical form of a fingerprint: uppercase hex without spaces
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Trust domain of a feed URL: its host, plus the port if one is given
pub fn domain_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| Error::ParseError(format!("invalid URL {:?}: {}", url, e)))?;
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::ParseError(format!("{} has no host to trust", url)))?;
    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

impl TrustDb {
    /// A database that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`; a missing file is an empty database
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let keys = if path.exists() {
            let text = fs::read_to_string(&path)
                .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
            let file: TrustFile = toml::from_str(&text)
                .map_err(|e| Error::Config(format!("invalid trust database {}: {}", path.display(), e)))?;
            file.keys
                .into_iter()
                .map(|(fpr, entry)| (normalize_fingerprint(&fpr), entry.domains))
                .collect()
        } else {
            BTreeMap::new()
        };
        Ok(Self { path: Some(path), keys })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_trusted(&self, fingerprint: &str, domain: &str) -> bool {
        self.keys
            .get(&normalize_fingerprint(fingerprint))
            .is_some_and(|domains| domains.contains(domain))
    }

    /// Trust `fingerprint` for `domain` and save
    pub fn trust_key(&mut self, fingerprint: &str, domain: &str) -> Result<()> {
        let fingerprint = normalize_fingerprint(fingerprint);
        info!("Trusting {} for {}", fingerprint, domain);
        self.keys.entry(fingerprint).or_default().insert(domain.to_string());
        self.save()
    }

    /// Stop trusting `fingerprint` for `domain`; returns whether it was trusted
    pub fn untrust_key(&mut self, fingerprint: &str, domain: &str) -> Result<bool> {
        let fingerprint = normalize_fingerprint(fingerprint);
        let Some(domains) = self.keys.get_mut(&fingerprint) else {
            return Ok(false);
        };
        let removed = domains.remove(domain);
        if domains.is_empty() {
            self.keys.remove(&fingerprint);
        }
        if removed {
            info!("No longer trusting {} for {}", fingerprint, domain);
            self.save()?;
        }
        Ok(removed)
    }

    /// Every trusted key with its domains, sorted by fingerprint
    pub fn keys(&self) -> Vec<(String, Vec<String>)> {
        self.keys
            .iter()
            .map(|(fpr, domains)| (fpr.clone(), domains.iter().cloned().collect()))
            .collect()
    }

    /// Write to disk atomically
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = TrustFile {
            keys: self
                .keys
                .iter()
                .map(|(fpr, domains)| (fpr.clone(), KeyEntry { domains: domains.clone() }))
                .collect(),
        };
        let text = toml::to_string_pretty(&file)
            .map_err(|e| Error::Config(format!("Failed to serialize trust database: {}", e)))?;

        let parent = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(text.as_bytes())?;
        temp.persist(path)
            .map_err(|e| Error::IoError(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(())
    }
}
