// src/trust/import.rs

//! The feed-import trust gate
//!
//! A downloaded feed is accepted only when it is newer than the cached copy
//! (a dated cache refuses undated feeds) and at least one valid signature comes from a key trusted for the feed's
//! domain. When no signing key is trusted yet, a [`TrustConfirmation`] is
//! asked. Confirmations go through one async lock, so concurrent imports for
//! the same domain ask at most once.

use super::cache::FeedCache;
use super::db::{TrustDb, domain_from_url, normalize_fingerprint};
use super::verify::{SignatureVerifier, ValidSignature};
use crate::error::{Error, Result, TrustError};
use crate::model::{Feed, InterfaceCatalog};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Answer to a request to trust new keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustDecision {
    /// Trust these fingerprints for the domain
    Approve(Vec<String>),
    Reject,
}

/// Asks a human or a policy whether to trust the keys that signed a feed
#[async_trait]
pub trait TrustConfirmation: Send + Sync {
    async fn confirm(&self, url: &str, domain: &str, signatures: &[ValidSignature]) -> TrustDecision;
}

/// Verifies, trust-checks, and caches downloaded feeds
pub struct FeedImporter {
    cache: FeedCache,
    verifier: Arc<dyn SignatureVerifier>,
    trust_db: Arc<Mutex<TrustDb>>,
    confirmation: Arc<dyn TrustConfirmation>,
    gate: tokio::sync::Mutex<()>,
    writing: Mutex<()>,
}

impl FeedImporter {
    pub fn new(
        cache: FeedCache,
        verifier: Arc<dyn SignatureVerifier>,
        trust_db: Arc<Mutex<TrustDb>>,
        confirmation: Arc<dyn TrustConfirmation>,
    ) -> Self {
        Self {
            cache,
            verifier,
            trust_db,
            confirmation,
            gate: tokio::sync::Mutex::new(()),
            writing: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &FeedCache {
        &self.cache
    }

    /// Check and cache a feed downloaded from `url`
    pub async fn import(&self, url: &str, data: &[u8], signature: Option<&[u8]>) -> Result<Feed> {
        let feed: Feed =
            serde_json::from_slice(data).map_err(|e| Error::ParseError(format!("invalid feed {}: {}", url, e)))?;
        if feed.url != url {
            return Err(Error::ParseError(format!(
                "feed downloaded from {} claims to be {}",
                url, feed.url
            )));
        }
        if self.cache.load_bytes(url)?.as_deref() == Some(data) {
            debug!("Feed {} is unchanged", url);
            return Ok(feed);
        }
        self.check_rollback(url, &feed)?;

        let signatures = match signature {
            Some(sig) => self.verifier.verify(data, sig).unwrap_or_else(|e| {
                warn!("Bad signature block on {}: {}", url, e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        if signatures.is_empty() {
            return Err(TrustError::NoValidSignatures { url: url.to_string() }.into());
        }

        let domain = domain_from_url(url)?;
        if !self.any_trusted(&signatures, &domain) {
            self.confirm_keys(url, &domain, &signatures).await?;
        }

        {
            // A concurrent import may have cached another copy while we waited
            let _writing = self.writing.lock();
            if self.cache.load_bytes(url)?.as_deref() != Some(data) {
                self.check_rollback(url, &feed)?;
                self.cache.store(url, data, signature, feed.last_modified)?;
            }
        }
        info!("Imported feed {}", url);
        Ok(feed)
    }

    /// [`import`](Self::import), then add the feed to `catalog`
    pub async fn import_into(
        &self,
        url: &str,
        data: &[u8],
        signature: Option<&[u8]>,
        catalog: &mut InterfaceCatalog,
    ) -> Result<()> {
        let feed = self.import(url, data, signature).await?;
        catalog.add_feed(feed);
        Ok(())
    }

    fn check_rollback(&self, url: &str, feed: &Feed) -> Result<()> {
        let cached = match self.cache.last_modified(url) {
            Ok(cached) => cached,
            Err(Error::ParseError(e)) => {
                warn!("Replacing unreadable cached copy of {}: {}", url, e);
                None
            }
            Err(e) => return Err(e),
        };
        let Some(cached) = cached else {
            return Ok(());
        };
        let Some(new) = feed.last_modified else {
            warn!("Refusing {}: no timestamp, cached copy is dated {}", url, cached);
            return Err(TrustError::MissingTimestamp {
                url: url.to_string(),
                cached,
            }
            .into());
        };
        if new <= cached {
            warn!("Refusing {}: timestamp {} is not newer than cached {}", url, new, cached);
            return Err(TrustError::Rollback {
                url: url.to_string(),
                new,
                cached,
            }
            .into());
        }
        Ok(())
    }

    fn any_trusted(&self, signatures: &[ValidSignature], domain: &str) -> bool {
        let db = self.trust_db.lock();
        signatures.iter().any(|s| db.is_trusted(&s.fingerprint, domain))
    }

    async fn confirm_keys(&self, url: &str, domain: &str, signatures: &[ValidSignature]) -> Result<()> {
        let _gate = self.gate.lock().await;
        // Another import may have confirmed these keys while we waited
        if self.any_trusted(signatures, domain) {
            debug!("Keys for {} were confirmed by another import", domain);
            return Ok(());
        }

        info!("No trusted key has signed {}; asking for confirmation", url);
        let approved = match self.confirmation.confirm(url, domain, signatures).await {
            TrustDecision::Approve(fingerprints) => fingerprints,
            TrustDecision::Reject => return Err(TrustError::Rejected { url: url.to_string() }.into()),
        };

        {
            let mut db = self.trust_db.lock();
            for fingerprint in &approved {
                let fingerprint = normalize_fingerprint(fingerprint);
                if signatures.iter().any(|s| normalize_fingerprint(&s.fingerprint) == fingerprint) {
                    db.trust_key(&fingerprint, domain)?;
                }
            }
        }

        if self.any_trusted(signatures, domain) {
            Ok(())
        } else {
            Err(TrustError::NotTrusted {
                url: url.to_string(),
                domain: domain.to_string(),
            }
            .into())
        }
    }
}
