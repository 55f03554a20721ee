// src/download/scheduler.rs

//! Per-site admission control
//!
//! Each [`Site`] runs at most `max_per_site` transfers at once. Further
//! requests queue in FIFO order; releasing a [`SitePermit`] hands its slot
//! directly to the oldest waiter, so a slot is never up for grabs between a
//! release and the next admission.

use super::site::Site;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

type Sites = Arc<Mutex<HashMap<Site, SiteState>>>;

#[derive(Default)]
struct SiteState {
    active: usize,
    waiting: VecDeque<oneshot::Sender<()>>,
}

/// Snapshot of one site's load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SiteLoad {
    pub active: usize,
    pub queued: usize,
}

/// Bounded per-site admission queue
#[derive(Clone)]
pub struct DownloadScheduler {
    max_per_site: usize,
    sites: Sites,
}

impl DownloadScheduler {
    pub fn new(max_per_site: usize) -> Self {
        Self {
            max_per_site: max_per_site.max(1),
            sites: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn max_per_site(&self) -> usize {
        self.max_per_site
    }

    /// Wait for a transfer slot at `site`
    ///
    /// Dropping the returned future while queued gives up the place in the
    /// queue (and the slot, if it had already been handed over).
    pub async fn admit(&self, site: &Site) -> SitePermit {
        loop {
            let rx = {
                let mut sites = self.sites.lock();
                let state = sites.entry(site.clone()).or_default();
                if state.active < self.max_per_site {
                    state.active += 1;
                    return self.permit(site);
                }
                let (tx, rx) = oneshot::channel();
                state.waiting.push_back(tx);
                debug!("Queued transfer for {} ({} waiting)", site, state.waiting.len());
                rx
            };

            let mut pending = PendingAdmission {
                rx,
                site: site.clone(),
                sites: self.sites.clone(),
                settled: false,
            };
            let handed_over = (&mut pending.rx).await.is_ok();
            pending.settled = true;
            if handed_over {
                return self.permit(site);
            }
        }
    }

    /// Current load of `site`
    pub fn site_load(&self, site: &Site) -> SiteLoad {
        self.sites
            .lock()
            .get(site)
            .map(|state| SiteLoad {
                active: state.active,
                queued: state.waiting.len(),
            })
            .unwrap_or_default()
    }

    fn permit(&self, site: &Site) -> SitePermit {
        SitePermit {
            site: site.clone(),
            sites: self.sites.clone(),
        }
    }
}

/// An admitted transfer; the slot is released on drop
pub struct SitePermit {
    site: Site,
    sites: Sites,
}

impl SitePermit {
    pub fn site(&self) -> &Site {
        &self.site
    }
}

impl Drop for SitePermit {
    fn drop(&mut self) {
        release(&self.sites, &self.site);
    }
}

struct PendingAdmission {
    rx: oneshot::Receiver<()>,
    site: Site,
    sites: Sites,
    settled: bool,
}

impl Drop for PendingAdmission {
    fn drop(&mut self) {
        // A slot handed to a waiter that went away must be passed on
        if !self.settled && self.rx.try_recv().is_ok() {
            release(&self.sites, &self.site);
        }
    }
}

fn release(sites: &Sites, site: &Site) {
    let mut sites = sites.lock();
    let Some(state) = sites.get_mut(site) else {
        return;
    };
    while let Some(next) = state.waiting.pop_front() {
        if next.send(()).is_ok() {
            return;
        }
    }
    state.active = state.active.saturating_sub(1);
    if state.active == 0 {
        sites.remove(site);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn site(url: &str) -> Site {
        Site::from_url(&Url::parse(url).unwrap()).unwrap()
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_limit_and_fifo_handover() {
        let scheduler = DownloadScheduler::new(2);
        let a = site("http://a.example/");
        let admitted = Arc::new(Mutex::new(Vec::new()));

        let first = scheduler.admit(&a).await;
        let second = scheduler.admit(&a).await;

        let mut waiters = Vec::new();
        for n in 0..2 {
            let scheduler = scheduler.clone();
            let a = a.clone();
            let admitted = admitted.clone();
            waiters.push(tokio::spawn(async move {
                let permit = scheduler.admit(&a).await;
                admitted.lock().push(n);
                permit
            }));
            settle().await;
        }

        assert_eq!(scheduler.site_load(&a), SiteLoad { active: 2, queued: 2 });

        drop(first);
        settle().await;
        assert_eq!(*admitted.lock(), vec![0]);
        assert_eq!(scheduler.site_load(&a), SiteLoad { active: 2, queued: 1 });

        drop(second);
        settle().await;
        assert_eq!(*admitted.lock(), vec![0, 1]);

        for waiter in waiters {
            drop(waiter.await.unwrap());
        }
        assert_eq!(scheduler.site_load(&a), SiteLoad::default());
    }

    #[tokio::test]
    async fn test_sites_are_independent() {
        let scheduler = DownloadScheduler::new(1);
        let _busy = scheduler.admit(&site("http://a.example/")).await;
        let other = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            scheduler.admit(&site("http://b.example/")),
        )
        .await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_waiter_releases_slot() {
        let scheduler = DownloadScheduler::new(1);
        let a = site("http://a.example/");
        let held = scheduler.admit(&a).await;

        let abandoned = {
            let scheduler = scheduler.clone();
            let a = a.clone();
            tokio::spawn(async move { scheduler.admit(&a).await })
        };
        settle().await;
        abandoned.abort();
        let _ = abandoned.await;

        drop(held);
        assert_eq!(scheduler.site_load(&a), SiteLoad::default());
        let again = tokio::time::timeout(std::time::Duration::from_secs(1), scheduler.admit(&a)).await;
        assert!(again.is_ok());
    }
}
