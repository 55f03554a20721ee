// src/tasks.rs

//! One-shot blockers for cooperative tasks
//!
//! A [`Blocker`] starts unfired and is fired exactly once by whatever event
//! it stands for: a download finishing, a timer, a user confirming a key.
//! Any number of tasks may wait on it. Waiting on a blocker that has already
//! fired still yields once to the scheduler, so a task never jumps ahead of
//! other ready tasks.
//!
//! Blockers sit on top of [`CancellationToken`], which already provides the
//! one-shot, multi-waiter semantics.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A one-shot, multi-waiter signal
#[derive(Debug, Clone)]
pub struct Blocker {
    name: Arc<str>,
    token: CancellationToken,
}

impl Blocker {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            token: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fire the blocker; later calls are no-ops
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            trace!("Blocker fired: {}", self.name);
            self.token.cancel();
        }
    }

    pub fn happened(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Suspend until the blocker fires
    pub async fn wait(&self) {
        if self.happened() {
            tokio::task::yield_now().await;
            return;
        }
        self.token.cancelled().await;
    }
}

/// Wait until any of `blockers` fires and return its index
///
/// When several have already fired the lowest index wins. Returns `None`
/// for an empty slice.
pub async fn wait_for_any(blockers: &[&Blocker]) -> Option<usize> {
    if blockers.is_empty() {
        return None;
    }
    if let Some(index) = blockers.iter().position(|b| b.happened()) {
        tokio::task::yield_now().await;
        return Some(index);
    }
    let waits = blockers.iter().map(|b| Box::pin(b.wait()));
    let ((), index, _) = futures::future::select_all(waits).await;
    Some(index)
}

/// A blocker fired by a timer task
///
/// Dropping the timer cancels the task; clones of its blocker then never fire.
#[derive(Debug)]
pub struct Timer {
    blocker: Blocker,
    task: JoinHandle<()>,
}

impl Timer {
    pub fn blocker(&self) -> &Blocker {
        &self.blocker
    }

    pub fn happened(&self) -> bool {
        self.blocker.happened()
    }

    pub async fn wait(&self) {
        self.blocker.wait().await
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A timer whose blocker fires after `duration`
pub fn timeout(duration: Duration) -> Timer {
    let blocker = Blocker::new(format!("timeout after {:?}", duration));
    let fire = blocker.clone();
    let task = tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        fire.trigger();
    });
    Timer { blocker, task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let blocker = Blocker::new("download");
        let waiter = {
            let blocker = blocker.clone();
            tokio::spawn(async move {
                blocker.wait().await;
                blocker.happened()
            })
        };
        tokio::task::yield_now().await;
        assert!(!blocker.happened());
        blocker.trigger();
        blocker.trigger();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_already_fired_yields_first() {
        let blocker = Blocker::new("done");
        blocker.trigger();

        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let other = {
            let order = order.clone();
            tokio::spawn(async move {
                order.lock().unwrap().push("other");
            })
        };
        blocker.wait().await;
        order.lock().unwrap().push("waiter");
        other.await.unwrap();

        // The spawned task ran during the yield on the current-thread runtime
        assert_eq!(*order.lock().unwrap(), vec!["other", "waiter"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_wins_against_timeout() {
        let done = Blocker::new("transfer");
        let timer = timeout(Duration::from_secs(30));

        let fire = done.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            fire.trigger();
        });

        assert_eq!(wait_for_any(&[&done, timer.blocker()]).await, Some(0));
        assert!(!timer.happened());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_timer_never_fires() {
        let timer = timeout(Duration::from_millis(50));
        let blocker = timer.blocker().clone();
        drop(timer);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!blocker.happened());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_wins_when_transfer_stalls() {
        let stalled = Blocker::new("stalled");
        let timer = timeout(Duration::from_millis(50));
        assert_eq!(wait_for_any(&[&stalled, timer.blocker()]).await, Some(1));
        assert_eq!(wait_for_any(&[]).await, None);
    }
}
