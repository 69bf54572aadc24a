//! Bookkeeping for detached async continuations.

use crate::error::{MappingError, MappingResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Counts outstanding continuations and collects their failures.
///
/// Trackers form a chain: a decode's own tracker is usually a child of the
/// owning service's tracker, so the service can wait for every
/// continuation it started. Cloning shares the tracker.
#[derive(Clone, Default)]
pub struct AsyncTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Default)]
struct TrackerInner {
    outstanding: AtomicUsize,
    notify: Notify,
    failures: Mutex<Vec<MappingError>>,
    parent: Option<AsyncTracker>,
}

impl AsyncTracker {
    /// Creates a root tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracker whose counts also propagate to `self`.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                parent: Some(self.clone()),
                ..TrackerInner::default()
            }),
        }
    }

    /// Returns the number of continuations still in flight.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Waits until no continuations are in flight.
    pub async fn settled(&self) {
        loop {
            // Created before the check so a release in between is not missed.
            let notified = self.inner.notify.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Drains the failures recorded so far.
    pub fn take_failures(&self) -> Vec<MappingError> {
        std::mem::take(&mut *self.inner.failures.lock())
    }

    pub(crate) fn register(&self) -> ContinuationGuard {
        let mut tracker = Some(self);
        while let Some(t) = tracker {
            t.inner.outstanding.fetch_add(1, Ordering::SeqCst);
            tracker = t.inner.parent.as_ref();
        }
        ContinuationGuard {
            tracker: self.clone(),
        }
    }

    fn record_failure(&self, error: &MappingError) {
        let mut tracker = Some(self);
        while let Some(t) = tracker {
            t.inner.failures.lock().push(error.clone());
            tracker = t.inner.parent.as_ref();
        }
    }

    fn release(&self) {
        let mut tracker = Some(self);
        while let Some(t) = tracker {
            t.inner.outstanding.fetch_sub(1, Ordering::SeqCst);
            t.inner.notify.notify_waiters();
            tracker = t.inner.parent.as_ref();
        }
    }
}

impl std::fmt::Debug for AsyncTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTracker")
            .field("outstanding", &self.outstanding())
            .field("failures", &self.inner.failures.lock().len())
            .finish()
    }
}

/// Held by a running continuation; releases its slot when dropped, even
/// if the task is torn down before finishing.
pub(crate) struct ContinuationGuard {
    tracker: AsyncTracker,
}

impl ContinuationGuard {
    pub(crate) fn finish(self, outcome: &MappingResult<()>) {
        if let Err(error) = outcome {
            self.tracker.record_failure(error);
        }
    }
}

impl Drop for ContinuationGuard {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

/// Handle to one detached continuation: the failure channel of that
/// continuation alone.
///
/// Dropping the handle does not cancel the continuation.
#[derive(Debug)]
pub struct Continuation {
    field: &'static str,
    handle: JoinHandle<MappingResult<()>>,
}

impl Continuation {
    pub(crate) fn new(field: &'static str, handle: JoinHandle<MappingResult<()>>) -> Self {
        Self { field, handle }
    }

    /// Entity key of the rule that spawned this continuation.
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Returns true once the continuation has run.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the continuation and returns its outcome.
    pub async fn outcome(self) -> MappingResult<()> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(MappingError::async_resolution(self.field, join_error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_propagate_to_parent() {
        let parent = AsyncTracker::new();
        let child = parent.child();

        let guard = child.register();
        assert_eq!(child.outstanding(), 1);
        assert_eq!(parent.outstanding(), 1);

        drop(guard);
        assert_eq!(child.outstanding(), 0);
        assert_eq!(parent.outstanding(), 0);
    }

    #[test]
    fn failures_are_recorded_up_the_chain() {
        let parent = AsyncTracker::new();
        let child = parent.child();

        let guard = child.register();
        guard.finish(&Err(MappingError::rule("unit", "boom")));

        assert_eq!(child.take_failures().len(), 1);
        assert_eq!(parent.take_failures().len(), 1);
        assert!(parent.take_failures().is_empty());
    }

    #[test]
    fn success_records_nothing() {
        let tracker = AsyncTracker::new();
        tracker.register().finish(&Ok(()));
        assert!(tracker.take_failures().is_empty());
        assert_eq!(tracker.outstanding(), 0);
    }

    #[tokio::test]
    async fn settled_waits_for_release() {
        let tracker = AsyncTracker::new();
        let guard = tracker.register();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.settled().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert_eq!(tracker.outstanding(), 0);
    }

    #[tokio::test]
    async fn settled_returns_immediately_when_idle() {
        AsyncTracker::new().settled().await;
    }
}
