//! Counters shared between the orchestrator and its workers.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct TrackerInner {
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Counts live participants and lets one caller wait for all of them.
///
/// The only way to change the count is [`register`](Self::register), which
/// returns a [`Participant`] that deregisters when dropped. Consumed by
/// [`wait`](Self::wait), so a tracker serves exactly one run.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    inner: Arc<TrackerInner>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one participant.
    pub fn register(&self) -> Participant {
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        Participant {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Resolves once every registered participant has been dropped.
    pub async fn wait(self) {
        loop {
            let mut notified = pin!(self.inner.idle.notified());
            notified.as_mut().enable();
            if self.inner.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Registration handle; deregisters on drop, including during unwinding.
#[derive(Debug)]
pub struct Participant {
    inner: Arc<TrackerInner>,
}

impl Drop for Participant {
    fn drop(&mut self) {
        if self.inner.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// In-flight gauge that remembers its high-water mark.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    /// Increments the gauge until the returned guard is dropped.
    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard { gauge: self }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct GaugeGuard<'a> {
    gauge: &'a Gauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_wait_without_participants_returns() {
        let tracker = CompletionTracker::new();
        timeout(Duration::from_millis(100), tracker.wait())
            .await
            .expect("empty tracker should resolve immediately");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wait_blocks_until_all_deregister() {
        let tracker = CompletionTracker::new();
        let finished = Arc::new(AtomicUsize::new(0));

        for i in 0..8u64 {
            let participant = tracker.register();
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                let _participant = participant;
                sleep(Duration::from_millis(5 * i)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(tracker.outstanding() > 0);

        tracker.wait().await;
        assert_eq!(finished.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_panicking_participant_still_deregisters() {
        let tracker = CompletionTracker::new();
        let participant = tracker.register();

        let handle = tokio::spawn(async move {
            let _participant = participant;
            panic!("participant died");
        });
        assert!(handle.await.unwrap_err().is_panic());

        timeout(Duration::from_millis(100), tracker.wait())
            .await
            .expect("unwinding must release the registration");
    }

    #[test]
    fn test_gauge_tracks_peak() {
        let gauge = Gauge::default();
        {
            let _a = gauge.enter();
            let _b = gauge.enter();
            assert_eq!(gauge.current(), 2);
        }
        let _c = gauge.enter();
        assert_eq!(gauge.current(), 1);
        assert_eq!(gauge.peak(), 2);
    }
}
