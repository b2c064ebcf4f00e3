use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::tracker::Gauge;

/// Counters for a finished run.
///
/// Items are accounted as `received = skipped + processed + failed +
/// withdrawn`. `withdrawn` is only non-zero for the per-item strategies,
/// where an admitted item can still be abandoned on cancellation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub workers: usize,
    pub sent: usize,
    pub received: usize,
    pub skipped: usize,
    pub processed: usize,
    pub failed: usize,
    pub withdrawn: usize,
    pub peak_in_flight: usize,
    pub workers_exited: usize,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
pub(crate) struct RunStats {
    sent: AtomicUsize,
    received: AtomicUsize,
    skipped: AtomicUsize,
    processed: AtomicUsize,
    failed: AtomicUsize,
    withdrawn: AtomicUsize,
    workers_exited: AtomicUsize,
    cancelled: AtomicBool,
    pub(crate) in_flight: Gauge,
}

impl RunStats {
    pub(crate) fn sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn withdrawn(&self) {
        self.withdrawn.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_exited(&self) {
        self.workers_exited.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub(crate) fn report(&self, workers: usize) -> RunReport {
        RunReport {
            workers,
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            withdrawn: self.withdrawn.load(Ordering::Relaxed),
            peak_in_flight: self.in_flight.peak(),
            workers_exited: self.workers_exited.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}
