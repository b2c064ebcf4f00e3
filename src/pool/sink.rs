//! Where per-item failures go when the caller opts in.
//!
//! Without a sink, failures are dropped after being logged and counted.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::types::ItemFailure;

pub trait ErrorSink<T>: Send + Sync {
    fn report(&self, failure: ItemFailure<T>);
}

impl<T: Send> ErrorSink<T> for mpsc::UnboundedSender<ItemFailure<T>> {
    fn report(&self, failure: ItemFailure<T>) {
        // a dropped receiver means the caller stopped listening
        let _ = self.send(failure);
    }
}

/// Append-only in-memory failure list. Clones share the same list.
pub struct FailureLog<T> {
    entries: Arc<Mutex<Vec<ItemFailure<T>>>>,
}

impl<T> Clone for FailureLog<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T> Default for FailureLog<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> FailureLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copies out the failed items, in the order they were reported.
    pub fn items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.entries
            .lock()
            .iter()
            .map(|failure| failure.item.clone())
            .collect()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<ItemFailure<T>> {
        std::mem::take(&mut *self.entries.lock())
    }
}

impl<T: Send> ErrorSink<T> for FailureLog<T> {
    fn report(&self, failure: ItemFailure<T>) {
        self.entries.lock().push(failure);
    }
}
