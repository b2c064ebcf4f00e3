use std::time::Duration;
use thiserror::Error;

/// Error type returned by processors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that stop a run from starting or completing.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The configuration was rejected before any worker started.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Every receiver of the handoff channel is gone, or the admission
    /// semaphore was closed, while input remained.
    #[error("channel closed")]
    ChannelClosed,

    /// The producer task panicked or was aborted.
    #[error("producer task failed")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a single item failed. Never fatal to the run.
#[derive(Debug, Error)]
pub enum ItemError {
    /// The processor returned an error.
    ///
    /// Preserves the source error for debugging.
    #[error("processor failed: {0}")]
    Failed(#[source] BoxError),

    /// The processor or filter panicked; the payload message is kept when it
    /// is a string.
    #[error("processor panicked: {0}")]
    Panicked(String),

    #[error("processor timed out after {0:?}")]
    TimedOut(Duration),
}

/// A failed item together with the reason it failed.
#[derive(Debug)]
pub struct ItemFailure<T> {
    pub item: T,
    pub error: ItemError,
}

/// Result of running an item through the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Process,
    Skip,
}

impl Decision {
    /// `Skip` when `cond` holds, `Process` otherwise.
    #[inline]
    pub fn skip_if(cond: bool) -> Self {
        if cond { Decision::Skip } else { Decision::Process }
    }
}

/// What happened to one received item.
#[derive(Debug)]
pub enum Outcome<T> {
    Skipped,
    Processed,
    Failed(ItemFailure<T>),
}
