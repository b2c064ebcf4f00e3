//! Semaphore-based alternatives to the worker pool.
//!
//! Both bound the number of concurrently executing processor calls to
//! `width`, but spawn one task per item instead of reusing long-lived
//! workers:
//!
//! - [`task_per_item`] spawns every task immediately, so task count grows
//!   with the input even though only `width` tasks make progress.
//! - [`gated_spawn`] takes a permit before spawning, which caps task count
//!   but blocks the caller's loop until the tail of the input.
//!
//! They exist for comparison; the worker pool is the default.

use futures::Stream;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::pool::{Dispatch, next_item};
use super::processor::Processor;
use super::tracker::CompletionTracker;
use super::types::{Decision, ItemFailure, Outcome, PoolError};

pub(crate) async fn task_per_item<T, S, P>(
    width: usize,
    cancel: &CancellationToken,
    items: S,
    dispatch: Arc<Dispatch<T, P>>,
) -> Result<(), PoolError>
where
    T: Send + Sync + 'static,
    S: Stream<Item = T> + Send,
    P: Processor<T> + 'static,
{
    let semaphore = Arc::new(Semaphore::new(width));
    let tracker = CompletionTracker::new();
    let mut items = pin!(items);

    while let Some(item) = next_item(cancel, &mut items, &dispatch.stats).await {
        dispatch.stats.sent();
        let participant = tracker.register();
        let semaphore = semaphore.clone();
        let dispatch = dispatch.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let _participant = participant;
            // skipped items never compete for a permit
            match dispatch.screen(&item) {
                Ok(Decision::Process) => {}
                Ok(Decision::Skip) => {
                    dispatch.settle(Outcome::Skipped);
                    return;
                }
                Err(error) => {
                    dispatch.settle(Outcome::Failed(ItemFailure { item, error }));
                    return;
                }
            }
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    dispatch.stats.mark_cancelled();
                    dispatch.stats.withdrawn();
                    return;
                }
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        dispatch.stats.withdrawn();
                        return;
                    }
                },
            };
            let outcome = dispatch.execute(&cancel, item).await;
            dispatch.settle(outcome);
        });
    }

    debug!(pending = tracker.outstanding(), "all item tasks spawned");
    tracker.wait().await;
    Ok(())
}

pub(crate) async fn gated_spawn<T, S, P>(
    width: usize,
    cancel: &CancellationToken,
    items: S,
    dispatch: Arc<Dispatch<T, P>>,
) -> Result<(), PoolError>
where
    T: Send + Sync + 'static,
    S: Stream<Item = T> + Send,
    P: Processor<T> + 'static,
{
    let semaphore = Arc::new(Semaphore::new(width));
    let tracker = CompletionTracker::new();
    let mut items = pin!(items);

    while let Some(item) = next_item(cancel, &mut items, &dispatch.stats).await {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                dispatch.stats.mark_cancelled();
                break;
            }
            permit = semaphore.clone().acquire_owned() => {
                permit.map_err(|_| PoolError::ChannelClosed)?
            }
        };
        dispatch.stats.sent();
        let participant = tracker.register();
        let dispatch = dispatch.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let _participant = participant;
            let _permit = permit;
            dispatch.handle(&cancel, item).await;
        });
    }

    if cancel.is_cancelled() {
        info!("admission loop interrupted by cancellation");
    }
    tracker.wait().await;
    Ok(())
}
