use futures::{FutureExt, Stream, StreamExt};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use super::channel::{self, Delivery, Receiver, Sender};
use super::config::{Config, Strategy};
use super::processor::{Filter, Processor};
use super::sink::ErrorSink;
use super::stats::{RunReport, RunStats};
use super::strategy;
use super::tracker::{CompletionTracker, Participant};
use super::types::{Decision, ItemError, ItemFailure, Outcome, PoolError};

/// Runs a processor over a sequence of items with at most
/// `worker_num` items in flight.
///
/// The pool itself is reusable; every call to [`run`](Self::run) builds a
/// fresh channel, worker set and completion tracker.
pub struct Pool<T> {
    config: Arc<Config>,
    filter: Arc<dyn Filter<T>>,
    sink: Option<Arc<dyn ErrorSink<T>>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            filter: self.filter.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<T> Pool<T>
where
    T: Send + Sync + 'static,
{
    /// Fails with [`PoolError::Configuration`] if `worker_num` is zero.
    pub fn new(config: Arc<Config>) -> Result<Self, PoolError> {
        config.validate()?;
        Ok(Self {
            config,
            filter: Arc::new(|_: &T| Decision::Process),
            sink: None,
        })
    }

    /// Items for which `filter` returns [`Decision::Skip`] are received
    /// but never processed.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Filter<T> + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    /// Routes per-item failures to `sink`. Without one they are only
    /// logged and counted.
    pub fn with_error_sink<S>(mut self, sink: S) -> Self
    where
        S: ErrorSink<T> + 'static,
    {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Processes every item of `items`, returning once all workers exited.
    ///
    /// Per-item failures never make this return an error.
    pub async fn run<I, P>(
        &self,
        cancel: &CancellationToken,
        items: I,
        processor: P,
    ) -> Result<RunReport, PoolError>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        P: Processor<T> + 'static,
    {
        self.run_stream(cancel, futures::stream::iter(items), processor)
            .await
    }

    /// Like [`run`](Self::run), for lazily produced or unbounded input.
    /// An unbounded stream only ends through `cancel`.
    pub async fn run_stream<S, P>(
        &self,
        cancel: &CancellationToken,
        items: S,
        processor: P,
    ) -> Result<RunReport, PoolError>
    where
        S: Stream<Item = T> + Send + 'static,
        P: Processor<T> + 'static,
    {
        let workers = self.config.worker_num;
        let dispatch = Arc::new(Dispatch {
            processor: Arc::new(processor),
            filter: self.filter.clone(),
            sink: self.sink.clone(),
            item_timeout: self.config.item_timeout,
            stats: Arc::new(RunStats::default()),
        });

        info!(workers, strategy = ?self.config.strategy, "run starting");
        match self.config.strategy {
            Strategy::WorkerPool => self.run_workers(cancel, items, dispatch.clone()).await?,
            Strategy::TaskPerItem => {
                strategy::task_per_item(workers, cancel, items, dispatch.clone()).await?
            }
            Strategy::GatedSpawn => {
                strategy::gated_spawn(workers, cancel, items, dispatch.clone()).await?
            }
        }

        let report = dispatch.stats.report(workers);
        info!(
            received = report.received,
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            cancelled = report.cancelled,
            "run finished"
        );
        Ok(report)
    }

    async fn run_workers<S, P>(
        &self,
        cancel: &CancellationToken,
        items: S,
        dispatch: Arc<Dispatch<T, P>>,
    ) -> Result<(), PoolError>
    where
        S: Stream<Item = T> + Send + 'static,
        P: Processor<T> + 'static,
    {
        let (sender, receiver) = channel::handoff();
        let tracker = CompletionTracker::new();

        // every worker is registered and spawned before the first send
        for worker_id in 0..self.config.worker_num {
            let participant = tracker.register();
            let receiver = receiver.clone();
            let dispatch = dispatch.clone();
            let cancel = cancel.clone();

            tokio::spawn(
                Self::worker(worker_id, receiver, dispatch, cancel, participant)
                    .instrument(info_span!("worker", worker_id)),
            );
        }
        drop(receiver);

        let producer = tokio::spawn(Self::produce(
            items,
            sender,
            cancel.clone(),
            dispatch.clone(),
        ));

        tracker.wait().await;
        producer.await?
    }

    async fn worker<P>(
        worker_id: usize,
        receiver: Receiver<T>,
        dispatch: Arc<Dispatch<T, P>>,
        cancel: CancellationToken,
        _participant: Participant,
    ) where
        P: Processor<T>,
    {
        debug!(worker_id, "worker started");
        while let Some(item) = receiver.recv().await {
            dispatch.handle(&cancel, item).await;
        }
        dispatch.stats.worker_exited();
        debug!(worker_id, "channel closed, worker exiting");
    }

    /// Owns the only [`Sender`]. Every exit path drops it, which closes the
    /// channel.
    ///
    /// Fails with [`PoolError::ChannelClosed`] if every worker is gone while
    /// input remains.
    async fn produce<S, P>(
        items: S,
        sender: Sender<T>,
        cancel: CancellationToken,
        dispatch: Arc<Dispatch<T, P>>,
    ) -> Result<(), PoolError>
    where
        S: Stream<Item = T> + Send,
        P: Processor<T>,
    {
        let mut items = pin!(items);
        while let Some(item) = next_item(&cancel, &mut items, &dispatch.stats).await {
            match sender.send(&cancel, item).await {
                Ok(Delivery::Delivered) => dispatch.stats.sent(),
                Ok(Delivery::Withdrawn) => {
                    dispatch.stats.mark_cancelled();
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "producer stopped early, input left unsent");
                    return Err(e);
                }
            }
        }
        if cancel.is_cancelled() {
            info!("producer interrupted by cancellation");
        }
        sender.close();
        Ok(())
    }
}

/// Pulls the next item unless `cancel` has fired.
pub(crate) async fn next_item<S>(
    cancel: &CancellationToken,
    items: &mut S,
    stats: &RunStats,
) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            stats.mark_cancelled();
            None
        }
        next = items.next() => next,
    }
}

/// Per-run state shared by every task that handles items.
pub(crate) struct Dispatch<T, P> {
    processor: Arc<P>,
    filter: Arc<dyn Filter<T>>,
    sink: Option<Arc<dyn ErrorSink<T>>>,
    item_timeout: Option<Duration>,
    pub(crate) stats: Arc<RunStats>,
}

impl<T, P> Dispatch<T, P>
where
    T: Send + Sync,
    P: Processor<T>,
{
    /// Screens, executes and settles one received item.
    pub(crate) async fn handle(&self, cancel: &CancellationToken, item: T) {
        match self.screen(&item) {
            Ok(Decision::Process) => {
                let outcome = self.execute(cancel, item).await;
                self.settle(outcome);
            }
            Ok(Decision::Skip) => self.settle(Outcome::Skipped),
            Err(error) => self.settle(Outcome::Failed(ItemFailure { item, error })),
        }
    }

    /// Counts the item as received and applies the filter. A panicking
    /// filter fails the item instead of the caller.
    pub(crate) fn screen(&self, item: &T) -> Result<Decision, ItemError> {
        self.stats.received();
        panic::catch_unwind(AssertUnwindSafe(|| self.filter.decide(item)))
            .map_err(|payload| ItemError::Panicked(panic_message(payload.as_ref())))
    }

    /// Runs the processor with panics and the timeout contained to this item.
    pub(crate) async fn execute(&self, cancel: &CancellationToken, item: T) -> Outcome<T> {
        let result = {
            let _active = self.stats.in_flight.enter();
            self.invoke(cancel, &item).await
        };
        match result {
            Ok(()) => Outcome::Processed,
            Err(error) => Outcome::Failed(ItemFailure { item, error }),
        }
    }

    pub(crate) fn settle(&self, outcome: Outcome<T>) {
        match outcome {
            Outcome::Skipped => {
                self.stats.skipped();
                debug!("item skipped by filter");
            }
            Outcome::Processed => self.stats.processed(),
            Outcome::Failed(failure) => {
                self.stats.failed();
                warn!(error = %failure.error, "item failed");
                if let Some(sink) = &self.sink {
                    if let Err(payload) =
                        panic::catch_unwind(AssertUnwindSafe(|| sink.report(failure)))
                    {
                        warn!(
                            panic = %panic_message(payload.as_ref()),
                            "error sink panicked, failure report lost"
                        );
                    }
                }
            }
        }
    }

    async fn invoke(&self, cancel: &CancellationToken, item: &T) -> Result<(), ItemError> {
        let call = AssertUnwindSafe(self.processor.process(cancel, item)).catch_unwind();
        let caught = match self.item_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ItemError::TimedOut(limit))?,
            None => call.await,
        };
        match caught {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ItemError::Failed(source)),
            Err(payload) => Err(ItemError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::config::ConfigBuilder;
    use crate::pool::types::BoxError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProcessor {
        counter: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Processor<i32> for CountingProcessor {
        async fn process(&self, _cancel: &CancellationToken, _item: &i32) -> Result<(), BoxError> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_pool_rejects_zero_width() {
        let result = Pool::<i32>::new(Arc::new(Config::new(0)));
        assert!(matches!(result, Err(PoolError::Configuration(_))));
    }

    #[test]
    fn test_pool_keeps_config() {
        let config = ConfigBuilder::default()
            .worker_num(3usize)
            .build()
            .unwrap();
        let pool: Pool<i32> = Pool::new(Arc::new(config)).unwrap();
        assert_eq!(pool.config().worker_num(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_processes_everything() {
        let pool: Pool<i32> = Pool::new(Arc::new(Config::new(4))).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let processor = CountingProcessor {
            counter: Arc::clone(&counter),
        };

        let report = pool
            .run(&CancellationToken::new(), 0..100, processor)
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert_eq!(report.sent, 100);
        assert_eq!(report.received, 100);
        assert_eq!(report.processed, 100);
        assert_eq!(report.workers_exited, 4);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_pool_is_reusable_across_runs() {
        let pool: Pool<i32> = Pool::new(Arc::new(Config::new(2))).unwrap();
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            let counter = Arc::new(AtomicUsize::new(0));
            let processor = CountingProcessor {
                counter: Arc::clone(&counter),
            };
            let report = pool.run(&cancel, vec![1, 2, 3], processor).await.unwrap();
            assert_eq!(report.processed, 3);
            assert_eq!(counter.load(Ordering::SeqCst), 3);
        }
    }

    #[tokio::test]
    async fn test_producer_fails_when_workers_are_gone() {
        let (sender, receiver) = channel::handoff::<i32>();
        drop(receiver);

        let dispatch = Arc::new(Dispatch {
            processor: Arc::new(CountingProcessor {
                counter: Arc::new(AtomicUsize::new(0)),
            }),
            filter: Arc::new(|_: &i32| Decision::Process),
            sink: None,
            item_timeout: None,
            stats: Arc::new(RunStats::default()),
        });

        let result = Pool::<i32>::produce(
            futures::stream::iter(0..3),
            sender,
            CancellationToken::new(),
            dispatch.clone(),
        )
        .await;

        assert!(matches!(result, Err(PoolError::ChannelClosed)));
        assert_eq!(dispatch.stats.report(1).sent, 0);
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
