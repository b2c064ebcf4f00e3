//! Unbuffered handoff between the single producer and the workers.
//!
//! A send completes only once a worker has taken the item, so the producer
//! never runs more than one item ahead of consumption.

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::types::PoolError;

struct Handoff<T> {
    item: T,
    ack: oneshot::Sender<()>,
}

/// Result of a send that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A worker received the item.
    Delivered,
    /// Cancellation fired before any worker took the item; it was dropped.
    Withdrawn,
}

/// Creates a capacity-0 handoff channel.
pub fn handoff<T: Send>() -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (
        Sender { tx },
        Receiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Write side. Not `Clone`: exactly one producer owns it, and closing
/// consumes it, so the channel cannot be closed twice. Dropping it closes
/// the channel too.
pub struct Sender<T> {
    tx: mpsc::Sender<Handoff<T>>,
}

impl<T> Sender<T> {
    /// Hands `item` to a worker, waiting until one receives it.
    ///
    /// Returns [`Delivery::Withdrawn`] if `cancel` fires first; a withdrawn
    /// item is never observed by any worker.
    pub async fn send(&self, cancel: &CancellationToken, item: T) -> Result<Delivery, PoolError> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Delivery::Withdrawn),
            permit = self.tx.reserve() => permit.map_err(|_| PoolError::ChannelClosed)?,
        };

        let (ack, mut acked) = oneshot::channel();
        permit.send(Handoff { item, ack });

        tokio::select! {
            biased;
            taken = &mut acked => taken
                .map(|()| Delivery::Delivered)
                .map_err(|_| PoolError::ChannelClosed),
            _ = cancel.cancelled() => {
                // Refuse any late ack; a worker that already acked keeps the item.
                acked.close();
                match acked.try_recv() {
                    Ok(()) => Ok(Delivery::Delivered),
                    Err(_) => Ok(Delivery::Withdrawn),
                }
            }
        }
    }

    /// Closes the channel. Workers drain and then see `None`.
    pub fn close(self) {
        drop(self);
    }
}

/// Read side, shared by all workers.
pub struct Receiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<Handoff<T>>>>,
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> Receiver<T> {
    /// Takes the next item. `None` once the channel is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        loop {
            let Handoff { item, ack } = rx.recv().await?;
            if ack.send(()).is_ok() {
                return Some(item);
            }
            // withdrawn by the sender
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_send_waits_for_receiver() {
        let (tx, rx) = handoff::<i32>();
        let cancel = CancellationToken::new();

        let pending = timeout(Duration::from_millis(50), tx.send(&cancel, 1)).await;
        assert!(pending.is_err(), "send must not complete without a receiver");

        let receiver = tokio::spawn(async move { rx.recv().await });
        let delivered = tx.send(&cancel, 2).await.unwrap();
        assert_eq!(delivered, Delivery::Delivered);
        // the timed-out first send was withdrawn, so 2 is the first item seen
        assert_eq!(receiver.await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_each_item_received_once() {
        let (tx, rx) = handoff::<usize>();
        let cancel = CancellationToken::new();

        let mut readers = Vec::new();
        for _ in 0..3 {
            let rx = rx.clone();
            readers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(item) = rx.recv().await {
                    seen.push(item);
                }
                seen
            }));
        }
        drop(rx);

        for i in 0..50 {
            assert_eq!(tx.send(&cancel, i).await.unwrap(), Delivery::Delivered);
        }
        tx.close();

        let mut all = Vec::new();
        for reader in readers {
            all.extend(reader.await.unwrap());
        }
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_cancelled_send_is_withdrawn() {
        let (tx, rx) = handoff::<i32>();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        assert_eq!(tx.send(&cancel, 7).await.unwrap(), Delivery::Withdrawn);
        tx.close();

        // the withdrawn item sits in the buffer but must not surface
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_send_after_cancel_never_reaches_buffer() {
        let (tx, rx) = handoff::<i32>();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(tx.send(&cancel, 1).await.unwrap(), Delivery::Withdrawn);
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_send_without_receivers_fails() {
        let (tx, rx) = handoff::<i32>();
        drop(rx);

        let cancel = CancellationToken::new();
        assert!(matches!(
            tx.send(&cancel, 1).await,
            Err(PoolError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_dropped_sender_closes_channel() {
        let (tx, rx) = handoff::<i32>();
        {
            let _scoped = tx;
        }
        assert_eq!(rx.recv().await, None);
    }
}
