// src/pool/processor.rs

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::types::{BoxError, Decision};

/// The work applied to each item that passes the filter.
///
/// `cancel` fires when the run is cancelled; long-running processors should
/// check it at safe points and return early.
#[async_trait]
pub trait Processor<T>: Send + Sync {
    async fn process(&self, cancel: &CancellationToken, item: &T) -> Result<(), BoxError>;
}

#[async_trait]
impl<T, F, Fut> Processor<T> for F
where
    F: Fn(&CancellationToken, &T) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<(), BoxError>> + Send,
    T: Send + Sync,
{
    async fn process(&self, cancel: &CancellationToken, item: &T) -> Result<(), BoxError> {
        self(cancel, item).await
    }
}

/// Decides, per item, whether the processor runs at all.
pub trait Filter<T>: Send + Sync {
    fn decide(&self, item: &T) -> Decision;
}

impl<T, F> Filter<T> for F
where
    F: Fn(&T) -> Decision + Send + Sync,
{
    fn decide(&self, item: &T) -> Decision {
        self(item)
    }
}
