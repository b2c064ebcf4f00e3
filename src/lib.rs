//! # bounded-pool
//!
//! Bounded-parallelism task execution on Tokio: a fixed set of workers
//! pulls items through an unbuffered handoff, so at most `worker_num`
//! items are in flight no matter how many the source produces.
//!
//! ## Features
//!
//! - **Fixed-width worker pool** fed by a single producer
//! - **Backpressure** via a capacity-0 handoff channel
//! - **Per-item filtering** that never shrinks the pool
//! - **Failure isolation**: errors, panics and timeouts stay with their item
//!   and can be collected through an [`ErrorSink`](pool::ErrorSink)
//! - **Graceful cancellation** through a `CancellationToken`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bounded_pool::pool::{ConfigBuilder, Decision, FailureLog, Pool};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Arc::new(ConfigBuilder::default().worker_num(4usize).build()?);
//! let failures = FailureLog::new();
//! let pool = Pool::new(config)?
//!     .with_filter(|n: &i32| Decision::skip_if(n % 10 == 0))
//!     .with_error_sink(failures.clone());
//!
//! let report = pool
//!     .run(&CancellationToken::new(), 1..=20, |_: &CancellationToken, n: &i32| {
//!         let n = *n;
//!         async move {
//!             println!("{n} squared is {}", n * n);
//!             Ok(())
//!         }
//!     })
//!     .await?;
//! assert_eq!(report.processed, 18);
//! ```
//!
//! ## Modules
//!
//! - [`pool`] - Worker pool, handoff channel, completion tracking and error sinks

pub mod pool;
