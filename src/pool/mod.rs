pub mod channel;
pub mod config;
pub mod pool;
pub mod processor;
pub mod sink;
pub mod stats;
mod strategy;
pub mod tracker;
pub mod types;

pub use channel::{Delivery, Receiver, Sender, handoff};
pub use config::{Config, ConfigBuilder, ConfigBuilderError, Strategy};
pub use pool::Pool;
pub use processor::{Filter, Processor};
pub use sink::{ErrorSink, FailureLog};
pub use stats::RunReport;
pub use tracker::{CompletionTracker, Gauge, Participant};
pub use types::{BoxError, Decision, ItemError, ItemFailure, Outcome, PoolError};
