// src/pool/config.rs

use derive_builder::Builder;
use std::time::Duration;

use super::types::PoolError;

/// How items are scheduled onto concurrent tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// `worker_num` long-lived workers pull items from an unbuffered handoff.
    #[default]
    WorkerPool,
    /// Every item gets its own task up front; a semaphore of `worker_num`
    /// permits gates the work itself. Task count grows with the input.
    TaskPerItem,
    /// The spawning loop takes a permit before each spawn, so at most
    /// `worker_num` tasks exist, but the loop itself blocks on admission.
    GatedSpawn,
}

#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct Config {
    /// Number of items allowed in flight at once
    #[builder(default = "num_cpus::get()")]
    pub(crate) worker_num: usize,

    /// Upper bound on a single processor call
    #[builder(default)]
    pub(crate) item_timeout: Option<Duration>,

    /// Scheduling strategy
    #[builder(default)]
    pub(crate) strategy: Strategy,
}

impl ConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.worker_num {
            Some(0) => Err("worker_num must be at least 1".to_string()),
            _ => Ok(()),
        }
    }
}

impl Config {
    /// Creates a worker-pool config with `worker_num` workers and no timeout.
    pub fn new(worker_num: usize) -> Self {
        Config {
            worker_num,
            item_timeout: None,
            strategy: Strategy::WorkerPool,
        }
    }

    /// Rejects a zero-width pool.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.worker_num == 0 {
            return Err(PoolError::Configuration(
                "worker_num must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the pool width
    #[inline]
    pub fn worker_num(&self) -> usize {
        self.worker_num
    }

    /// Returns the per-item timeout, if any
    #[inline]
    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(num_cpus::get())
    }
}

impl From<ConfigBuilderError> for PoolError {
    fn from(err: ConfigBuilderError) -> Self {
        PoolError::Configuration(err.to_string())
    }
}
