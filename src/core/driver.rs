//! # Driver: what a resource needs from the runtime while it is active.
//!
//! The driver thread itself is the `LocalSet` the orchestrator runs on. [`Driver`] is
//! the handle passed into every `start`/`stop` so resources can reach:
//! - the event [`Bus`] (lifecycle and production events);
//! - the bounded worker pool for offloaded production (`Config::max_workers`).
//!
//! It is cheap to clone and carries no global state; tests build one directly.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::{config::Config, events::Bus};

/// Runtime handle threaded through lifecycle calls.
#[derive(Clone, Debug)]
pub struct Driver {
    bus: Bus,
    workers: Option<Arc<Semaphore>>,
}

impl Driver {
    /// Creates a driver with a fresh bus and worker pool sized from `cfg`.
    pub fn new(cfg: &Config) -> Self {
        Self::with_bus(cfg, Bus::new(cfg.bus_capacity_clamped()))
    }

    /// Creates a driver publishing on an existing bus.
    pub fn with_bus(cfg: &Config, bus: Bus) -> Self {
        Self {
            bus,
            workers: cfg.worker_limit().map(Semaphore::new).map(Arc::new),
        }
    }

    /// Event bus shared by all resources of this driver.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Worker pool limiter (`None` = unbounded).
    pub(crate) fn workers(&self) -> Option<&Arc<Semaphore>> {
        self.workers.as_ref()
    }
}
