//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the orchestrator and its driver.
//!
//! Config is used in two ways:
//! 1. **Orchestrator creation**: `Orchestrator::builder(config)`
//! 2. **Manual driving**: `Driver::new(&config)` when resources are started by hand
//!
//! ## Sentinel values
//! - `max_workers = 0` → unbounded (no worker semaphore created)

use std::time::Duration;

/// Global configuration for the erie runtime.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `max_workers`: Concurrent offloaded productions (`0` = unbounded)
/// - `grace`: Maximum wait for event subscribers to drain after teardown
/// - `handle_signals`: Whether OS termination signals end a run
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Maximum number of producer calls running on the blocking pool at once.
    ///
    /// - `0` = unbounded (no semaphore)
    /// - `n > 0` = at most `n` offloaded productions in flight
    ///
    /// Only producers that opt into offloading use the pool.
    pub max_workers: usize,

    /// Maximum time to wait for event subscribers to drain at the end of a run.
    pub grace: Duration,

    /// Whether SIGINT/SIGTERM/SIGQUIT (Ctrl-C on Windows) request shutdown.
    pub handle_signals: bool,
}

impl Config {
    /// Returns the worker pool bound as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` concurrent offloaded productions
    #[inline]
    pub fn worker_limit(&self) -> Option<usize> {
        if self.max_workers == 0 {
            None
        } else {
            Some(self.max_workers)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `max_workers = 0` (unbounded)
    /// - `grace = 5s`
    /// - `handle_signals = true`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            max_workers: 0,
            grace: Duration::from_secs(5),
            handle_signals: true,
        }
    }
}
