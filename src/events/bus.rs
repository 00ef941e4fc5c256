//! # Runtime event bus.
//!
//! [`Bus`] carries lifecycle, production and run events from the driver thread to
//! observers. Resources reach it through the [`Driver`](crate::Driver); the
//! orchestrator listens on it for the length of one run.
//!
//! ```text
//! tick loops, transitions, orchestrator ──► Bus ──► run listener ──► SubscriberSet
//!                                            └────► ad-hoc receivers (tests, tools)
//! ```
//!
//! The run listener subscribes before `RunStarted` and exits after forwarding
//! `RunFinished`, so a run's events are seen in publish order from first to last.
//! Events published while no receiver exists are dropped. A listener that falls
//! more than `Config::bus_capacity` events behind logs how many it skipped and
//! resumes with the newest.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Shared by every resource through the [`Driver`](crate::Driver); tick loops,
/// lifecycle transitions and the orchestrator all publish here.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately, even on the driver thread.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: clones share one sender.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given ring capacity (clamped to at least 1).
    ///
    /// Capacity is shared across all receivers; laggards observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    ///
    /// Dropped silently when nobody listens.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver for events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
