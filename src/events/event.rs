//! # Runtime events emitted by resources and the orchestrator.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: a resource finished its Start or Stop hook sequence
//! - **Production events**: a tick failed and was skipped
//! - **Run events**: orchestrator milestones and subscriber health
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! resource path and kind, and a human-readable reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use erie::{Event, EventKind, Kind};
//!
//! let ev = Event::new(EventKind::ProductionFailed)
//!     .with_resource("root/light")
//!     .with_resource_kind(Kind::Input)
//!     .with_reason("sensor offline");
//!
//! assert_eq!(ev.kind, EventKind::ProductionFailed);
//! assert_eq!(ev.resource.as_deref(), Some("root/light"));
//! assert_eq!(ev.reason.as_deref(), Some("sensor offline"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::resources::Kind;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `resource`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `resource`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Lifecycle events ===
    /// Resource became active and ran its whole activation sequence.
    ///
    /// Sets:
    /// - `resource`: resource path
    /// - `resource_kind`: input / output / handler
    ResourceStarted,

    /// Resource became inactive and ran its whole deactivation sequence.
    ///
    /// Sets:
    /// - `resource`: resource path
    /// - `resource_kind`: input / output / handler
    ResourceStopped,

    // === Production events ===
    /// One tick of an input failed; the sample was skipped.
    ///
    /// Sets:
    /// - `resource`: input path
    /// - `resource_kind`: input
    /// - `reason`: production error message
    ProductionFailed,

    // === Run events ===
    /// Root handler is active; the run clock started.
    ///
    /// Sets:
    /// - `resource`: root path
    RunStarted,

    /// Run is ending (duration elapsed, OS signal, or shutdown handle).
    ///
    /// Sets:
    /// - `reason`: `elapsed`, `signal: <name>` or `external`
    ShutdownRequested,

    /// Root handler failed to deactivate cleanly.
    ///
    /// Sets:
    /// - `resource`: root path
    /// - `reason`: lifecycle error message
    TeardownFailed,

    /// Final event of a run; subscribers drain after it.
    RunFinished,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Path of the resource (or subscriber name), if applicable.
    pub resource: Option<Arc<str>>,
    /// Kind of the resource, if applicable.
    pub resource_kind: Option<Kind>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            resource: None,
            resource_kind: None,
            reason: None,
        }
    }

    /// Attaches a resource path.
    #[inline]
    pub fn with_resource(mut self, resource: impl Into<Arc<str>>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attaches a resource kind.
    #[inline]
    pub fn with_resource_kind(mut self, kind: Kind) -> Self {
        self.resource_kind = Some(kind);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_resource(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_resource(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
