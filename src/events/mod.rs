//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by resources, the orchestrator
//! and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Lifecycle::start`/`stop` (every resource), input tick loops
//!   (production failures), `Orchestrator`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the orchestrator's listener (fans out to `SubscriberSet`),
//!   and anyone holding a `Driver` who calls `bus().subscribe()`.
//!
//! The bus is separate from [`Channel`](crate::Channel): channels carry samples
//! synchronously on the driver thread, the bus carries observability events
//! asynchronously to subscribers.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
