//! # Event subscribers for the erie runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and a built-in [`LogWriter`] for events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Resource ── publish(Event) ──► Bus ──► Orchestrator listener ──► SubscriberSet::emit
//!                                                                       │
//!                                                        ┌──────────────┼──────────────┐
//!                                                        ▼              ▼              ▼
//!                                                    LogWriter       Metrics        Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use erie::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::ProductionFailed {
//!             // increment failure counter
//!         }
//!     }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
