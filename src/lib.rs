//! # erie
//!
//! **Erie** runs reactive dataflow trees: periodic **inputs** publish samples, **handlers**
//! react to them, and **outputs** act on the result. Every participant follows the same
//! two-state lifecycle and the whole tree is started and stopped in dependency order.
//!
//! ## Architecture
//! ```text
//!                        ┌──────────────────────────────────────┐
//!   Orchestrator::run ──►│ root Handler                         │
//!                        │  Registry                            │
//!                        │   ├─ handlers ─► nested Handler ...  │
//!                        │   ├─ outputs  ─► OutputResource      │
//!                        │   └─ inputs   ─► InputResource       │
//!                        └──────────────────────────────────────┘
//!
//! InputResource tick ──► produce() ──► Channel::publish(Sample)
//!                                          │ (synchronous, subscription order)
//!                                          ▼
//!                               Handler slot["K"] = sample
//!                               Handler hook "K updated"(scope, sample)
//!                                          │
//!                                          ▼
//!                               scope.transmit("out", sample) ──► Transmit device
//! ```
//!
//! ### Lifecycle
//! ```text
//!   Inactive ──Start──► Active ──Stop──► Inactive
//!
//!   Handler start:  nested handlers ─► outputs ─► wire inputs ─► inputs
//!   Handler stop:   inputs ─► outputs ─► nested handlers
//! ```
//!
//! ### Threading
//! All timers, channel deliveries, slot updates and hooks run on one driver thread
//! (a tokio `LocalSet`). Producers that opt into offloading run on the blocking pool,
//! bounded by [`Config::max_workers`]; their results are published back on the
//! driver thread, and only while the input is still active.
//!
//! ### Observability
//! Lifecycle and production events are published on a [`Bus`] and fanned out to
//! [`Subscribe`] implementations through a [`SubscriberSet`].
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use erie::{Config, Handler, Orchestrator, OutputResource, ProduceFn, Sample, TransmitFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let root = Handler::builder()
//!         .on_update("light", |scope, sample| {
//!             if sample.value > 0.5 {
//!                 let _ = scope.transmit("lamp", sample);
//!             }
//!         })
//!         .specify(|reg| {
//!             reg.add_input("light", 10.0, ProduceFn::new(|| Ok(0.8)))?;
//!             reg.register_output("lamp", OutputResource::new(TransmitFn::new(|s: &Sample| {
//!                 println!("{} -> {}", s.source, s.value);
//!             })))?;
//!             Ok(())
//!         })?
//!         .build("root");
//!
//!     let cfg = Config { handle_signals: false, ..Config::default() };
//!     Orchestrator::new(cfg)
//!         .run(root, Some(Duration::from_millis(250)))
//!         .await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod resources;
mod subscribers;

// ---- Public re-exports ----

pub use crate::config::Config;
pub use crate::core::{
    Component, Driver, Orchestrator, OrchestratorBuilder, Registration, Registry, RegistryBuilder,
};
pub use crate::error::{
    ConfigurationError, DeviceError, LifecycleError, ProductionError, RuntimeError,
};
pub use crate::events::{Bus, Event, EventKind};
pub use crate::resources::{
    updated_hook_name, Channel, Handler, HandlerBuilder, Hook, InputResource, Kind, Lifecycle,
    OutputResource, Produce, ProduceFn, Resource, Sample, Scope, State, StateMachine, Transition,
    Transmit, TransmitFn, UpdateHook,
};
pub use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};
