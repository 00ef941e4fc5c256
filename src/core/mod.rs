//! Runtime core: registry, driver and orchestration.
//!
//! - [`registry`]: configuration-time [`RegistryBuilder`] and the frozen [`Registry`];
//! - [`driver`]: the [`Driver`] handle passed through every lifecycle call;
//! - [`orchestrator`]: runs a root handler and tears it down;
//! - [`shutdown`]: OS termination signals.

mod driver;
mod orchestrator;
mod registry;
mod shutdown;

pub use driver::Driver;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use registry::{Component, Registration, Registry, RegistryBuilder};
