//! Dataflow resources: inputs, outputs and handlers.
//!
//! All three share the [`Lifecycle`] contract; [`Resource`] is the tagged variant used
//! wherever a resource is handled without knowing its kind.
//!
//! - [`lifecycle`]: states, transitions and per-kind hook sequences;
//! - [`channel`]: synchronous multicast from an input to its subscribers;
//! - [`input`]: periodic producers;
//! - [`output`]: consumers with a control surface;
//! - [`handler`]: composites owning a nested registry, with slots and update hooks.

mod channel;
mod handler;
mod input;
mod lifecycle;
mod output;

use std::rc::Rc;

pub use channel::Channel;
pub use handler::{updated_hook_name, Handler, HandlerBuilder, Scope, UpdateHook};
pub use input::{InputResource, Produce, ProduceFn, Sample};
pub use lifecycle::{Hook, Kind, Lifecycle, State, StateMachine, Transition};
pub use output::{OutputResource, Transmit, TransmitFn};

use crate::core::Driver;
use crate::error::LifecycleError;

/// Any resource of a registry.
#[derive(Clone, Debug)]
pub enum Resource {
    Input(Rc<InputResource>),
    Output(Rc<OutputResource>),
    Handler(Rc<Handler>),
}

impl Resource {
    fn as_lifecycle(&self) -> &dyn Lifecycle {
        match self {
            Resource::Input(r) => &**r,
            Resource::Output(r) => &**r,
            Resource::Handler(r) => &**r,
        }
    }
}

impl Lifecycle for Resource {
    fn kind(&self) -> Kind {
        self.as_lifecycle().kind()
    }

    fn name(&self) -> &str {
        self.as_lifecycle().name()
    }

    fn path(&self) -> &str {
        self.as_lifecycle().path()
    }

    fn machine(&self) -> &StateMachine {
        self.as_lifecycle().machine()
    }

    fn run_hook(&self, hook: Hook, driver: &Driver) -> Result<(), LifecycleError> {
        self.as_lifecycle().run_hook(hook, driver)
    }
}
