//! # Resource lifecycle: two states, two transitions, ordered hooks.
//!
//! Every resource is either [`State::Inactive`] (initial) or [`State::Active`].
//!
//! ```text
//!              Start (hooks: kind.hooks(Start))
//!   Inactive ───────────────────────────────────► Active
//!      ▲                                            │
//!      └────────────────────────────────────────────┘
//!              Stop (hooks: kind.hooks(Stop))
//! ```
//!
//! ## Rules
//! - `Start` is legal only from `Inactive`, `Stop` only from `Active`;
//!   anything else fails with [`LifecycleError::InvalidTransition`] and leaves the state alone.
//! - The state flips **before** the hooks run, so a hook observes its own resource as
//!   already in the target state.
//! - Hook sequences are static data attached to each [`Kind`]; a resource only decides
//!   *how* to run a hook, never *which* hooks run or in what order.
//! - `Start` hooks are fail-fast; `Stop` hooks all run and the first failure is returned.
//! - A `ResourceStarted`/`ResourceStopped` event is published once the sequence is done.

use std::cell::Cell;
use std::fmt;

use tracing::{debug, warn};

use crate::core::Driver;
use crate::error::LifecycleError;
use crate::events::{Event, EventKind};

/// Lifecycle state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Not participating in the dataflow (initial).
    #[default]
    Inactive,
    /// Producing, consuming, or coordinating.
    Active,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Inactive => "inactive",
            State::Active => "active",
        })
    }
}

/// A lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
}

impl Transition {
    /// State the transition is legal from.
    pub const fn from(self) -> State {
        match self {
            Transition::Start => State::Inactive,
            Transition::Stop => State::Active,
        }
    }

    /// State the transition leads to.
    pub const fn to(self) -> State {
        match self {
            Transition::Start => State::Active,
            Transition::Stop => State::Inactive,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transition::Start => "start",
            Transition::Stop => "stop",
        })
    }
}

/// The three resource kinds of a dataflow tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Input,
    Output,
    Handler,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Input => "input",
            Kind::Output => "output",
            Kind::Handler => "handler",
        })
    }
}

/// A single step of an activation or deactivation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// Input: arm the periodic timer.
    ArmTimer,
    /// Input: cancel the pending timer.
    CancelTimer,
    /// Output: let the device prepare itself.
    ActivateDevice,
    /// Output: let the device release itself.
    DeactivateDevice,
    /// Handler: start nested handlers.
    StartHandlers,
    /// Handler: start nested outputs.
    StartOutputs,
    /// Handler: bind nested inputs to slots and update hooks (first activation only).
    WireInputs,
    /// Handler: start nested inputs.
    StartInputs,
    /// Handler: stop nested inputs.
    StopInputs,
    /// Handler: stop nested outputs.
    StopOutputs,
    /// Handler: stop nested handlers.
    StopHandlers,
}

const INPUT_START: &[Hook] = &[Hook::ArmTimer];
const INPUT_STOP: &[Hook] = &[Hook::CancelTimer];
const OUTPUT_START: &[Hook] = &[Hook::ActivateDevice];
const OUTPUT_STOP: &[Hook] = &[Hook::DeactivateDevice];
const HANDLER_START: &[Hook] = &[
    Hook::StartHandlers,
    Hook::StartOutputs,
    Hook::WireInputs,
    Hook::StartInputs,
];
const HANDLER_STOP: &[Hook] = &[Hook::StopInputs, Hook::StopOutputs, Hook::StopHandlers];

impl Kind {
    /// Ordered hook sequence this kind runs for `transition`.
    pub const fn hooks(self, transition: Transition) -> &'static [Hook] {
        match (self, transition) {
            (Kind::Input, Transition::Start) => INPUT_START,
            (Kind::Input, Transition::Stop) => INPUT_STOP,
            (Kind::Output, Transition::Start) => OUTPUT_START,
            (Kind::Output, Transition::Stop) => OUTPUT_STOP,
            (Kind::Handler, Transition::Start) => HANDLER_START,
            (Kind::Handler, Transition::Stop) => HANDLER_STOP,
        }
    }
}

/// Per-resource state cell.
///
/// Lives on the driver thread; a plain [`Cell`] is enough.
#[derive(Debug, Default)]
pub struct StateMachine {
    state: Cell<State>,
}

impl StateMachine {
    /// Creates a machine in [`State::Inactive`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state.get()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state.get() == State::Active
    }

    /// Applies `transition` if legal; otherwise returns the error and keeps the state.
    pub fn apply(&self, transition: Transition, resource: &str) -> Result<(), LifecycleError> {
        let current = self.state.get();
        if current != transition.from() {
            return Err(LifecycleError::InvalidTransition {
                resource: resource.to_string(),
                transition,
                state: current,
            });
        }
        self.state.set(transition.to());
        Ok(())
    }
}

/// Uniform Start/Stop surface shared by inputs, outputs and handlers.
///
/// Implementors provide identity, the state cell and [`Lifecycle::run_hook`];
/// the transition algorithm itself lives in the provided methods.
pub trait Lifecycle {
    /// Resource kind; selects the hook sequences.
    fn kind(&self) -> Kind;

    /// Registration name (last path segment).
    fn name(&self) -> &str;

    /// Position in the tree, e.g. `root/lights/sensor`.
    fn path(&self) -> &str;

    /// The resource's state cell.
    fn machine(&self) -> &StateMachine;

    /// Executes one hook of this resource's sequence.
    fn run_hook(&self, hook: Hook, driver: &Driver) -> Result<(), LifecycleError>;

    /// Current state.
    fn state(&self) -> State {
        self.machine().state()
    }

    /// `Inactive → Active`, then the activation hooks in order.
    fn start(&self, driver: &Driver) -> Result<(), LifecycleError> {
        transition(self, Transition::Start, driver)
    }

    /// `Active → Inactive`, then the deactivation hooks in order.
    fn stop(&self, driver: &Driver) -> Result<(), LifecycleError> {
        transition(self, Transition::Stop, driver)
    }
}

fn transition<R: Lifecycle + ?Sized>(
    resource: &R,
    transition: Transition,
    driver: &Driver,
) -> Result<(), LifecycleError> {
    resource.machine().apply(transition, resource.path())?;
    debug!(resource = resource.path(), kind = %resource.kind(), %transition, "transition accepted");

    let mut first_err = None;
    for &hook in resource.kind().hooks(transition) {
        if let Err(e) = resource.run_hook(hook, driver) {
            match transition {
                Transition::Start => return Err(e),
                Transition::Stop => {
                    warn!(resource = resource.path(), ?hook, error = %e, "deactivation hook failed");
                    first_err.get_or_insert(e);
                }
            }
        }
    }

    let kind = match transition {
        Transition::Start => EventKind::ResourceStarted,
        Transition::Stop => EventKind::ResourceStopped,
    };
    driver.bus().publish(
        Event::new(kind)
            .with_resource(resource.path())
            .with_resource_kind(resource.kind()),
    );

    first_err.map_or(Ok(()), Err)
}
