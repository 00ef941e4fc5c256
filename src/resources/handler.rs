//! # Handler: a composite resource owning a nested registry.
//!
//! A handler coordinates the inputs, outputs and handlers registered beneath it.
//!
//! ```text
//! start:  StartHandlers ─► StartOutputs ─► WireInputs ─► StartInputs
//! stop:   StopInputs    ─► StopOutputs  ─► StopHandlers
//! ```
//!
//! ## Wiring
//! On the first activation, for every input `K` of its own registry the handler:
//! - creates slot `K` (empty until the first sample);
//! - resolves the update hook `"K updated"` (or the fallback hook) once;
//! - subscribes to `K`'s channel with a callback that stores the sample in slot `K`
//!   and then calls the resolved hook with a [`Scope`].
//!
//! Outputs are reached by name through the [`Scope`]. Wiring is never repeated:
//! a restarted handler keeps its subscriptions and its last slot values.
//!
//! ## Rules
//! - Start cascades are fail-fast and wrap the child's error in
//!   [`LifecycleError::Cascade`]; the handler itself stays active and can be stopped.
//! - Stop cascades ask every active child to stop and return the first failure.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{Driver, Registry, RegistryBuilder};
use crate::error::{ConfigurationError, LifecycleError};
use crate::resources::input::Sample;
use crate::resources::lifecycle::{Hook, Kind, Lifecycle, StateMachine, Transition};
use crate::resources::output::OutputResource;

/// Callback run when an input of the handler publishes.
pub type UpdateHook = Rc<dyn Fn(&Scope<'_>, &Sample)>;

/// Conventional hook name for updates of `input`.
///
/// ```
/// assert_eq!(erie::updated_hook_name("light"), "light updated");
/// ```
pub fn updated_hook_name(input: &str) -> String {
    format!("{input} updated")
}

/// What an update hook can see and touch.
pub struct Scope<'a> {
    inner: &'a Inner,
    input: &'a str,
}

impl<'a> Scope<'a> {
    /// Path of the handler running the hook.
    pub fn handler(&self) -> &str {
        &self.inner.path
    }

    /// Name of the input whose publish triggered the hook.
    pub fn input(&self) -> &str {
        self.input
    }

    /// Latest value seen on input `name`.
    pub fn slot(&self, name: &str) -> Option<f64> {
        self.inner.slot(name).map(|s| s.value)
    }

    /// Latest sample seen on input `name`.
    pub fn sample(&self, name: &str) -> Option<Sample> {
        self.inner.slot(name)
    }

    /// Output registered as `name` in the handler's registry.
    pub fn output(&self, name: &str) -> Option<&'a OutputResource> {
        self.inner.registry.output(name).map(|o| &**o)
    }

    /// All outputs of the handler, in registration order.
    pub fn outputs(&self) -> impl Iterator<Item = (&'a str, &'a OutputResource)> {
        self.inner.registry.outputs().map(|(n, o)| (n, &**o))
    }

    /// Transmits `sample` on output `name`.
    pub fn transmit(&self, name: &str, sample: &Sample) -> Result<(), LifecycleError> {
        match self.output(name) {
            Some(output) => output.transmit(sample),
            None => Err(LifecycleError::UnknownOutput {
                resource: self.inner.path.to_string(),
                output: name.to_string(),
            }),
        }
    }
}

/// Configuration-time form of a [`Handler`]: hooks plus a mutable registry.
#[derive(Default)]
pub struct HandlerBuilder {
    registry: RegistryBuilder,
    hooks: HashMap<String, UpdateHook>,
    fallback: Option<UpdateHook>,
}

impl HandlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hook for updates of input `input` (stored as `"<input> updated"`).
    pub fn on_update<F>(self, input: &str, hook: F) -> Self
    where
        F: Fn(&Scope<'_>, &Sample) + 'static,
    {
        self.on(updated_hook_name(input), hook)
    }

    /// Sets the hook called `name`, replacing any previous one.
    pub fn on<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&Scope<'_>, &Sample) + 'static,
    {
        self.hooks.insert(name.into(), Rc::new(hook));
        self
    }

    /// Sets the hook for inputs that have no hook of their own.
    pub fn fallback<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Scope<'_>, &Sample) + 'static,
    {
        self.fallback = Some(Rc::new(hook));
        self
    }

    /// Populates the handler's registry; stops at the first configuration error.
    pub fn specify<F>(mut self, populate: F) -> Result<Self, ConfigurationError>
    where
        F: FnOnce(&mut RegistryBuilder) -> Result<(), ConfigurationError>,
    {
        populate(&mut self.registry)?;
        Ok(self)
    }

    /// The handler's registry, still open for registration.
    pub fn registry_mut(&mut self) -> &mut RegistryBuilder {
        &mut self.registry
    }

    /// Freezes the tree into a root handler named `name`.
    pub fn build(self, name: &str) -> Handler {
        self.build_at(name, name.to_string())
    }

    pub(crate) fn build_at(self, name: &str, path: String) -> Handler {
        let registry = self.registry.freeze(&path);
        Handler {
            name: Arc::from(name),
            machine: StateMachine::new(),
            wired: Cell::new(false),
            inner: Rc::new(Inner {
                path: Arc::from(path),
                registry,
                hooks: self.hooks,
                fallback: self.fallback,
                slots: RefCell::new(HashMap::new()),
            }),
        }
    }
}

impl fmt::Debug for HandlerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBuilder")
            .field("registry", &self.registry)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// State reachable from channel callbacks.
struct Inner {
    path: Arc<str>,
    registry: Registry,
    hooks: HashMap<String, UpdateHook>,
    fallback: Option<UpdateHook>,
    slots: RefCell<HashMap<Arc<str>, Option<Sample>>>,
}

impl Inner {
    fn slot(&self, name: &str) -> Option<Sample> {
        self.slots.borrow().get(name).cloned().flatten()
    }

    /// Hook names no registered input resolves to, sorted.
    fn unresolved_hooks(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .hooks
            .keys()
            .filter(|hook| {
                !self
                    .registry
                    .inputs()
                    .any(|(name, _)| **hook == updated_hook_name(name))
            })
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    fn deliver(&self, input: &str, hook: Option<&UpdateHook>, sample: &Sample) {
        if let Some(slot) = self.slots.borrow_mut().get_mut(input) {
            *slot = Some(sample.clone());
        }
        if let Some(hook) = hook {
            hook(&Scope { inner: self, input }, sample);
        }
    }
}

/// Composite resource coordinating a nested [`Registry`].
pub struct Handler {
    name: Arc<str>,
    machine: StateMachine,
    wired: Cell<bool>,
    inner: Rc<Inner>,
}

impl Handler {
    /// Starts configuring a handler with no hooks.
    pub fn builder() -> HandlerBuilder {
        HandlerBuilder::new()
    }

    /// A handler transmitting every sample of every input to all of its outputs.
    pub fn relay() -> HandlerBuilder {
        HandlerBuilder::new().fallback(|scope, sample| {
            for (name, output) in scope.outputs() {
                if let Err(e) = output.transmit(sample) {
                    warn!(handler = scope.handler(), output = name, error = %e, "relay transmit failed");
                }
            }
        })
    }

    /// The handler's own registry.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Latest value delivered by input `name`; `None` before the first delivery.
    pub fn slot(&self, name: &str) -> Option<f64> {
        self.inner.slot(name).map(|s| s.value)
    }

    /// Latest sample delivered by input `name`.
    pub fn slot_sample(&self, name: &str) -> Option<Sample> {
        self.inner.slot(name)
    }

    /// Whether the inputs have been wired (first activation happened).
    pub fn is_wired(&self) -> bool {
        self.wired.get()
    }

    fn wire_inputs(&self) {
        if self.wired.replace(true) {
            return;
        }
        let inner = &self.inner;
        for (name, input) in inner.registry.inputs() {
            let key: Arc<str> = Arc::from(name);
            inner.slots.borrow_mut().insert(key.clone(), None);

            let hook = inner
                .hooks
                .get(&updated_hook_name(name))
                .or(inner.fallback.as_ref())
                .cloned();
            let weak = Rc::downgrade(inner);
            input.subscribe(move |sample| {
                if let Some(inner) = weak.upgrade() {
                    inner.deliver(&key, hook.as_ref(), sample);
                }
            });
        }
        for hook in inner.unresolved_hooks() {
            warn!(resource = %inner.path, hook, "hook matches no registered input and will never run");
        }
        debug!(resource = %inner.path, slots = inner.slots.borrow().len(), "inputs wired");
    }

    fn start_children(&self, kind: Kind, driver: &Driver) -> Result<(), LifecycleError> {
        for child in self.inner.registry.resources(kind) {
            child
                .start(driver)
                .map_err(|e| self.cascade(Transition::Start, e))?;
        }
        Ok(())
    }

    fn stop_children(&self, kind: Kind, driver: &Driver) -> Result<(), LifecycleError> {
        let mut first_err = None;
        for child in self.inner.registry.resources(kind) {
            if !child.machine().is_active() {
                debug!(resource = child.path(), "child already inactive");
                continue;
            }
            if let Err(e) = child.stop(driver) {
                warn!(resource = child.path(), error = %e, "child failed to stop");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), |e| Err(self.cascade(Transition::Stop, e)))
    }

    fn cascade(&self, transition: Transition, source: LifecycleError) -> LifecycleError {
        LifecycleError::Cascade {
            resource: self.inner.path.to_string(),
            transition,
            source: Box::new(source),
        }
    }
}

impl Lifecycle for Handler {
    fn kind(&self) -> Kind {
        Kind::Handler
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.inner.path
    }

    fn machine(&self) -> &StateMachine {
        &self.machine
    }

    fn run_hook(&self, hook: Hook, driver: &Driver) -> Result<(), LifecycleError> {
        match hook {
            Hook::StartHandlers => self.start_children(Kind::Handler, driver),
            Hook::StartOutputs => self.start_children(Kind::Output, driver),
            Hook::WireInputs => {
                self.wire_inputs();
                Ok(())
            }
            Hook::StartInputs => self.start_children(Kind::Input, driver),
            Hook::StopInputs => self.stop_children(Kind::Input, driver),
            Hook::StopOutputs => self.stop_children(Kind::Output, driver),
            Hook::StopHandlers => self.stop_children(Kind::Handler, driver),
            other => {
                debug!(resource = %self.inner.path, hook = ?other, "hook not applicable to handlers");
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("path", &self.inner.path)
            .field("state", &self.machine.state())
            .field("registry", &self.inner.registry)
            .finish()
    }
}
