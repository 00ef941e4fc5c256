//! # Registry: named, category-partitioned resource table.
//!
//! Configuration happens on a mutable [`RegistryBuilder`]; the run uses the frozen
//! [`Registry`] produced when the enclosing handler is built.
//!
//! ```text
//! RegistryBuilder                         Registry (read-only)
//!   register_input("light", ..)   ──►       inputs   [light → root/light]
//!   register_output("led", ..)    freeze    outputs  [led   → root/led]
//!   register_handler_with("sub", ..)        handlers [sub   → root/sub ──► nested Registry]
//! ```
//!
//! ## Rules
//! - Names are unique per registry and per category; registering a taken name
//!   replaces the previous entry in place and reports [`Registration::Replaced`].
//! - The same name may appear in different categories.
//! - Names must be non-empty and must not contain `/` (the path separator).
//! - Entries keep registration order; activation follows it.
//! - A failed registration leaves the registry untouched.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ConfigurationError;
use crate::resources::{
    Handler, HandlerBuilder, InputResource, Kind, OutputResource, Produce, Resource,
};

/// A resource offered to a registration call, tagged by kind.
pub enum Component {
    Input(InputResource),
    Output(OutputResource),
    Handler(HandlerBuilder),
}

impl Component {
    /// Kind of the wrapped resource.
    pub fn kind(&self) -> Kind {
        match self {
            Component::Input(_) => Kind::Input,
            Component::Output(_) => Kind::Output,
            Component::Handler(_) => Kind::Handler,
        }
    }
}

impl From<InputResource> for Component {
    fn from(input: InputResource) -> Self {
        Component::Input(input)
    }
}

impl From<OutputResource> for Component {
    fn from(output: OutputResource) -> Self {
        Component::Output(output)
    }
}

impl From<HandlerBuilder> for Component {
    fn from(handler: HandlerBuilder) -> Self {
        Component::Handler(handler)
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The name was free.
    Inserted,
    /// The name was taken; the previous entry was replaced.
    Replaced,
}

/// Mutable registry used during configuration.
#[derive(Default)]
pub struct RegistryBuilder {
    inputs: Vec<(String, InputResource)>,
    outputs: Vec<(String, OutputResource)>,
    handlers: Vec<(String, HandlerBuilder)>,
}

impl RegistryBuilder {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an input under `name`.
    ///
    /// Fails with [`ConfigurationError::CapabilityMismatch`] if `component` is not an input.
    pub fn register_input(
        &mut self,
        name: &str,
        component: impl Into<Component>,
    ) -> Result<Registration, ConfigurationError> {
        validate_name(name)?;
        match component.into() {
            Component::Input(mut input) => {
                input.assign_name(name);
                Ok(upsert(&mut self.inputs, Kind::Input, name, input))
            }
            other => Err(mismatch(name, Kind::Input, other.kind())),
        }
    }

    /// Builds an input from `frequency` and `producer` and registers it under `name`.
    ///
    /// An invalid frequency fails the call and nothing is registered.
    pub fn add_input(
        &mut self,
        name: &str,
        frequency: f64,
        producer: impl Produce,
    ) -> Result<Registration, ConfigurationError> {
        validate_name(name)?;
        let input = InputResource::new(frequency, producer)?;
        self.register_input(name, input)
    }

    /// Registers an output under `name`.
    pub fn register_output(
        &mut self,
        name: &str,
        component: impl Into<Component>,
    ) -> Result<Registration, ConfigurationError> {
        validate_name(name)?;
        match component.into() {
            Component::Output(mut output) => {
                output.assign_name(name);
                Ok(upsert(&mut self.outputs, Kind::Output, name, output))
            }
            other => Err(mismatch(name, Kind::Output, other.kind())),
        }
    }

    /// Registers a handler under `name`.
    pub fn register_handler(
        &mut self,
        name: &str,
        component: impl Into<Component>,
    ) -> Result<Registration, ConfigurationError> {
        self.register_handler_with(name, component, |_| Ok(()))
    }

    /// Registers a handler under `name` after letting `nested` populate its own registry.
    ///
    /// If `nested` fails, its error is returned and the handler is not registered.
    ///
    /// # Example
    /// ```
    /// use erie::{Handler, ProduceFn, RegistryBuilder};
    ///
    /// let mut reg = RegistryBuilder::new();
    /// reg.register_handler_with("lights", Handler::relay(), |lights| {
    ///     lights.add_input("sensor", 1.0, ProduceFn::new(|| Ok(0.3)))?;
    ///     Ok(())
    /// })
    /// .unwrap();
    /// assert_eq!(reg.len(), 1);
    /// ```
    pub fn register_handler_with<F>(
        &mut self,
        name: &str,
        component: impl Into<Component>,
        nested: F,
    ) -> Result<Registration, ConfigurationError>
    where
        F: FnOnce(&mut RegistryBuilder) -> Result<(), ConfigurationError>,
    {
        validate_name(name)?;
        match component.into() {
            Component::Handler(mut handler) => {
                nested(handler.registry_mut())?;
                Ok(upsert(&mut self.handlers, Kind::Handler, name, handler))
            }
            other => Err(mismatch(name, Kind::Handler, other.kind())),
        }
    }

    /// Total number of registered resources across categories.
    pub fn len(&self) -> usize {
        self.inputs.len() + self.outputs.len() + self.handlers.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `name` is taken in the `kind` category.
    pub fn contains(&self, kind: Kind, name: &str) -> bool {
        match kind {
            Kind::Input => self.inputs.iter().any(|(n, _)| n == name),
            Kind::Output => self.outputs.iter().any(|(n, _)| n == name),
            Kind::Handler => self.handlers.iter().any(|(n, _)| n == name),
        }
    }

    /// Freezes the registry, assigning `prefix/name` paths down the whole subtree.
    pub(crate) fn freeze(self, prefix: &str) -> Registry {
        let child = |name: &str| format!("{prefix}/{name}");

        let inputs = self
            .inputs
            .into_iter()
            .map(|(name, mut input)| {
                input.assign_path(child(&name));
                (Arc::<str>::from(name), Rc::new(input))
            })
            .collect();
        let outputs = self
            .outputs
            .into_iter()
            .map(|(name, mut output)| {
                output.assign_path(child(&name));
                (Arc::<str>::from(name), Rc::new(output))
            })
            .collect();
        let handlers = self
            .handlers
            .into_iter()
            .map(|(name, builder)| {
                let handler = builder.build_at(&name, child(&name));
                (Arc::<str>::from(name), Rc::new(handler))
            })
            .collect();

        Registry {
            inputs,
            outputs,
            handlers,
        }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("inputs", &names_of(&self.inputs))
            .field("outputs", &names_of(&self.outputs))
            .field("handlers", &names_of(&self.handlers))
            .finish()
    }
}

fn names_of<T>(entries: &[(String, T)]) -> Vec<&str> {
    entries.iter().map(|(n, _)| n.as_str()).collect()
}

fn validate_name(name: &str) -> Result<(), ConfigurationError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.contains('/') {
        "name contains '/'"
    } else {
        return Ok(());
    };
    Err(ConfigurationError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

fn mismatch(name: &str, expected: Kind, found: Kind) -> ConfigurationError {
    ConfigurationError::CapabilityMismatch {
        name: name.to_string(),
        expected,
        found,
    }
}

fn upsert<T>(entries: &mut Vec<(String, T)>, kind: Kind, name: &str, value: T) -> Registration {
    match entries.iter_mut().find(|(n, _)| n == name) {
        Some(entry) => {
            entry.1 = value;
            warn!(%kind, name, "registration replaced an existing entry");
            Registration::Replaced
        }
        None => {
            entries.push((name.to_string(), value));
            debug!(%kind, name, "registered");
            Registration::Inserted
        }
    }
}

/// Frozen registry owned by a handler.
#[derive(Default)]
pub struct Registry {
    inputs: Vec<(Arc<str>, Rc<InputResource>)>,
    outputs: Vec<(Arc<str>, Rc<OutputResource>)>,
    handlers: Vec<(Arc<str>, Rc<Handler>)>,
}

impl Registry {
    /// Input registered as `name`.
    pub fn input(&self, name: &str) -> Option<&Rc<InputResource>> {
        lookup(&self.inputs, name)
    }

    /// Output registered as `name`.
    pub fn output(&self, name: &str) -> Option<&Rc<OutputResource>> {
        lookup(&self.outputs, name)
    }

    /// Handler registered as `name`.
    pub fn handler(&self, name: &str) -> Option<&Rc<Handler>> {
        lookup(&self.handlers, name)
    }

    /// Inputs in registration order.
    pub fn inputs(&self) -> impl Iterator<Item = (&str, &Rc<InputResource>)> {
        self.inputs.iter().map(|(n, r)| (&**n, r))
    }

    /// Outputs in registration order.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Rc<OutputResource>)> {
        self.outputs.iter().map(|(n, r)| (&**n, r))
    }

    /// Handlers in registration order.
    pub fn handlers(&self) -> impl Iterator<Item = (&str, &Rc<Handler>)> {
        self.handlers.iter().map(|(n, r)| (&**n, r))
    }

    /// All resources of one `kind`, in registration order.
    pub fn resources(&self, kind: Kind) -> Vec<Resource> {
        match kind {
            Kind::Input => self.inputs.iter().map(|(_, r)| Resource::Input(r.clone())).collect(),
            Kind::Output => self
                .outputs
                .iter()
                .map(|(_, r)| Resource::Output(r.clone()))
                .collect(),
            Kind::Handler => self
                .handlers
                .iter()
                .map(|(_, r)| Resource::Handler(r.clone()))
                .collect(),
        }
    }

    /// Total number of resources across categories.
    pub fn len(&self) -> usize {
        self.inputs.len() + self.outputs.len() + self.handlers.len()
    }

    /// Returns true if the registry holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lookup<'a, T>(entries: &'a [(Arc<str>, Rc<T>)], name: &str) -> Option<&'a Rc<T>> {
    entries.iter().find(|(n, _)| &**n == name).map(|(_, r)| r)
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("inputs", &self.inputs().map(|(n, _)| n).collect::<Vec<_>>())
            .field("outputs", &self.outputs().map(|(n, _)| n).collect::<Vec<_>>())
            .field("handlers", &self.handlers().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Lifecycle, ProduceFn, Sample, TransmitFn};

    fn sink() -> OutputResource {
        OutputResource::new(TransmitFn::new(|_: &Sample| {}))
    }

    fn constant(v: f64) -> ProduceFn<impl Fn() -> Result<f64, crate::error::ProductionError>> {
        ProduceFn::new(move || Ok(v))
    }

    #[test]
    fn test_zero_frequency_is_rejected_and_not_registered() {
        let mut reg = RegistryBuilder::new();
        let err = reg.add_input("light", 0.0, constant(1.0)).unwrap_err();

        assert_eq!(err, ConfigurationError::InvalidFrequency { frequency: 0.0 });
        assert!(reg.is_empty());
        assert!(!reg.contains(Kind::Input, "light"));
    }

    #[test]
    fn test_duplicate_name_replaces_and_reports() {
        let mut reg = RegistryBuilder::new();
        assert_eq!(
            reg.add_input("light", 1.0, constant(1.0)).unwrap(),
            Registration::Inserted
        );
        assert_eq!(
            reg.add_input("light", 4.0, constant(2.0)).unwrap(),
            Registration::Replaced
        );
        // Same name, other category.
        assert_eq!(
            reg.register_output("light", sink()).unwrap(),
            Registration::Inserted
        );
        assert_eq!(reg.len(), 2);

        let frozen = reg.freeze("root");
        assert_eq!(frozen.input("light").unwrap().frequency(), 4.0);
    }

    #[test]
    fn test_capability_mismatch() {
        let mut reg = RegistryBuilder::new();
        let err = reg.register_input("led", sink()).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::CapabilityMismatch {
                name: "led".into(),
                expected: Kind::Input,
                found: Kind::Output,
            }
        );
        let err = reg.register_output("sub", Handler::builder()).unwrap_err();
        assert_eq!(err.as_label(), "config_capability_mismatch");
        assert!(reg.is_empty());
    }

    #[test]
    fn test_invalid_names() {
        let mut reg = RegistryBuilder::new();
        for name in ["", "a/b"] {
            let err = reg.register_output(name, sink()).unwrap_err();
            assert_eq!(err.as_label(), "config_invalid_name", "{name:?}");
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn test_nested_registration_builds_paths() {
        let mut reg = RegistryBuilder::new();
        reg.register_handler_with("lights", Handler::builder(), |lights| {
            lights.add_input("sensor", 1.0, constant(0.5))?;
            lights.register_handler_with("inner", Handler::builder(), |inner| {
                inner.register_output("led", sink())?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

        let root = reg.freeze("root");
        let lights = root.handler("lights").unwrap();
        assert_eq!(lights.path(), "root/lights");
        assert_eq!(lights.name(), "lights");

        let sensor = lights.registry().input("sensor").unwrap();
        assert_eq!(sensor.path(), "root/lights/sensor");
        assert_eq!(sensor.name(), "sensor");

        let led = lights
            .registry()
            .handler("inner")
            .unwrap()
            .registry()
            .output("led")
            .unwrap();
        assert_eq!(led.path(), "root/lights/inner/led");
    }

    #[test]
    fn test_failed_nested_spec_leaves_registry_untouched() {
        let mut reg = RegistryBuilder::new();
        let err = reg
            .register_handler_with("lights", Handler::builder(), |lights| {
                lights.add_input("sensor", -2.0, constant(0.5))?;
                Ok(())
            })
            .unwrap_err();

        assert_eq!(err.as_label(), "config_invalid_frequency");
        assert!(!reg.contains(Kind::Handler, "lights"));
    }

    #[test]
    fn test_resources_follow_registration_order() {
        let mut reg = RegistryBuilder::new();
        reg.register_output("b", sink()).unwrap();
        reg.register_output("a", sink()).unwrap();
        reg.register_output("b", sink()).unwrap();

        let frozen = reg.freeze("root");
        let paths: Vec<_> = frozen
            .resources(Kind::Output)
            .iter()
            .map(|r| r.path().to_string())
            .collect();
        assert_eq!(paths, vec!["root/b", "root/a"]);
    }
}
