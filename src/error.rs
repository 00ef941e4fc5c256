//! Error types used by the erie runtime and its resources.
//!
//! This module defines four error enums, one per failure domain:
//!
//! - [`ConfigurationError`]: a registry could not accept a component.
//! - [`LifecycleError`]: a Start/Stop transition was attempted from the wrong state.
//! - [`ProductionError`]: a producer failed during one tick.
//! - [`DeviceError`]: an output device could not be acquired or released.
//! - [`RuntimeError`]: the orchestrator could not bring the tree up or down.
//!
//! All types provide `as_label` (stable snake_case label) for logs and events.

use thiserror::Error;

use crate::resources::{Kind, State, Transition};

/// # Errors produced while populating a registry.
///
/// Fails the registration call immediately; never retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Input frequency must be a finite, strictly positive number of ticks per second,
    /// low enough to give a period of at least one nanosecond.
    #[error("invalid frequency {frequency}: must be finite, > 0 and at most 1e9 Hz")]
    InvalidFrequency {
        /// The rejected frequency.
        frequency: f64,
    },

    /// A component of one kind was offered to a registration call of another kind.
    #[error("`{name}` is a {found} and cannot be registered as a {expected}")]
    CapabilityMismatch {
        /// Registration name.
        name: String,
        /// Kind required by the registration call.
        expected: Kind,
        /// Kind of the offered component.
        found: Kind,
    },

    /// Registration name is empty or contains the path separator.
    #[error("invalid resource name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl ConfigurationError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use erie::ConfigurationError;
    ///
    /// let err = ConfigurationError::InvalidFrequency { frequency: 0.0 };
    /// assert_eq!(err.as_label(), "config_invalid_frequency");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigurationError::InvalidFrequency { .. } => "config_invalid_frequency",
            ConfigurationError::CapabilityMismatch { .. } => "config_capability_mismatch",
            ConfigurationError::InvalidName { .. } => "config_invalid_name",
        }
    }
}

/// # Errors produced by Start/Stop transitions and by output control calls.
///
/// The resource the call was made on keeps its state when the transition itself
/// is rejected ([`LifecycleError::InvalidTransition`]).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    /// Transition is illegal from the current state.
    #[error("cannot {transition} `{resource}`: it is already {state}")]
    InvalidTransition {
        /// Path of the resource.
        resource: String,
        /// Attempted transition.
        transition: Transition,
        /// State the resource was (and still is) in.
        state: State,
    },

    /// Control operation invoked on an output that is not active.
    #[error("output `{resource}` is inactive")]
    OutputInactive {
        /// Path of the output.
        resource: String,
    },

    /// A hook addressed an output its handler does not own.
    #[error("`{resource}` has no output named `{output}`")]
    UnknownOutput {
        /// Path of the handler.
        resource: String,
        /// Requested output name.
        output: String,
    },

    /// An output device failed (or panicked) while being activated or deactivated.
    #[error("device behind `{resource}` failed: {source}")]
    DeviceFailed {
        /// Path of the output.
        resource: String,
        /// What the device reported.
        #[source]
        source: DeviceError,
    },

    /// A child of a handler failed while the handler cascaded a transition.
    #[error("`{resource}` could not {transition} its children: {source}")]
    Cascade {
        /// Path of the handler that cascaded.
        resource: String,
        /// Transition being cascaded.
        transition: Transition,
        /// First child failure.
        #[source]
        source: Box<LifecycleError>,
    },
}

impl LifecycleError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::InvalidTransition { .. } => "lifecycle_invalid_transition",
            LifecycleError::OutputInactive { .. } => "lifecycle_output_inactive",
            LifecycleError::UnknownOutput { .. } => "lifecycle_unknown_output",
            LifecycleError::DeviceFailed { .. } => "lifecycle_device_failed",
            LifecycleError::Cascade { .. } => "lifecycle_cascade",
        }
    }

    /// Follows [`LifecycleError::Cascade`] wrappers down to the failure that started it.
    pub fn root_cause(&self) -> &LifecycleError {
        match self {
            LifecycleError::Cascade { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Failure reported by a [`Transmit`](crate::Transmit) device from `activate` or `deactivate`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct DeviceError {
    /// Human-readable cause.
    pub reason: String,
}

impl DeviceError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// # Errors produced by one production tick.
///
/// Isolated to the tick: the input logs it, publishes
/// [`EventKind::ProductionFailed`](crate::EventKind::ProductionFailed) and keeps ticking.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductionError {
    /// Producer reported a failure.
    #[error("production failed: {reason}")]
    Failed {
        /// The underlying error message.
        reason: String,
    },

    /// Producer panicked; the panic was caught.
    #[error("producer panicked: {reason}")]
    Panicked {
        /// Panic payload rendered as text.
        reason: String,
    },

    /// The worker pool was closed before the tick could be dispatched.
    #[error("worker pool unavailable")]
    WorkerUnavailable,
}

impl ProductionError {
    /// Shorthand for [`ProductionError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        ProductionError::Failed {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProductionError::Failed { .. } => "production_failed",
            ProductionError::Panicked { .. } => "production_panicked",
            ProductionError::WorkerUnavailable => "production_worker_unavailable",
        }
    }
}

/// # Errors produced by the orchestrator.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// The root handler could not be activated.
    #[error("startup failed: {0}")]
    Startup(#[source] LifecycleError),

    /// The root handler could not be deactivated cleanly.
    #[error("teardown failed: {0}")]
    Teardown(#[source] LifecycleError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use erie::{LifecycleError, RuntimeError};
    ///
    /// let err = RuntimeError::Teardown(LifecycleError::OutputInactive { resource: "root/led".into() });
    /// assert_eq!(err.as_label(), "runtime_teardown_failed");
    /// assert_eq!(err.exit_code(), 1);
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Startup(_) => "runtime_startup_failed",
            RuntimeError::Teardown(_) => "runtime_teardown_failed",
        }
    }

    /// Process exit status to report for this error (never zero).
    pub fn exit_code(&self) -> u8 {
        match self {
            RuntimeError::Teardown(_) => 1,
            RuntimeError::Startup(_) => 2,
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
