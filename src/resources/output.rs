//! # Output resource: a consumer with a control surface.
//!
//! [`OutputResource`] wraps a concrete device implementing [`Transmit`]. Handlers call
//! [`OutputResource::transmit`]; the side effect is entirely the device's business.
//! Devices with richer control surfaces are reached through [`OutputResource::control`].

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::Driver;
use crate::error::{panic_message, DeviceError, LifecycleError};
use crate::resources::input::Sample;
use crate::resources::lifecycle::{Hook, Kind, Lifecycle, StateMachine};

/// # Concrete consumer behind an output.
///
/// Runs on the driver thread; implementations need not be `Send`.
/// `activate`/`deactivate` default to no-ops. A failure (or panic) in either
/// surfaces as [`LifecycleError::DeviceFailed`] from the output's transition.
pub trait Transmit: 'static {
    /// Consumes one sample.
    fn transmit(&self, sample: &Sample);

    /// Called when the output becomes active.
    fn activate(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Called when the output becomes inactive.
    fn deactivate(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Function-backed device.
///
/// ```
/// use erie::{OutputResource, TransmitFn};
///
/// let console = OutputResource::new(TransmitFn::new(|s: &erie::Sample| println!("{}", s.value)));
/// assert_eq!(console.transmit_count(), 0);
/// ```
pub struct TransmitFn<F> {
    f: F,
}

impl<F> TransmitFn<F>
where
    F: Fn(&Sample) + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Transmit for TransmitFn<F>
where
    F: Fn(&Sample) + 'static,
{
    fn transmit(&self, sample: &Sample) {
        (self.f)(sample)
    }
}

/// Lifecycle wrapper around a [`Transmit`] device.
pub struct OutputResource {
    name: Arc<str>,
    path: Arc<str>,
    machine: StateMachine,
    device: Rc<dyn Transmit>,
    control: Rc<dyn Any>,
    transmitted: Cell<u64>,
}

impl OutputResource {
    /// Wraps `device` in an inactive output.
    pub fn new<D: Transmit>(device: D) -> Self {
        let device = Rc::new(device);
        Self {
            name: Arc::from("output"),
            path: Arc::from("output"),
            machine: StateMachine::new(),
            control: device.clone(),
            device,
            transmitted: Cell::new(0),
        }
    }

    /// Hands `sample` to the device.
    ///
    /// Fails with [`LifecycleError::OutputInactive`] unless the output is active.
    pub fn transmit(&self, sample: &Sample) -> Result<(), LifecycleError> {
        if !self.machine.is_active() {
            return Err(LifecycleError::OutputInactive {
                resource: self.path.to_string(),
            });
        }
        self.device.transmit(sample);
        self.transmitted.set(self.transmitted.get() + 1);
        Ok(())
    }

    /// The concrete device, if it is a `D`.
    pub fn control<D: Transmit>(&self) -> Option<&D> {
        self.control.downcast_ref::<D>()
    }

    /// Number of successful `transmit` calls so far.
    pub fn transmit_count(&self) -> u64 {
        self.transmitted.get()
    }

    pub(crate) fn assign_name(&mut self, name: &str) {
        self.name = Arc::from(name);
    }

    pub(crate) fn assign_path(&mut self, path: String) {
        self.path = Arc::from(path);
    }

    /// Runs one device control call, turning errors and panics into `DeviceFailed`.
    fn guarded(
        &self,
        call: impl FnOnce(&dyn Transmit) -> Result<(), DeviceError>,
    ) -> Result<(), LifecycleError> {
        std::panic::catch_unwind(AssertUnwindSafe(|| call(&*self.device)))
            .unwrap_or_else(|panic| {
                Err(DeviceError::new(format!(
                    "panicked: {}",
                    panic_message(&*panic)
                )))
            })
            .map_err(|source| LifecycleError::DeviceFailed {
                resource: self.path.to_string(),
                source,
            })
    }
}

impl Lifecycle for OutputResource {
    fn kind(&self) -> Kind {
        Kind::Output
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn machine(&self) -> &StateMachine {
        &self.machine
    }

    fn run_hook(&self, hook: Hook, _driver: &Driver) -> Result<(), LifecycleError> {
        match hook {
            Hook::ActivateDevice => {
                self.guarded(|d| d.activate())?;
                info!(resource = %self.path, "output activated");
            }
            Hook::DeactivateDevice => {
                self.guarded(|d| d.deactivate())?;
                info!(resource = %self.path, "output deactivated");
            }
            other => debug!(resource = %self.path, hook = ?other, "hook not applicable to outputs"),
        }
        Ok(())
    }
}

impl fmt::Debug for OutputResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputResource")
            .field("path", &self.path)
            .field("state", &self.machine.state())
            .field("transmitted", &self.transmitted.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::resources::State;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Led {
        lit: Cell<bool>,
        powered: Cell<bool>,
        seen: RefCell<Vec<f64>>,
    }

    impl Led {
        fn toggle(&self) {
            self.lit.set(!self.lit.get());
        }
    }

    impl Transmit for Led {
        fn transmit(&self, sample: &Sample) {
            self.seen.borrow_mut().push(sample.value);
        }
        fn activate(&self) -> Result<(), DeviceError> {
            self.powered.set(true);
            Ok(())
        }
        fn deactivate(&self) -> Result<(), DeviceError> {
            self.powered.set(false);
            Ok(())
        }
    }

    /// Relay that sticks on release, and optionally blows up on power-on.
    struct StuckRelay {
        explode_on_activate: bool,
    }

    impl Transmit for StuckRelay {
        fn transmit(&self, _sample: &Sample) {}
        fn activate(&self) -> Result<(), DeviceError> {
            if self.explode_on_activate {
                panic!("coil shorted");
            }
            Ok(())
        }
        fn deactivate(&self) -> Result<(), DeviceError> {
            Err(DeviceError::new("contacts welded"))
        }
    }

    #[test]
    fn test_transmit_requires_active_output() {
        let driver = Driver::new(&Config::default());
        let out = OutputResource::new(Led::default());

        let err = out.transmit(&Sample::new("root/in", 1.0)).unwrap_err();
        assert_eq!(err.as_label(), "lifecycle_output_inactive");

        out.start(&driver).unwrap();
        out.transmit(&Sample::new("root/in", 1.0)).unwrap();
        out.transmit(&Sample::new("root/in", 2.0)).unwrap();
        assert_eq!(out.transmit_count(), 2);
        assert_eq!(*out.control::<Led>().unwrap().seen.borrow(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_device_follows_lifecycle() {
        let driver = Driver::new(&Config::default());
        let out = OutputResource::new(Led::default());
        let led = || out.control::<Led>().unwrap();

        out.start(&driver).unwrap();
        assert!(led().powered.get());
        out.stop(&driver).unwrap();
        assert!(!led().powered.get());
        assert_eq!(out.state(), State::Inactive);
        assert!(out.stop(&driver).is_err());
    }

    #[test]
    fn test_control_downcasts_to_concrete_device() {
        let out = OutputResource::new(Led::default());
        out.control::<Led>().unwrap().toggle();
        assert!(out.control::<Led>().unwrap().lit.get());

        assert!(out.control::<TransmitFn<fn(&Sample)>>().is_none());
    }

    #[test]
    fn test_device_release_failure_is_reported_and_output_still_stops() {
        let driver = Driver::new(&Config::default());
        let out = OutputResource::new(StuckRelay {
            explode_on_activate: false,
        });

        out.start(&driver).unwrap();
        let err = out.stop(&driver).unwrap_err();
        assert_eq!(err.as_label(), "lifecycle_device_failed");
        assert!(err.to_string().contains("contacts welded"), "{err}");
        assert_eq!(out.state(), State::Inactive);
    }

    #[test]
    fn test_device_panic_becomes_device_failed() {
        let driver = Driver::new(&Config::default());
        let out = OutputResource::new(StuckRelay {
            explode_on_activate: true,
        });

        match out.start(&driver) {
            Err(LifecycleError::DeviceFailed { source, .. }) => {
                assert_eq!(source.reason, "panicked: coil shorted")
            }
            other => panic!("expected DeviceFailed, got {other:?}"),
        }
    }
}
