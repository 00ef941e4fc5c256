//! # Example: light_switch
//!
//! A light sensor drives an LED through a nested handler; runs until Ctrl-C.
//!
//! Shows how to:
//! - Nest a handler with [`RegistryBuilder::register_handler_with`].
//! - Write an update hook that reads slots and reaches a device's own control
//!   surface through [`OutputResource::control`].
//! - Offload a blocking producer to the worker pool ([`ProduceFn::blocking`]).
//! - Stop a run from outside with [`Orchestrator::shutdown_handle`].
//!
//! ## Flow
//! ```text
//! root
//!  └─ lights (handler)
//!      ├─ sensor (input, blocking read)  ──► "sensor updated" hook
//!      └─ led    (output)                ◄── toggle when crossing the threshold
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=erie=debug cargo run --example light_switch
//! ```

use std::cell::Cell;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use erie::{
    Config, DeviceError, Handler, LogWriter, Orchestrator, OutputResource, ProduceFn, Sample, Scope, Subscribe,
    Transmit,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const THRESHOLD: f64 = 0.5;

/// LED with an on/off state of its own.
#[derive(Default)]
struct Led {
    lit: Cell<bool>,
}

impl Led {
    fn set(&self, on: bool) -> bool {
        self.lit.replace(on) != on
    }
}

impl Transmit for Led {
    fn transmit(&self, sample: &Sample) {
        println!("led {} ({:.2})", if self.lit.get() { "on" } else { "off" }, sample.value);
    }

    fn deactivate(&self) -> Result<(), DeviceError> {
        self.lit.set(false);
        Ok(())
    }
}

fn on_sensor(scope: &Scope<'_>, sample: &Sample) {
    let Some(led) = scope.output("led") else {
        return;
    };
    let Some(device) = led.control::<Led>() else {
        return;
    };
    let dark = scope.slot("sensor").unwrap_or(1.0) < THRESHOLD;
    if device.set(dark) {
        if let Err(e) = led.transmit(sample) {
            tracing::warn!(error = %e, "led unavailable");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let root = Handler::builder()
        .specify(|reg| {
            reg.register_handler_with(
                "lights",
                Handler::builder().on_update("sensor", on_sensor),
                |lights| {
                    lights.add_input(
                        "sensor",
                        4.0,
                        ProduceFn::blocking(|| {
                            // Simulated slow bus read.
                            std::thread::sleep(Duration::from_millis(30));
                            Ok(rand::random::<f64>())
                        }),
                    )?;
                    lights.register_output("led", OutputResource::new(Led::default()))?;
                    Ok(())
                },
            )?;
            Ok(())
        })?
        .build("root");

    let cfg = Config {
        max_workers: 2,
        ..Config::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let orchestrator = Orchestrator::builder(cfg).with_subscribers(subs).build();

    let stop = orchestrator.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        info!("demo time limit reached");
        stop.cancel();
    });

    let result = orchestrator.run(root, None).await;
    Ok(Orchestrator::exit_code(&result))
}
