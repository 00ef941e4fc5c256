//! # Example: random_relay
//!
//! Two random inputs relayed to two console outputs.
//!
//! Shows how to:
//! - Register inputs and outputs on a root handler.
//! - Use [`Handler::relay`] to fan every sample out to every output.
//! - Attach the built-in [`LogWriter`] subscriber.
//! - Turn the run result into a process exit status.
//!
//! ## Flow
//! ```text
//! one ──┐                 ┌──► red  (println)
//!       ├──► relay root ──┤
//! two ──┘                 └──► blue (println)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example random_relay
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use erie::{
    Config, Handler, LogWriter, Orchestrator, OutputResource, ProduceFn, ProductionError,
    RegistryBuilder, Sample, Subscribe, TransmitFn,
};
use tracing_subscriber::EnvFilter;

fn random_producer() -> ProduceFn<impl Fn() -> Result<f64, ProductionError>> {
    ProduceFn::new(|| Ok(rand::random::<f64>()))
}

fn console(label: &'static str) -> OutputResource {
    OutputResource::new(TransmitFn::new(move |s: &Sample| {
        println!("{label}: {} = {:.3}", s.source, s.value);
    }))
}

fn specify(reg: &mut RegistryBuilder) -> Result<(), erie::ConfigurationError> {
    reg.add_input("one", 2.0, random_producer())?;
    reg.add_input("two", 3.0, random_producer())?;
    reg.register_output("red", console("red"))?;
    reg.register_output("blue", console("blue"))?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let root = Handler::relay().specify(specify)?.build("root");

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let orchestrator = Orchestrator::builder(Config::default())
        .with_subscribers(subs)
        .build();

    let result = orchestrator.run(root, Some(Duration::from_secs(3))).await;
    if let Err(e) = &result {
        eprintln!("run failed: {e}");
    }
    Ok(Orchestrator::exit_code(&result))
}
