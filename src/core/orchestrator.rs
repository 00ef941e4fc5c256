//! # Orchestrator: brings a handler tree up, keeps it running, and tears it down.
//!
//! ```text
//! run(root, duration)
//!   ├─► LocalSet (the driver thread)
//!   ├─► listener: Bus ─► SubscriberSet::emit          (until RunFinished)
//!   ├─► publish RunStarted
//!   ├─► root.start(&driver) ── Err ─► Startup error  (partially started tree is stopped)
//!   ├─► wait for the first of:
//!   │     - duration elapsed
//!   │     - OS termination signal       (Config::handle_signals)
//!   │     - shutdown_handle().cancel()
//!   ├─► publish ShutdownRequested{reason}
//!   ├─► root.stop(&driver)  ── Err ─► publish TeardownFailed, Teardown error
//!   ├─► publish RunFinished
//!   └─► drain subscribers within Config::grace
//! ```
//!
//! The process exit status is derived from the result with [`Orchestrator::exit_code`].

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinHandle, LocalSet};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::{shutdown, Driver};
use crate::error::{LifecycleError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::resources::{Handler, Kind, Lifecycle};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for an [`Orchestrator`] with optional event subscribers.
pub struct OrchestratorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl OrchestratorBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Each subscriber gets a dedicated worker with a bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            driver: Driver::new(&self.cfg),
            cfg: self.cfg,
            subscribers: self.subscribers,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Runs one handler tree for a bounded or unbounded time.
pub struct Orchestrator {
    cfg: Config,
    driver: Driver,
    subscribers: Vec<Arc<dyn Subscribe>>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    /// Orchestrator without subscribers.
    pub fn new(cfg: Config) -> Self {
        OrchestratorBuilder::new(cfg).build()
    }

    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    /// The event bus resources of this run publish on.
    pub fn bus(&self) -> &Bus {
        self.driver.bus()
    }

    /// Token that ends the run when cancelled (external shutdown signal).
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Starts `root`, waits for `duration` (or forever when `None`) or a shutdown
    /// request, then stops `root`.
    ///
    /// # Example
    /// ```no_run
    /// use std::time::Duration;
    /// use erie::{Config, Handler, Orchestrator, ProduceFn};
    ///
    /// #[tokio::main(flavor = "current_thread")]
    /// async fn main() -> std::process::ExitCode {
    ///     let root = Handler::relay()
    ///         .specify(|reg| {
    ///             reg.add_input("tick", 2.0, ProduceFn::new(|| Ok(1.0)))?;
    ///             Ok(())
    ///         })
    ///         .unwrap()
    ///         .build("root");
    ///
    ///     let result = Orchestrator::new(Config::default())
    ///         .run(root, Some(Duration::from_secs(1)))
    ///         .await;
    ///     Orchestrator::exit_code(&result)
    /// }
    /// ```
    pub async fn run(self, root: Handler, duration: Option<Duration>) -> Result<(), RuntimeError> {
        LocalSet::new().run_until(self.drive(root, duration)).await
    }

    /// Process exit status for the outcome of [`Orchestrator::run`].
    pub fn exit_code(result: &Result<(), RuntimeError>) -> ExitCode {
        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => ExitCode::from(e.exit_code()),
        }
    }

    async fn drive(self, root: Handler, duration: Option<Duration>) -> Result<(), RuntimeError> {
        let listener = self.subscriber_listener();
        let bus = self.driver.bus();
        bus.publish(
            Event::new(EventKind::RunStarted)
                .with_resource(root.path())
                .with_resource_kind(Kind::Handler),
        );

        let result = match root.start(&self.driver) {
            Ok(()) => {
                info!(root = root.path(), ?duration, "tree active");
                let reason = self.wait_for_shutdown(duration).await;
                bus.publish(Event::new(EventKind::ShutdownRequested).with_reason(reason.as_str()));
                self.teardown(&root)
            }
            Err(e) => {
                error!(root = root.path(), error = %e, "startup failed");
                if matches!(e, LifecycleError::Cascade { .. }) {
                    // Root was activated by this call; release whatever did start.
                    if let Err(stop_err) = root.stop(&self.driver) {
                        warn!(root = root.path(), error = %stop_err, "cleanup after failed startup");
                    }
                }
                Err(RuntimeError::Startup(e))
            }
        };

        bus.publish(Event::new(EventKind::RunFinished));
        if time::timeout(self.cfg.grace, listener).await.is_err() {
            warn!(grace = ?self.cfg.grace, "subscribers did not drain within grace");
        }
        result
    }

    fn teardown(&self, root: &Handler) -> Result<(), RuntimeError> {
        root.stop(&self.driver).map_err(|e| {
            error!(root = root.path(), error = %e, "teardown failed");
            self.driver.bus().publish(
                Event::new(EventKind::TeardownFailed)
                    .with_resource(root.path())
                    .with_resource_kind(Kind::Handler)
                    .with_reason(e.to_string()),
            );
            RuntimeError::Teardown(e)
        })
    }

    /// Resolves with the reason the run should end.
    async fn wait_for_shutdown(&self, duration: Option<Duration>) -> String {
        let elapsed = async {
            match duration {
                Some(d) => time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        let signal = async {
            if !self.cfg.handle_signals {
                return std::future::pending::<&'static str>().await;
            }
            match shutdown::wait_for_signal().await {
                Ok(name) => name,
                Err(e) => {
                    warn!(error = %e, "signal handlers unavailable");
                    std::future::pending::<&'static str>().await
                }
            }
        };

        tokio::select! {
            _ = elapsed => "elapsed".to_string(),
            name = signal => format!("signal: {name}"),
            _ = self.shutdown.cancelled() => "external".to_string(),
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set until `RunFinished`.
    fn subscriber_listener(&self) -> JoinHandle<()> {
        let mut rx = self.driver.bus().subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), self.driver.bus().clone());

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        set.emit(&ev);
                        if ev.kind == EventKind::RunFinished {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use crate::resources::{OutputResource, ProduceFn, Sample, Transmit, TransmitFn};
    use async_trait::async_trait;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Mutex;

    fn quiet() -> Config {
        Config {
            handle_signals: false,
            ..Config::default()
        }
    }

    fn relay_tree(frequency: f64, transmits: Rc<Cell<u32>>) -> Handler {
        Handler::relay()
            .specify(move |reg| {
                reg.add_input("sensor", frequency, ProduceFn::new(|| Ok(0.5)))?;
                reg.register_output(
                    "console",
                    OutputResource::new(TransmitFn::new(move |_: &Sample| {
                        transmits.set(transmits.get() + 1)
                    })),
                )?;
                Ok(())
            })
            .unwrap()
            .build("root")
    }

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.kinds.lock().unwrap().push(event.kind);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_second_at_two_hertz_transmits_two_or_three_times() {
        let transmits = Rc::new(Cell::new(0));
        let root = relay_tree(2.0, transmits.clone());

        let result = Orchestrator::new(quiet())
            .run(root, Some(Duration::from_secs(1)))
            .await;

        assert!(result.is_ok());
        assert!((2..=3).contains(&transmits.get()), "{}", transmits.get());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_the_whole_run() {
        let recorder = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![recorder.clone()];
        let orch = Orchestrator::builder(quiet()).with_subscribers(subs).build();

        orch.run(relay_tree(4.0, Rc::default()), Some(Duration::from_millis(500)))
            .await
            .unwrap();

        let kinds = recorder.kinds.lock().unwrap().clone();
        assert_eq!(kinds.first(), Some(&EventKind::RunStarted));
        assert_eq!(kinds.last(), Some(&EventKind::RunFinished));
        assert!(kinds.contains(&EventKind::ShutdownRequested));
        let started = kinds.iter().filter(|k| **k == EventKind::ResourceStarted).count();
        let stopped = kinds.iter().filter(|k| **k == EventKind::ResourceStopped).count();
        assert_eq!((started, stopped), (3, 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_handle_ends_an_unbounded_run() {
        let orch = Orchestrator::new(quiet());
        let mut rx = orch.bus().subscribe();
        let handle = orch.shutdown_handle();

        let canceller = async {
            time::sleep(Duration::from_secs(30)).await;
            handle.cancel();
        };
        let (result, ()) = tokio::join!(orch.run(relay_tree(1.0, Rc::default()), None), canceller);
        assert!(result.is_ok());

        let reason = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|e| e.kind == EventKind::ShutdownRequested)
            .and_then(|e| e.reason);
        assert_eq!(reason.as_deref(), Some("external"));
    }

    #[tokio::test]
    async fn test_already_active_root_is_a_startup_error() {
        let cfg = quiet();
        let root = Handler::builder().build("root");
        root.start(&Driver::new(&cfg)).unwrap();

        let result = Orchestrator::new(cfg)
            .run(root, Some(Duration::from_millis(10)))
            .await;

        match &result {
            Err(RuntimeError::Startup(LifecycleError::InvalidTransition { resource, .. })) => {
                assert_eq!(resource, "root")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(result.unwrap_err().exit_code(), 2);
    }

    struct StuckLed;

    impl Transmit for StuckLed {
        fn transmit(&self, _sample: &Sample) {}
        fn deactivate(&self) -> Result<(), DeviceError> {
            Err(DeviceError::new("led driver not responding"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_release_failure_is_a_teardown_error() {
        let orch = Orchestrator::new(quiet());
        let mut rx = orch.bus().subscribe();
        let root = Handler::relay()
            .specify(|reg| {
                reg.register_output("led", OutputResource::new(StuckLed))?;
                Ok(())
            })
            .unwrap()
            .build("root");

        let result = orch.run(root, Some(Duration::from_millis(10))).await;

        match &result {
            Err(RuntimeError::Teardown(e)) => match e.root_cause() {
                LifecycleError::DeviceFailed { resource, .. } => assert_eq!(resource, "root/led"),
                other => panic!("unexpected cause: {other:?}"),
            },
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(result.as_ref().unwrap_err().exit_code(), 1);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        let failed = kinds.iter().position(|k| *k == EventKind::TeardownFailed);
        let finished = kinds.iter().position(|k| *k == EventKind::RunFinished);
        assert!(failed.is_some() && failed < finished, "{kinds:?}");
    }
}
