//! # Input resource: a periodic producer.
//!
//! An [`InputResource`] owns a [`Channel`] of [`Sample`]s and a [`Produce`] implementation.
//! While active it ticks every `1 / frequency` seconds:
//!
//! ```text
//! start ──► ArmTimer ──► spawn_local(tick loop)
//!
//! loop {
//!   ├─► wait for tick            (first tick fires immediately)
//!   ├─► produce()                inline, or spawn_blocking when offloaded
//!   ├─► still active?            no → exit without publishing
//!   ├─► Ok(v)  → channel.publish(Sample)
//!   └─► Err(e) → warn + ProductionFailed event, keep ticking
//! }
//!
//! stop ──► CancelTimer ──► cancel the activation's token
//! ```
//!
//! ## Rules
//! - The active check happens on the driver thread right before `publish`, with no
//!   suspension point in between; a tick whose production was in flight when `stop`
//!   returned is discarded, never published.
//! - Every activation gets its own [`CancellationToken`]; a loop left over from an
//!   earlier activation can never publish into a later one.
//! - Production failures and panics are isolated to their tick; a panicking
//!   subscriber is isolated to its own delivery.
//! - Missed ticks are delayed, not bursted (`MissedTickBehavior::Delay`).

use std::cell::RefCell;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::core::Driver;
use crate::error::{panic_message, ConfigurationError, LifecycleError, ProductionError};
use crate::events::{Event, EventKind};
use crate::resources::channel::Channel;
use crate::resources::lifecycle::{Hook, Kind, Lifecycle, StateMachine};

/// One value observed by an input.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Path of the input that produced it.
    pub source: Arc<str>,
    /// Wall-clock time of production.
    pub at: SystemTime,
    /// The produced value.
    pub value: f64,
}

impl Sample {
    /// Creates a sample stamped with the current time.
    pub fn new(source: impl Into<Arc<str>>, value: f64) -> Self {
        Self {
            source: source.into(),
            at: SystemTime::now(),
            value,
        }
    }
}

/// # Concrete producer logic behind an input.
///
/// `produce` runs once per tick. Producers that block (I/O, heavy computation)
/// should return `true` from [`Produce::offload`]; they then run on tokio's
/// blocking pool, bounded by `Config::max_workers`.
///
/// # Example
/// ```
/// use erie::{Produce, ProductionError};
///
/// struct Constant(f64);
///
/// impl Produce for Constant {
///     fn produce(&self) -> Result<f64, ProductionError> {
///         Ok(self.0)
///     }
/// }
/// ```
pub trait Produce: Send + Sync + 'static {
    /// Produces the value for one tick.
    fn produce(&self) -> Result<f64, ProductionError>;

    /// Whether to run `produce` on the worker pool instead of the driver thread.
    fn offload(&self) -> bool {
        false
    }
}

/// Function-backed producer.
///
/// ```
/// use erie::{InputResource, ProduceFn};
///
/// let input = InputResource::new(2.0, ProduceFn::new(|| Ok(0.5))).unwrap();
/// assert_eq!(input.frequency(), 2.0);
/// ```
pub struct ProduceFn<F> {
    f: F,
    offload: bool,
}

impl<F> ProduceFn<F> {
    /// Producer that runs on the driver thread.
    pub fn new(f: F) -> Self {
        Self { f, offload: false }
    }

    /// Producer that runs on the worker pool.
    pub fn blocking(f: F) -> Self {
        Self { f, offload: true }
    }
}

impl<F> Produce for ProduceFn<F>
where
    F: Fn() -> Result<f64, ProductionError> + Send + Sync + 'static,
{
    fn produce(&self) -> Result<f64, ProductionError> {
        (self.f)()
    }

    fn offload(&self) -> bool {
        self.offload
    }
}

/// State shared between the resource and its running tick loop.
struct Shared {
    machine: StateMachine,
    channel: Channel<Sample>,
}

/// Periodic producer publishing [`Sample`]s on its [`Channel`].
pub struct InputResource {
    name: Arc<str>,
    path: Arc<str>,
    frequency: f64,
    period: Duration,
    producer: Arc<dyn Produce>,
    shared: Rc<Shared>,
    ticker: RefCell<Option<CancellationToken>>,
}

impl InputResource {
    /// Creates an inactive input ticking `frequency` times per second.
    ///
    /// Fails with [`ConfigurationError::InvalidFrequency`] unless `frequency` is finite,
    /// positive, and yields a non-zero period.
    pub fn new(frequency: f64, producer: impl Produce) -> Result<Self, ConfigurationError> {
        Self::from_arc(frequency, Arc::new(producer))
    }

    /// Same as [`InputResource::new`] for an already shared producer.
    pub fn from_arc(
        frequency: f64,
        producer: Arc<dyn Produce>,
    ) -> Result<Self, ConfigurationError> {
        let period = period_of(frequency)?;
        Ok(Self {
            name: Arc::from("input"),
            path: Arc::from("input"),
            frequency,
            period,
            producer,
            shared: Rc::new(Shared {
                machine: StateMachine::new(),
                channel: Channel::new(),
            }),
            ticker: RefCell::new(None),
        })
    }

    /// Ticks per second.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Time between ticks.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// The channel samples are published on.
    pub fn channel(&self) -> &Channel<Sample> {
        &self.shared.channel
    }

    /// Shorthand for `channel().subscribe(callback)`.
    pub fn subscribe(&self, callback: impl Fn(&Sample) + 'static) {
        self.shared.channel.subscribe(callback);
    }

    pub(crate) fn assign_name(&mut self, name: &str) {
        self.name = Arc::from(name);
    }

    pub(crate) fn assign_path(&mut self, path: String) {
        self.path = Arc::from(path);
    }

    fn arm_timer(&self, driver: &Driver) {
        let token = CancellationToken::new();
        let tick_loop = TickLoop {
            path: self.path.clone(),
            period: self.period,
            producer: Arc::clone(&self.producer),
            shared: Rc::clone(&self.shared),
            token: token.clone(),
            driver: driver.clone(),
        };
        tokio::task::spawn_local(tick_loop.run());

        if let Some(stale) = self.ticker.replace(Some(token)) {
            stale.cancel();
        }
        info!(resource = %self.path, period = ?self.period, "input activated");
    }

    fn cancel_timer(&self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
        info!(resource = %self.path, "input deactivated");
    }
}

/// Longest tick period; very low frequencies saturate here. Keeps `Instant + period` in range.
const MAX_PERIOD: Duration = Duration::from_secs(30 * 365 * 86_400);

fn period_of(frequency: f64) -> Result<Duration, ConfigurationError> {
    let invalid = ConfigurationError::InvalidFrequency { frequency };
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(invalid);
    }
    let period = Duration::try_from_secs_f64(1.0 / frequency)
        .map_or(MAX_PERIOD, |period| period.min(MAX_PERIOD));
    if period.is_zero() {
        return Err(invalid);
    }
    Ok(period)
}

impl Lifecycle for InputResource {
    fn kind(&self) -> Kind {
        Kind::Input
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn machine(&self) -> &StateMachine {
        &self.shared.machine
    }

    /// # Panics
    /// Arming the timer spawns onto the current `LocalSet`; starting an input
    /// outside of one panics.
    fn run_hook(&self, hook: Hook, driver: &Driver) -> Result<(), LifecycleError> {
        match hook {
            Hook::ArmTimer => self.arm_timer(driver),
            Hook::CancelTimer => self.cancel_timer(),
            other => debug!(resource = %self.path, hook = ?other, "hook not applicable to inputs"),
        }
        Ok(())
    }
}

impl fmt::Debug for InputResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputResource")
            .field("path", &self.path)
            .field("frequency", &self.frequency)
            .field("state", &self.shared.machine.state())
            .field("channel", &self.shared.channel)
            .finish()
    }
}

/// Everything one activation's tick loop owns.
struct TickLoop {
    path: Arc<str>,
    period: Duration,
    producer: Arc<dyn Produce>,
    shared: Rc<Shared>,
    token: CancellationToken,
    driver: Driver,
}

impl TickLoop {
    async fn run(self) {
        let mut timer = time::interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = timer.tick() => {}
            }

            let produced = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                res = produce_once(&self.producer, &self.driver) => res,
            };

            // Stop may have landed while production was in flight.
            if self.token.is_cancelled() || !self.shared.machine.is_active() {
                break;
            }

            match produced {
                Ok(value) => {
                    let sample = Sample::new(self.path.clone(), value);
                    let delivered = self.shared.channel.publish(&sample);
                    trace!(resource = %self.path, value, delivered, "sample published");
                }
                Err(e) => {
                    warn!(resource = %self.path, error = %e, "tick skipped");
                    self.driver.bus().publish(
                        Event::new(EventKind::ProductionFailed)
                            .with_resource(self.path.clone())
                            .with_resource_kind(Kind::Input)
                            .with_reason(e.to_string()),
                    );
                }
            }
        }
        debug!(resource = %self.path, "tick loop exited");
    }
}

/// Runs one production, inline or on the worker pool, catching panics either way.
async fn produce_once(producer: &Arc<dyn Produce>, driver: &Driver) -> Result<f64, ProductionError> {
    if !producer.offload() {
        return std::panic::catch_unwind(AssertUnwindSafe(|| producer.produce())).unwrap_or_else(
            |panic| {
                Err(ProductionError::Panicked {
                    reason: panic_message(&*panic),
                })
            },
        );
    }

    let permit = match driver.workers() {
        Some(sem) => Some(
            Arc::clone(sem)
                .acquire_owned()
                .await
                .map_err(|_| ProductionError::WorkerUnavailable)?,
        ),
        None => None,
    };

    let producer = Arc::clone(producer);
    let job = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        producer.produce()
    });

    match job.await {
        Ok(res) => res,
        Err(join_err) if join_err.is_panic() => Err(ProductionError::Panicked {
            reason: panic_message(&*join_err.into_panic()),
        }),
        Err(_) => Err(ProductionError::WorkerUnavailable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::resources::State;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::task::LocalSet;

    fn counter(input: &InputResource) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        input.subscribe(move |_| c.set(c.get() + 1));
        count
    }

    #[test]
    fn test_rejects_invalid_frequencies() {
        for frequency in [0.0, -1.0, f64::NAN, f64::INFINITY, f64::MAX] {
            let err = InputResource::new(frequency, ProduceFn::new(|| Ok(0.0))).unwrap_err();
            assert_eq!(err.as_label(), "config_invalid_frequency", "{frequency}");
        }
        let ok = InputResource::new(4.0, ProduceFn::new(|| Ok(0.0))).unwrap();
        assert_eq!(ok.period(), Duration::from_millis(250));
    }

    #[test]
    fn test_tiny_frequencies_saturate_the_period() {
        for frequency in [1e-200, f64::MIN_POSITIVE, 1e-12] {
            let input = InputResource::new(frequency, ProduceFn::new(|| Ok(0.0))).unwrap();
            assert_eq!(input.period(), MAX_PERIOD, "{frequency}");
            assert_eq!(input.frequency(), frequency);
        }
        let slow = InputResource::new(0.5, ProduceFn::new(|| Ok(0.0))).unwrap();
        assert_eq!(slow.period(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_subscriber_does_not_starve_later_ones() {
        LocalSet::new()
            .run_until(async {
                let driver = Driver::new(&Config::default());
                let input = InputResource::new(10.0, ProduceFn::new(|| Ok(1.0))).unwrap();
                let panics = Rc::new(Cell::new(0));
                let p = panics.clone();
                input.subscribe(move |_| {
                    p.set(p.get() + 1);
                    panic!("subscriber bug");
                });
                let delivered = counter(&input);

                input.start(&driver).unwrap();
                time::sleep(Duration::from_millis(450)).await;
                input.stop(&driver).unwrap();

                assert!(panics.get() >= 4, "panics={}", panics.get());
                assert_eq!(delivered.get(), panics.get());
                assert_eq!(input.state(), State::Inactive);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_count_tracks_frequency() {
        LocalSet::new()
            .run_until(async {
                let driver = Driver::new(&Config::default());
                let input = InputResource::new(4.0, ProduceFn::new(|| Ok(1.0))).unwrap();
                let published = counter(&input);

                input.start(&driver).unwrap();
                time::sleep(Duration::from_secs(1)).await;
                input.stop(&driver).unwrap();

                // floor(1.0 * 4) ..= ceil(1.0 * 4) + 1
                assert!((4..=5).contains(&published.get()), "{}", published.get());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_stop_and_ticks_resume_on_restart() {
        LocalSet::new()
            .run_until(async {
                let driver = Driver::new(&Config::default());
                let input = InputResource::new(10.0, ProduceFn::new(|| Ok(1.0))).unwrap();
                let published = counter(&input);

                input.start(&driver).unwrap();
                time::sleep(Duration::from_millis(450)).await;
                input.stop(&driver).unwrap();
                let at_stop = published.get();
                assert!(at_stop > 0);

                time::sleep(Duration::from_secs(1)).await;
                assert_eq!(published.get(), at_stop);
                assert_eq!(input.state(), State::Inactive);

                input.start(&driver).unwrap();
                time::sleep(Duration::from_millis(450)).await;
                input.stop(&driver).unwrap();
                assert!(published.get() > at_stop);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_production_failure_is_isolated_to_its_tick() {
        LocalSet::new()
            .run_until(async {
                let driver = Driver::new(&Config::default());
                let mut events = driver.bus().subscribe();
                let calls = Arc::new(AtomicUsize::new(0));
                let c = calls.clone();
                let input = InputResource::new(
                    10.0,
                    ProduceFn::new(move || match c.fetch_add(1, Ordering::SeqCst) % 2 {
                        0 => Err(ProductionError::failed("sensor offline")),
                        _ => Ok(0.5),
                    }),
                )
                .unwrap();
                let published = counter(&input);

                input.start(&driver).unwrap();
                time::sleep(Duration::from_millis(950)).await;
                assert_eq!(input.state(), State::Active);
                input.stop(&driver).unwrap();

                let failures = std::iter::from_fn(|| events.try_recv().ok())
                    .filter(|e| e.kind == EventKind::ProductionFailed)
                    .count();
                assert!(failures >= 4, "failures={failures}");
                assert!(published.get() >= 4, "published={}", published.get());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_panic_does_not_kill_the_loop() {
        LocalSet::new()
            .run_until(async {
                let driver = Driver::new(&Config::default());
                let calls = Arc::new(AtomicUsize::new(0));
                let c = calls.clone();
                let input = InputResource::new(
                    10.0,
                    ProduceFn::new(move || {
                        if c.fetch_add(1, Ordering::SeqCst) == 0 {
                            panic!("first tick explodes");
                        }
                        Ok(1.0)
                    }),
                )
                .unwrap();
                let published = counter(&input);

                input.start(&driver).unwrap();
                time::sleep(Duration::from_millis(350)).await;
                input.stop(&driver).unwrap();

                assert!(calls.load(Ordering::SeqCst) >= 3);
                assert_eq!(published.get(), calls.load(Ordering::SeqCst) - 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_stop_during_inflight_production_never_publishes() {
        LocalSet::new()
            .run_until(async {
                let driver = Driver::new(&Config::default());
                let entered = Arc::new(AtomicUsize::new(0));
                let e = entered.clone();
                let input = InputResource::new(
                    20.0,
                    ProduceFn::blocking(move || {
                        e.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(150));
                        Ok(1.0)
                    }),
                )
                .unwrap();
                let published = counter(&input);

                input.start(&driver).unwrap();
                time::sleep(Duration::from_millis(40)).await;
                input.stop(&driver).unwrap();

                time::sleep(Duration::from_millis(300)).await;
                assert_eq!(entered.load(Ordering::SeqCst), 1);
                assert_eq!(published.get(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_offloaded_production() {
        LocalSet::new()
            .run_until(async {
                let cfg = Config {
                    max_workers: 1,
                    ..Config::default()
                };
                let driver = Driver::new(&cfg);
                let in_flight = Arc::new(AtomicUsize::new(0));
                let peak = Arc::new(AtomicUsize::new(0));

                let make = || {
                    let (in_flight, peak) = (in_flight.clone(), peak.clone());
                    InputResource::new(
                        50.0,
                        ProduceFn::blocking(move || {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(20));
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            Ok(1.0)
                        }),
                    )
                    .unwrap()
                };
                let (a, b) = (make(), make());

                a.start(&driver).unwrap();
                b.start(&driver).unwrap();
                time::sleep(Duration::from_millis(200)).await;
                a.stop(&driver).unwrap();
                b.stop(&driver).unwrap();
                time::sleep(Duration::from_millis(50)).await;

                assert_eq!(peak.load(Ordering::SeqCst), 1);
            })
            .await;
    }
}
