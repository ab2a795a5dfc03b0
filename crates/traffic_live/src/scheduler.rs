//! Tick loop: advance the simulator on a fixed cadence and push each active
//! topic's projection to its subscribers.
//!
//! One [UpdateScheduler] owns at most one loop task. `start` while running
//! only changes the interval; `stop` is cooperative and lets the current
//! iteration finish, cutting short only the sleep. Each loop carries the
//! generation it was started with, so a stale loop exits at its next check,
//! and a restarted loop waits for its predecessor before its first tick.
//! A panicking tick is caught and handled like any other failed tick.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};
use traffic_core::{Topic, TrafficSimulator};

use crate::broadcaster::TopicBroadcaster;
use crate::connection::Payload;
use crate::error::{ProjectionError, SchedulerError};

/// Time source and sleep for the tick loop.
#[async_trait]
pub trait Pacer: Send + Sync + 'static {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Real tokio time.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed timings of the tick loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickTimings {
    /// Pause after a failed tick.
    pub recovery: Duration,
    /// Shortest pause between ticks, however long a tick took.
    pub min_sleep: Duration,
}

impl Default for TickTimings {
    fn default() -> Self {
        Self {
            recovery: Duration::from_secs(5),
            min_sleep: Duration::from_millis(100),
        }
    }
}

/// Health view of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub interval_secs: f64,
    pub ticks: u64,
}

/// What one successful tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub topics: usize,
    pub delivered: usize,
    pub pruned: usize,
}

#[derive(Debug)]
struct LoopState {
    running: bool,
    interval: Duration,
    generation: u64,
    ticks: u64,
    task: Option<JoinHandle<()>>,
}

pub struct UpdateScheduler {
    simulator: Arc<Mutex<TrafficSimulator>>,
    broadcaster: Arc<TopicBroadcaster>,
    pacer: Arc<dyn Pacer>,
    timings: TickTimings,
    seed: Option<u64>,
    state: Arc<Mutex<LoopState>>,
    wake: Arc<Notify>,
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("timings", &self.timings)
            .field("status", &self.status())
            .finish()
    }
}

impl UpdateScheduler {
    pub fn new(
        simulator: Arc<Mutex<TrafficSimulator>>,
        broadcaster: Arc<TopicBroadcaster>,
        pacer: Arc<dyn Pacer>,
        timings: TickTimings,
    ) -> Self {
        Self {
            simulator,
            broadcaster,
            pacer,
            timings,
            seed: None,
            state: Arc::new(Mutex::new(LoopState {
                running: false,
                interval: Duration::from_secs(5),
                generation: 0,
                ticks: 0,
                task: None,
            })),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Seed for the projection noise (comparisons, trend, prediction, hotspots).
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn state(&self) -> MutexGuard<'_, LoopState> {
        lock_state(&self.state)
    }

    /// Start the loop, or just change its interval if it is already running.
    pub fn start(&self, interval_secs: f64) -> Result<(), SchedulerError> {
        let interval = interval_from_secs(interval_secs)?;
        let mut state = self.state();

        if state.running {
            state.interval = interval;
            info!(interval_secs, "scheduler already running, interval updated");
            return Ok(());
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        state.running = true;
        state.interval = interval;
        state.generation += 1;

        let tick_loop = TickLoop {
            simulator: Arc::clone(&self.simulator),
            broadcaster: Arc::clone(&self.broadcaster),
            pacer: Arc::clone(&self.pacer),
            timings: self.timings,
            state: Arc::clone(&self.state),
            wake: Arc::clone(&self.wake),
            generation: state.generation,
            previous: state.task.take(),
            rng: match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        };
        state.task = Some(runtime.spawn(tick_loop.run()));
        info!(interval_secs, generation = state.generation, "scheduler started");
        Ok(())
    }

    /// Ask the loop to exit after its current iteration. A loop that is
    /// sleeping wakes up and exits straight away.
    pub fn stop(&self) {
        let mut state = self.state();
        if !state.running {
            info!("scheduler not running");
            return;
        }
        state.running = false;
        self.wake.notify_waiters();
        info!("scheduler stopping");
    }

    /// [Self::stop], then wait for the loop task to finish.
    pub async fn shutdown(&self) {
        let task = {
            let mut state = self.state();
            state.running = false;
            self.wake.notify_waiters();
            state.task.take()
        };
        if let Some(task) = task {
            if let Err(error) = task.await {
                error!(%error, "scheduler task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    pub fn interval(&self) -> Duration {
        self.state().interval
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.state();
        SchedulerStatus {
            is_running: state.running,
            interval_secs: state.interval.as_secs_f64(),
            ticks: state.ticks,
        }
    }
}

fn interval_from_secs(secs: f64) -> Result<Duration, SchedulerError> {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).map_err(|_| SchedulerError::InvalidInterval(secs))
    } else {
        Err(SchedulerError::InvalidInterval(secs))
    }
}

// Loop state edits never panic half-way.
fn lock_state(state: &Mutex<LoopState>) -> MutexGuard<'_, LoopState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

struct TickLoop {
    simulator: Arc<Mutex<TrafficSimulator>>,
    broadcaster: Arc<TopicBroadcaster>,
    pacer: Arc<dyn Pacer>,
    timings: TickTimings,
    state: Arc<Mutex<LoopState>>,
    wake: Arc<Notify>,
    generation: u64,
    /// Loop task this one replaced, still finishing its last iteration.
    previous: Option<JoinHandle<()>>,
    rng: StdRng,
}

impl TickLoop {
    async fn run(mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(error) = previous.await {
                error!(%error, "previous tick loop ended abnormally");
            }
        }
        debug!(generation = self.generation, "tick loop entered");

        while self.should_continue() {
            let started = self.pacer.now();
            let outcome = AssertUnwindSafe(self.tick())
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(ProjectionError::TickPanicked(panic_message(panic.as_ref())))
                });

            let pause = match outcome {
                Ok(report) => {
                    let interval = self.record_tick();
                    let elapsed = self.pacer.now().saturating_duration_since(started);
                    let pause = interval.saturating_sub(elapsed).max(self.timings.min_sleep);
                    debug!(
                        tick = report.tick,
                        topics = report.topics,
                        delivered = report.delivered,
                        pruned = report.pruned,
                        elapsed_ms = elapsed.as_millis() as u64,
                        sleep_ms = pause.as_millis() as u64,
                        "tick complete"
                    );
                    pause
                }
                Err(error) => {
                    error!(
                        %error,
                        recovery_secs = self.timings.recovery.as_secs_f64(),
                        "tick failed, backing off"
                    );
                    self.timings.recovery
                }
            };

            if !self.sleep_unless_stopped(pause).await {
                break;
            }
        }
        debug!(generation = self.generation, "tick loop exited");
    }

    fn should_continue(&self) -> bool {
        let state = lock_state(&self.state);
        state.running && state.generation == self.generation
    }

    /// Sleep for `pause`, or until a stop. Returns `false` if the loop
    /// should exit without sleeping.
    async fn sleep_unless_stopped(&self, pause: Duration) -> bool {
        let stopped = self.wake.notified();
        tokio::pin!(stopped);
        // Registered before the check so a stop in between still wakes us.
        stopped.as_mut().enable();
        if !self.should_continue() {
            return false;
        }
        tokio::select! {
            _ = self.pacer.sleep(pause) => {}
            _ = &mut stopped => {}
        }
        true
    }

    /// Count the tick and read the interval for the coming sleep.
    fn record_tick(&self) -> Duration {
        let mut state = lock_state(&self.state);
        state.ticks += 1;
        state.interval
    }

    /// Advance once and fan out. All projections come from the same
    /// post-advance snapshot; every broadcast is issued before returning.
    async fn tick(&mut self) -> Result<TickReport, ProjectionError> {
        let topics = self.broadcaster.active_topics();

        let (tick, snapshot) = {
            let mut simulator = match self.simulator.lock() {
                Ok(simulator) => simulator,
                Err(poisoned) => {
                    // A panic mid-advance leaves at worst one half-applied
                    // tick; report it once and carry on from there.
                    drop(poisoned);
                    self.simulator.clear_poison();
                    return Err(ProjectionError::SimulatorPoisoned);
                }
            };
            let summary = simulator.advance();
            let snapshot = (!topics.is_empty()).then(|| simulator.snapshot());
            (summary.tick, snapshot)
        };

        let mut report = TickReport {
            tick,
            topics: topics.len(),
            ..TickReport::default()
        };
        let Some(snapshot) = snapshot else {
            return Ok(report);
        };

        let mut messages: Vec<(Topic, Payload)> = Vec::with_capacity(topics.len());
        for topic in topics {
            let value = snapshot
                .project(topic, &mut self.rng)
                .map_err(|source| ProjectionError::Serialize { topic, source })?;
            messages.push((topic, Arc::new(value)));
        }

        for (topic, payload) in messages {
            let outcome = self.broadcaster.broadcast(topic, payload).await;
            report.delivered += outcome.delivered;
            report.pruned += outcome.pruned.len();
        }
        Ok(report)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_validation() {
        assert_eq!(interval_from_secs(2.5), Ok(Duration::from_millis(2500)));
        assert_eq!(interval_from_secs(0.0), Err(SchedulerError::InvalidInterval(0.0)));
        assert!(interval_from_secs(-1.0).is_err());
        assert!(interval_from_secs(f64::NAN).is_err());
        assert!(interval_from_secs(f64::INFINITY).is_err());
    }

    #[test]
    fn panic_payloads_become_messages() {
        let boxed: Box<dyn Any + Send> = Box::new("lock held");
        assert_eq!(panic_message(boxed.as_ref()), "lock held");
        let boxed: Box<dyn Any + Send> = Box::new(format!("tick {}", 3));
        assert_eq!(panic_message(boxed.as_ref()), "tick 3");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn start_outside_runtime_is_an_error() {
        let (simulator, _clock) = traffic_core::test_helpers::test_simulator(2, 12);
        let scheduler = UpdateScheduler::new(
            Arc::new(Mutex::new(simulator)),
            Arc::new(TopicBroadcaster::new()),
            Arc::new(TokioPacer),
            TickTimings::default(),
        );
        assert_eq!(scheduler.start(5.0), Err(SchedulerError::NoRuntime));
        assert!(!scheduler.is_running());
    }
}
