//! The assembled live service: one simulator, one topic registry, one tick
//! loop. Transports hold a [TrafficService] and call into it.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::info;
use traffic_core::{ShapeInput, Topic, TrafficSimulator, WallClock};

use crate::broadcaster::TopicBroadcaster;
use crate::config::LiveConfig;
use crate::connection::{Connection, ConnectionId};
use crate::error::{ConfigError, ProjectionError, SchedulerError, SendError};
use crate::heartbeat::{spawn_heartbeat, HeartbeatHandle};
use crate::scheduler::{Pacer, SchedulerStatus, TokioPacer, UpdateScheduler};

pub struct TrafficService {
    config: LiveConfig,
    simulator: Arc<Mutex<TrafficSimulator>>,
    broadcaster: Arc<TopicBroadcaster>,
    scheduler: UpdateScheduler,
    pacer: Arc<dyn Pacer>,
}

impl std::fmt::Debug for TrafficService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficService")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl TrafficService {
    /// Build the simulator from the given shapes, with real tokio time.
    pub fn new(
        config: LiveConfig,
        road_shapes: &[ShapeInput],
        district_shapes: &[ShapeInput],
        clock: Arc<dyn WallClock>,
    ) -> Result<Self, ConfigError> {
        let simulator =
            TrafficSimulator::new(road_shapes, district_shapes, config.simulator_params(), clock);
        Self::with_pacer(config, simulator, Arc::new(TokioPacer))
    }

    /// Wrap an existing simulator, pacing the loops with `pacer`.
    pub fn with_pacer(
        config: LiveConfig,
        simulator: TrafficSimulator,
        pacer: Arc<dyn Pacer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let simulator = Arc::new(Mutex::new(simulator));
        let broadcaster = Arc::new(TopicBroadcaster::new());
        let scheduler = UpdateScheduler::new(
            Arc::clone(&simulator),
            Arc::clone(&broadcaster),
            Arc::clone(&pacer),
            config.timings()?,
        )
        .with_seed(config.projection_seed());

        Ok(Self {
            config,
            simulator,
            broadcaster,
            scheduler,
            pacer,
        })
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    pub fn broadcaster(&self) -> &Arc<TopicBroadcaster> {
        &self.broadcaster
    }

    pub fn simulator(&self) -> &Arc<Mutex<TrafficSimulator>> {
        &self.simulator
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    /// Start ticking at the configured interval.
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.scheduler.start(self.config.interval_secs)
    }

    pub fn start_scheduler(&self, interval_secs: f64) -> Result<(), SchedulerError> {
        self.scheduler.start(interval_secs)
    }

    pub fn stop_scheduler(&self) {
        self.scheduler.stop();
    }

    pub fn status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    /// Current projection for `topic`, without advancing the simulation.
    pub fn get_projection(&self, topic: Topic) -> Result<Value, ProjectionError> {
        let snapshot = self
            .simulator
            .lock()
            .map_err(|_| ProjectionError::SimulatorPoisoned)?
            .snapshot();
        snapshot
            .project(topic, &mut rand::thread_rng())
            .map_err(|source| ProjectionError::Serialize { topic, source })
    }

    pub async fn subscribe(
        &self,
        topic: Topic,
        connection: Arc<dyn Connection>,
    ) -> Result<(), SendError> {
        self.broadcaster.subscribe(topic, connection).await
    }

    pub async fn subscribe_named(
        &self,
        topic: &str,
        connection: Arc<dyn Connection>,
    ) -> Result<(), SendError> {
        self.broadcaster.subscribe_named(topic, connection).await
    }

    pub fn unsubscribe(&self, topic: Topic, id: ConnectionId) -> bool {
        self.broadcaster.unsubscribe(topic, id)
    }

    /// Drop `id` from every topic, as on disconnect.
    pub fn disconnect(&self, id: ConnectionId) -> usize {
        self.broadcaster.unsubscribe_all(id)
    }

    pub fn spawn_heartbeat(&self) -> Result<HeartbeatHandle, ConfigError> {
        Ok(spawn_heartbeat(
            Arc::clone(&self.broadcaster),
            self.config.heartbeat_interval()?,
            Arc::clone(&self.pacer),
        ))
    }

    /// Stop the tick loop and wait for it to exit.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("traffic service shut down");
    }
}
