//! The traffic simulator: canonical state plus the per-tick update.
//!
//! [TrafficSimulator::advance] is synchronous and CPU-only. Readers never see
//! the live collections; they get a [TrafficSnapshot] copy taken after a tick.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::clock::WallClock;
use crate::events::{LiveEvents, TrafficEvent};
use crate::network::{DistrictAggregate, RoadSegment, ShapeInput};
use crate::params::SimulatorParams;
use crate::projection::TrafficSnapshot;

/// Relative flow jitter per tick (±15%).
const FLOW_JITTER: f64 = 0.15;
/// Relative speed jitter per tick (±10%).
const SPEED_JITTER: f64 = 0.10;
/// Absolute congestion-index jitter per tick.
const INDEX_JITTER: f64 = 0.3;
/// Absolute district flow jitter per tick.
const DISTRICT_FLOW_JITTER: i64 = 5;

/// What one call to [TrafficSimulator::advance] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSummary {
    pub tick: u64,
    pub hour: u32,
    pub time_factor: f64,
    pub live_events: usize,
    pub resolved: usize,
    pub evicted: usize,
    pub spawned: Option<u64>,
}

pub struct TrafficSimulator {
    roads: Vec<RoadSegment>,
    districts: Vec<DistrictAggregate>,
    events: LiveEvents,
    params: SimulatorParams,
    rng: StdRng,
    clock: Arc<dyn WallClock>,
    tick: u64,
}

impl std::fmt::Debug for TrafficSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficSimulator")
            .field("roads", &self.roads.len())
            .field("districts", &self.districts.len())
            .field("events", &self.events.len())
            .field("tick", &self.tick)
            .finish()
    }
}

impl TrafficSimulator {
    /// Seed one road per road shape, one district per district shape, and
    /// the initial batch of events.
    pub fn new(
        road_shapes: &[ShapeInput],
        district_shapes: &[ShapeInput],
        params: SimulatorParams,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let roads = road_shapes
            .iter()
            .enumerate()
            .map(|(i, shape)| RoadSegment::from_shape(i, shape, &mut rng))
            .collect();
        let districts = district_shapes
            .iter()
            .enumerate()
            .map(|(i, shape)| DistrictAggregate::from_shape(i, shape, &mut rng))
            .collect();

        let mut events = LiveEvents::default();
        let initial = rng
            .gen_range(params.initial_events_min..=params.initial_events_max)
            .min(params.lifecycle.max_live);
        let now = clock.now();
        for _ in 0..initial {
            events.generate(&mut rng, now, &params.bounds);
        }

        debug!(
            roads = road_shapes.len(),
            districts = district_shapes.len(),
            events = initial,
            "traffic simulator seeded"
        );

        Self {
            roads,
            districts,
            events,
            params,
            rng,
            clock,
            tick: 0,
        }
    }

    /// Advance the state by one time-step.
    pub fn advance(&mut self) -> TickSummary {
        let now = self.clock.now();
        let hour = self.clock.hour();
        let time_factor = self.params.profile.factor_for_hour(hour);

        for road in &mut self.roads {
            let flow_jitter = self.rng.gen_range(-FLOW_JITTER..=FLOW_JITTER);
            let speed_jitter = self.rng.gen_range(-SPEED_JITTER..=SPEED_JITTER);
            road.apply_tick(flow_jitter, speed_jitter, time_factor);
        }

        for district in &mut self.districts {
            let index_jitter = self.rng.gen_range(-INDEX_JITTER..=INDEX_JITTER);
            let flow_jitter = self
                .rng
                .gen_range(-DISTRICT_FLOW_JITTER..=DISTRICT_FLOW_JITTER);
            district.apply_tick(index_jitter, flow_jitter);
        }

        let step = self.events.step(
            &mut self.rng,
            now,
            &self.params.bounds,
            &self.params.lifecycle,
        );

        self.tick += 1;
        let summary = TickSummary {
            tick: self.tick,
            hour,
            time_factor,
            live_events: self.events.len(),
            resolved: step.resolved,
            evicted: step.evicted,
            spawned: step.spawned,
        };
        trace!(?summary, "traffic tick");
        summary
    }

    /// Deep copy of the current state for projection.
    pub fn snapshot(&self) -> TrafficSnapshot {
        TrafficSnapshot {
            taken_at: self.clock.now(),
            tick: self.tick,
            roads: self.roads.clone(),
            districts: self.districts.clone(),
            events: self.events.as_slice().to_vec(),
        }
    }

    pub fn roads(&self) -> &[RoadSegment] {
        &self.roads
    }

    pub fn districts(&self) -> &[DistrictAggregate] {
        &self.districts
    }

    pub fn events(&self) -> &[TrafficEvent] {
        self.events.as_slice()
    }

    /// Id the next generated event will receive.
    pub fn next_event_id(&self) -> u64 {
        self.events.next_id()
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn params(&self) -> &SimulatorParams {
        &self.params
    }

    /// Direct access to a road, for driving scenarios in tests.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn road_mut(&mut self, id: &str) -> Option<&mut RoadSegment> {
        self.roads.iter_mut().find(|road| road.id == id)
    }
}
