#![allow(dead_code)]

use std::sync::Arc;

use traffic_core::clock::FixedClock;
use traffic_core::params::{EventLifecycle, SimulatorParams};
use traffic_core::test_helpers::{district_shapes, road_shapes, TEST_SEED};
use traffic_core::traffic::TrafficProfileKind;
use traffic_core::TrafficSimulator;

/// Builder for reproducible simulators pinned to a fixed hour.
#[derive(Clone, Debug)]
pub struct TestSimulatorBuilder {
    pub seed: u64,
    pub road_count: usize,
    pub hour: u32,
    pub profile: TrafficProfileKind,
    pub lifecycle: EventLifecycle,
}

impl Default for TestSimulatorBuilder {
    fn default() -> Self {
        Self {
            seed: TEST_SEED,
            road_count: 10,
            hour: 12,
            profile: TrafficProfileKind::default(),
            lifecycle: EventLifecycle::default(),
        }
    }
}

impl TestSimulatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_roads(mut self, road_count: usize) -> Self {
        self.road_count = road_count;
        self
    }

    pub fn at_hour(mut self, hour: u32) -> Self {
        self.hour = hour;
        self
    }

    pub fn with_profile(mut self, profile: TrafficProfileKind) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: EventLifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn build(self) -> (TrafficSimulator, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::at_hour(self.hour));
        let params = SimulatorParams::default()
            .with_seed(self.seed)
            .with_profile(&self.profile)
            .with_lifecycle(self.lifecycle);
        let simulator = TrafficSimulator::new(
            &road_shapes(self.road_count),
            &district_shapes(),
            params,
            clock.clone(),
        );
        (simulator, clock)
    }
}

/// Road speeds and flows, for comparing runs.
pub fn road_state(simulator: &TrafficSimulator) -> Vec<(i64, f64)> {
    simulator
        .roads()
        .iter()
        .map(|road| (road.flow(), road.speed()))
        .collect()
}
