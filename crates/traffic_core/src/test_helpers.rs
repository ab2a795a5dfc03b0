//! Test helpers for common test setup and utilities.
//!
//! Shared shape fixtures so unit tests, integration tests and benches build
//! the same network.

use std::sync::Arc;

use crate::clock::FixedClock;
use crate::demo::synthetic_network;
use crate::network::ShapeInput;
use crate::params::{GeoBounds, SimulatorParams};
use crate::simulator::TrafficSimulator;

/// Seed used for every fixture network.
pub const TEST_SEED: u64 = 42;

/// `count` road shapes with ids `road-0..road-{count-1}`.
pub fn road_shapes(count: usize) -> Vec<ShapeInput> {
    synthetic_network(TEST_SEED, count, &GeoBounds::default()).roads
}

/// The five known districts.
pub fn district_shapes() -> Vec<ShapeInput> {
    synthetic_network(TEST_SEED, 0, &GeoBounds::default()).districts
}

/// A seeded simulator whose clock is pinned to `hour`.
pub fn test_simulator(road_count: usize, hour: u32) -> (TrafficSimulator, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::at_hour(hour));
    let simulator = TrafficSimulator::new(
        &road_shapes(road_count),
        &district_shapes(),
        SimulatorParams::default().with_seed(TEST_SEED),
        clock.clone(),
    );
    (simulator, clock)
}
