//! City traffic simulator: road flow and speed, district congestion, and
//! discrete traffic events, advanced one tick at a time and projected into
//! per-topic messages.

pub mod clock;
pub mod demo;
pub mod events;
pub mod network;
pub mod params;
pub mod projection;
pub mod simulator;
pub mod templates;
pub mod topic;
pub mod traffic;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use clock::{FixedClock, SystemClock, WallClock};
pub use network::ShapeInput;
pub use params::SimulatorParams;
pub use projection::TrafficSnapshot;
pub use simulator::{TickSummary, TrafficSimulator};
pub use topic::{Topic, UnknownTopic};
