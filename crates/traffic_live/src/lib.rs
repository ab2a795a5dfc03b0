//! Live push service over the traffic simulator.
//!
//! A fixed-cadence tick loop advances the shared [traffic_core::TrafficSimulator]
//! and fans each subscribed topic's projection out to its connections. The
//! transport sits behind [connection::Connection]; see `src/bin/traffic_live.rs`
//! for the process wiring.

pub mod broadcaster;
pub mod config;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod scheduler;
pub mod service;

pub use broadcaster::{BroadcastReport, TopicBroadcaster};
pub use config::LiveConfig;
pub use connection::{ChannelConnection, Connection, ConnectionId, Payload};
pub use error::{ConfigError, ProjectionError, SchedulerError, SendError};
pub use heartbeat::{spawn_heartbeat, HeartbeatHandle};
pub use scheduler::{Pacer, SchedulerStatus, TickReport, TickTimings, TokioPacer, UpdateScheduler};
pub use service::TrafficService;
