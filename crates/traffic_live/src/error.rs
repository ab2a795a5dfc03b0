use thiserror::Error;
use traffic_core::Topic;

/// Failure delivering one message to one connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Failure producing a topic message from the simulator.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// A previous holder of the simulator lock panicked.
    #[error("simulator lock poisoned")]
    SimulatorPoisoned,

    /// The tick panicked; the loop caught it and keeps going.
    #[error("tick panicked: {0}")]
    TickPanicked(String),

    #[error("failed to serialize {topic} projection: {source}")]
    Serialize {
        topic: Topic,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("scheduler must be started from within a tokio runtime")]
    NoRuntime,

    #[error("invalid tick interval: {0} s (must be finite and positive)")]
    InvalidInterval(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be finite and positive, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },
}
