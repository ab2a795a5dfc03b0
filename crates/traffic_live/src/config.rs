//! Runtime configuration for the live service.

use std::time::Duration;

use traffic_core::params::SimulatorParams;
use traffic_core::traffic::TrafficProfileKind;

use crate::error::ConfigError;
use crate::scheduler::TickTimings;

#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    /// Seconds between ticks.
    pub interval_secs: f64,
    /// Pause after a failed tick.
    pub recovery_secs: f64,
    /// Shortest pause between ticks.
    pub min_sleep_secs: f64,
    /// Seconds between keep-alive messages.
    pub heartbeat_secs: f64,
    /// Fixes both simulator and projection randomness when set.
    pub seed: Option<u64>,
    /// Roads in the generated demo network.
    pub road_count: usize,
    pub profile: TrafficProfileKind,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5.0,
            recovery_secs: 5.0,
            min_sleep_secs: 0.1,
            heartbeat_secs: 30.0,
            seed: None,
            road_count: 40,
            profile: TrafficProfileKind::default(),
        }
    }
}

impl LiveConfig {
    pub fn with_interval_secs(mut self, secs: f64) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn with_recovery_secs(mut self, secs: f64) -> Self {
        self.recovery_secs = secs;
        self
    }

    pub fn with_min_sleep_secs(mut self, secs: f64) -> Self {
        self.min_sleep_secs = secs;
        self
    }

    pub fn with_heartbeat_secs(mut self, secs: f64) -> Self {
        self.heartbeat_secs = secs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_road_count(mut self, road_count: usize) -> Self {
        self.road_count = road_count;
        self
    }

    pub fn with_profile(mut self, profile: TrafficProfileKind) -> Self {
        self.profile = profile;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("interval_secs", self.interval_secs),
            ("recovery_secs", self.recovery_secs),
            ("min_sleep_secs", self.min_sleep_secs),
            ("heartbeat_secs", self.heartbeat_secs),
        ] {
            secs_to_duration(field, value)?;
        }
        Ok(())
    }

    pub fn timings(&self) -> Result<TickTimings, ConfigError> {
        Ok(TickTimings {
            recovery: secs_to_duration("recovery_secs", self.recovery_secs)?,
            min_sleep: secs_to_duration("min_sleep_secs", self.min_sleep_secs)?,
        })
    }

    pub fn heartbeat_interval(&self) -> Result<Duration, ConfigError> {
        secs_to_duration("heartbeat_secs", self.heartbeat_secs)
    }

    pub fn simulator_params(&self) -> SimulatorParams {
        let params = SimulatorParams::default().with_profile(&self.profile);
        match self.seed {
            Some(seed) => params.with_seed(seed),
            None => params,
        }
    }

    /// Projection randomness is seeded apart from the simulator so that
    /// subscribing to extra topics doesn't change the simulated values.
    pub fn projection_seed(&self) -> Option<u64> {
        self.seed.map(|seed| seed.wrapping_add(1))
    }
}

fn secs_to_duration(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::InvalidDuration { field, value });
    }
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = LiveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.heartbeat_interval(), Ok(Duration::from_secs(30)));
        let timings = config.timings().unwrap();
        assert_eq!(timings.recovery, Duration::from_secs(5));
        assert_eq!(timings.min_sleep, Duration::from_millis(100));
    }

    #[test]
    fn non_positive_durations_are_rejected() {
        let config = LiveConfig::default().with_heartbeat_secs(0.0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidDuration {
                field: "heartbeat_secs",
                value: 0.0
            })
        );
        assert!(LiveConfig::default()
            .with_interval_secs(f64::NAN)
            .validate()
            .is_err());
        assert!(LiveConfig::default()
            .with_min_sleep_secs(-0.1)
            .timings()
            .is_err());
    }

    #[test]
    fn seed_flows_to_simulator_and_projection() {
        let config = LiveConfig::default().with_seed(7);
        assert_eq!(config.simulator_params().seed, Some(7));
        assert_eq!(config.projection_seed(), Some(8));
        assert_eq!(LiveConfig::default().projection_seed(), None);
    }
}
