//! Broadcast topic identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of channels a subscriber can opt into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    RoadFlow,
    TrafficEvents,
    DistrictData,
    Statistics,
    TrendData,
    PredictionData,
    HotspotsData,
    AllData,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl Topic {
    pub const COUNT: usize = 8;

    pub const ALL: [Topic; Topic::COUNT] = [
        Topic::RoadFlow,
        Topic::TrafficEvents,
        Topic::DistrictData,
        Topic::Statistics,
        Topic::TrendData,
        Topic::PredictionData,
        Topic::HotspotsData,
        Topic::AllData,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::RoadFlow => "road_flow",
            Topic::TrafficEvents => "traffic_events",
            Topic::DistrictData => "district_data",
            Topic::Statistics => "statistics",
            Topic::TrendData => "trend_data",
            Topic::PredictionData => "prediction_data",
            Topic::HotspotsData => "hotspots_data",
            Topic::AllData => "all_data",
        }
    }

    /// Position in [Topic::ALL].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}
