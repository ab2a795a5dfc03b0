//! Road segments and district aggregates.
//!
//! Geometry arrives from the loader as opaque GeoJSON and is shared, never
//! inspected. Derived fields (`congestion_level`, `trend`) have no setters;
//! they are recomputed whenever the values they depend on change.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::templates::{ROAD_NAMES, UNKNOWN_DISTRICT};
use crate::traffic::speed_suppression;

pub const MIN_SPEED_KMH: f64 = 5.0;
pub const MAX_SPEED_KMH: f64 = 120.0;
pub const MIN_CONGESTION_INDEX: f64 = 5.0;
pub const MAX_CONGESTION_INDEX: f64 = 9.0;
/// Floor that keeps a road from draining to zero overnight and never
/// recovering, since each tick scales flow multiplicatively.
pub const MIN_ROAD_FLOW: i64 = 50;
/// Ceiling for peak-hour compounding. Speed suppression is already at its
/// floor well below this.
pub const MAX_ROAD_FLOW: i64 = 10_000;
pub const MIN_DISTRICT_FLOW: i64 = 50;
pub const MAX_DISTRICT_FLOW: i64 = 100;

/// One named shape from the geometry loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShapeInput {
    pub id: Option<String>,
    pub name: Option<String>,
    /// Road class, 1 (arterial) to 5 (minor). Ignored for districts.
    pub level: Option<u8>,
    pub geometry: Value,
}

impl ShapeInput {
    pub fn new(id: impl Into<String>, name: impl Into<String>, geometry: Value) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            level: None,
            geometry,
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }
}

/// Ordinal congestion classification of a road, derived from speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub enum CongestionLevel {
    FreeFlow = 1,
    Light = 2,
    Moderate = 3,
    Severe = 4,
}

impl CongestionLevel {
    /// `> 50` free flow, `> 30` light, `> 15` moderate, otherwise severe.
    pub fn from_speed(speed_kmh: f64) -> Self {
        if speed_kmh > 50.0 {
            CongestionLevel::FreeFlow
        } else if speed_kmh > 30.0 {
            CongestionLevel::Light
        } else if speed_kmh > 15.0 {
            CongestionLevel::Moderate
        } else {
            CongestionLevel::Severe
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<CongestionLevel> for u8 {
    fn from(level: CongestionLevel) -> Self {
        level.as_u8()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen::<bool>() {
            Trend::Up
        } else {
            Trend::Down
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoadSegment {
    pub id: String,
    pub name: String,
    pub geometry: Arc<Value>,
    flow: i64,
    speed: f64,
    congestion_level: CongestionLevel,
}

impl RoadSegment {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        geometry: Arc<Value>,
        flow: i64,
        speed_kmh: f64,
    ) -> Self {
        let mut road = Self {
            id: id.into(),
            name: name.into(),
            geometry,
            flow: flow.clamp(MIN_ROAD_FLOW, MAX_ROAD_FLOW),
            speed: MIN_SPEED_KMH,
            congestion_level: CongestionLevel::Severe,
        };
        road.set_speed(speed_kmh);
        road
    }

    /// Seed a road from a loader shape. The road class drives the base
    /// flow and speed; missing ids and names are filled in.
    pub fn from_shape<R: Rng + ?Sized>(index: usize, shape: &ShapeInput, rng: &mut R) -> Self {
        let id = shape
            .id
            .clone()
            .unwrap_or_else(|| format!("road-{index}"));
        let name = shape
            .name
            .clone()
            .unwrap_or_else(|| ROAD_NAMES[rng.gen_range(0..ROAD_NAMES.len())].to_string());
        let level = shape
            .level
            .map(|l| l.clamp(1, 5))
            .unwrap_or_else(|| rng.gen_range(1..=5));
        let class_weight = i64::from(6 - level);
        let flow = class_weight * 500 + rng.gen_range(-200..=200);
        let speed = (class_weight * 10 + rng.gen_range(5..=15)) as f64;

        Self::new(id, name, Arc::new(shape.geometry.clone()), flow, speed)
    }

    pub fn flow(&self) -> i64 {
        self.flow
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn congestion_level(&self) -> CongestionLevel {
        self.congestion_level
    }

    /// Clamp to [5, 120] km/h, round to 0.1 and reclassify.
    pub fn set_speed(&mut self, speed_kmh: f64) {
        let speed = if speed_kmh.is_nan() {
            MIN_SPEED_KMH
        } else {
            speed_kmh.clamp(MIN_SPEED_KMH, MAX_SPEED_KMH)
        };
        self.speed = round1(speed);
        self.congestion_level = CongestionLevel::from_speed(self.speed);
    }

    /// One tick: jitter flow and speed by the given relative amounts, scale
    /// flow by the time-of-day factor, then suppress speed by the new flow.
    /// Flow stays within [MIN_ROAD_FLOW, MAX_ROAD_FLOW].
    pub fn apply_tick(&mut self, flow_jitter: f64, speed_jitter: f64, time_factor: f64) {
        let new_flow = (self.flow as f64 * (1.0 + flow_jitter) * time_factor) as i64;
        self.flow = new_flow.clamp(MIN_ROAD_FLOW, MAX_ROAD_FLOW);
        let new_speed = self.speed * (1.0 + speed_jitter) * speed_suppression(self.flow);
        self.set_speed(new_speed);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistrictAggregate {
    pub id: String,
    pub name: String,
    pub geometry: Arc<Value>,
    congestion_index: f64,
    flow_value: i64,
    trend: Trend,
}

impl DistrictAggregate {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        geometry: Arc<Value>,
        congestion_index: f64,
        flow_value: i64,
        trend: Trend,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            geometry,
            congestion_index: clamp_index(congestion_index),
            flow_value: flow_value.clamp(MIN_DISTRICT_FLOW, MAX_DISTRICT_FLOW),
            trend,
        }
    }

    pub fn from_shape<R: Rng + ?Sized>(index: usize, shape: &ShapeInput, rng: &mut R) -> Self {
        let id = shape
            .id
            .clone()
            .unwrap_or_else(|| format!("district-{index}"));
        let name = shape
            .name
            .clone()
            .unwrap_or_else(|| UNKNOWN_DISTRICT.to_string());
        let congestion_index = 5.0 + rng.gen::<f64>() * 4.0;
        let flow_value = rng.gen_range(60..=95);
        let trend = Trend::random(rng);

        Self::new(
            id,
            name,
            Arc::new(shape.geometry.clone()),
            congestion_index,
            flow_value,
            trend,
        )
    }

    pub fn congestion_index(&self) -> f64 {
        self.congestion_index
    }

    pub fn flow_value(&self) -> i64 {
        self.flow_value
    }

    pub fn trend(&self) -> Trend {
        self.trend
    }

    /// One tick: jitter both values, clamp, and set the trend from the
    /// change in congestion index.
    pub fn apply_tick(&mut self, index_jitter: f64, flow_jitter: i64) {
        let previous = self.congestion_index;
        self.congestion_index = clamp_index(previous + index_jitter);
        self.flow_value =
            (self.flow_value + flow_jitter).clamp(MIN_DISTRICT_FLOW, MAX_DISTRICT_FLOW);
        self.trend = if self.congestion_index > previous {
            Trend::Up
        } else {
            Trend::Down
        };
    }
}

fn clamp_index(index: f64) -> f64 {
    let index = if index.is_nan() {
        MIN_CONGESTION_INDEX
    } else {
        index.clamp(MIN_CONGESTION_INDEX, MAX_CONGESTION_INDEX)
    };
    round1(index)
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
