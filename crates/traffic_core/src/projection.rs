//! Read-only projections of a [TrafficSnapshot], one per topic.
//!
//! Every projection is computed from the snapshot alone. Those carrying
//! synthetic noise (comparisons, trend, prediction, hotspots) take the random
//! source as an argument so callers decide how it is seeded.

use std::sync::Arc;

use chrono::{DateTime, Local, Timelike};
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};

use crate::events::{EventKind, EventStatus, Severity, TrafficEvent};
use crate::network::{
    round1, CongestionLevel, DistrictAggregate, RoadSegment, Trend, MAX_CONGESTION_INDEX,
    MIN_CONGESTION_INDEX,
};
use crate::templates::{congestion_fill, places_for, FALLBACK_PLACE};
use crate::topic::Topic;
use crate::traffic::{prediction_base, trend_base};

/// Copy of the simulator state after one tick.
#[derive(Debug, Clone)]
pub struct TrafficSnapshot {
    pub taken_at: DateTime<Local>,
    pub tick: u64,
    pub roads: Vec<RoadSegment>,
    pub districts: Vec<DistrictAggregate>,
    pub events: Vec<TrafficEvent>,
}

// ---------------------------------------------------------------------------
// GeoJSON
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection<P> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature<P>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feature<P> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: P,
    pub geometry: Arc<Value>,
}

impl<P> FromIterator<Feature<P>> for FeatureCollection<P> {
    fn from_iter<I: IntoIterator<Item = Feature<P>>>(iter: I) -> Self {
        Self {
            kind: "FeatureCollection",
            features: iter.into_iter().collect(),
        }
    }
}

fn feature<P>(properties: P, geometry: Arc<Value>) -> Feature<P> {
    Feature {
        kind: "Feature",
        properties,
        geometry,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoadFlowProperties {
    pub id: String,
    pub name: String,
    #[serde(rename = "FLOW")]
    pub flow: i64,
    #[serde(rename = "SPEED")]
    pub speed: f64,
    #[serde(rename = "CONGESTION")]
    pub congestion: CongestionLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventProperties {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub location: String,
    /// Local `HH:MM` the event was reported.
    pub time: String,
    pub status: EventStatus,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistrictProperties {
    pub id: String,
    pub name: String,
    pub congestion_index: f64,
    pub flow_value: i64,
    pub trend: Trend,
}

// ---------------------------------------------------------------------------
// Dashboard panels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficStatistics {
    pub total_vehicles: i64,
    pub peak_hour_flow: i64,
    pub average_speed: f64,
    pub congestion_index: f64,
    pub traffic_events: usize,
    pub comparison_yesterday: f64,
    pub comparison_last_week: f64,
    pub district_data: Vec<DistrictShare>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DistrictShare {
    pub name: String,
    pub value: i64,
    pub fill: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub hour: String,
    pub main_road: i64,
    pub secondary_road: i64,
    pub branch_road: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendData {
    pub trend_data: Vec<TrendPoint>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionPoint {
    pub hour: String,
    pub predicted_flow: i64,
    pub predicted_congestion_index: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionData {
    pub prediction_data: Vec<PredictionPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotStatus {
    Severe,
    Moderate,
    Light,
}

impl HotspotStatus {
    pub fn from_level(level: f64) -> Self {
        if level >= 8.0 {
            HotspotStatus::Severe
        } else if level >= 7.0 {
            HotspotStatus::Moderate
        } else {
            HotspotStatus::Light
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub id: usize,
    pub name: String,
    pub congestion_level: f64,
    pub trend: Trend,
    pub status: HotspotStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HotspotsData {
    pub hotspots: Vec<Hotspot>,
}

/// Everything at once, as pushed on the `all_data` topic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficBundle {
    pub timestamp: i64,
    pub flow_data: FeatureCollection<RoadFlowProperties>,
    pub events_data: FeatureCollection<EventProperties>,
    pub district_data: FeatureCollection<DistrictProperties>,
    pub statistics: TrafficStatistics,
    pub trend_data: TrendData,
    pub prediction_data: PredictionData,
    pub hotspots_data: HotspotsData,
}

/// `{timestamp, data}` wrapper used by every topic except `all_data`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub timestamp: i64,
    pub data: T,
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

impl TrafficSnapshot {
    /// Epoch seconds the snapshot was taken.
    pub fn timestamp(&self) -> i64 {
        self.taken_at.timestamp()
    }

    pub fn flow_collection(&self) -> FeatureCollection<RoadFlowProperties> {
        self.roads
            .iter()
            .map(|road| {
                feature(
                    RoadFlowProperties {
                        id: road.id.clone(),
                        name: road.name.clone(),
                        flow: road.flow(),
                        speed: road.speed(),
                        congestion: road.congestion_level(),
                    },
                    Arc::clone(&road.geometry),
                )
            })
            .collect()
    }

    pub fn event_collection(&self) -> FeatureCollection<EventProperties> {
        self.events
            .iter()
            .map(|event| {
                let point = json!({ "type": "Point", "coordinates": event.coordinates });
                feature(
                    EventProperties {
                        id: event.id,
                        kind: event.kind,
                        location: event.location.clone(),
                        time: event.created_at.format("%H:%M").to_string(),
                        status: event.status(),
                        severity: event.severity,
                        description: event.description.clone(),
                    },
                    Arc::new(point),
                )
            })
            .collect()
    }

    pub fn district_collection(&self) -> FeatureCollection<DistrictProperties> {
        self.districts
            .iter()
            .map(|district| {
                feature(
                    DistrictProperties {
                        id: district.id.clone(),
                        name: district.name.clone(),
                        congestion_index: district.congestion_index(),
                        flow_value: district.flow_value(),
                        trend: district.trend(),
                    },
                    Arc::clone(&district.geometry),
                )
            })
            .collect()
    }

    /// Rolling totals. Empty collections give zeros.
    pub fn statistics<R: Rng + ?Sized>(&self, rng: &mut R) -> TrafficStatistics {
        let total_vehicles = self
            .roads
            .iter()
            .map(RoadSegment::flow)
            .fold(0i64, i64::saturating_add);
        let peak_hour_flow = self.roads.iter().map(RoadSegment::flow).max().unwrap_or(0);
        let average_speed = mean(self.roads.iter().map(RoadSegment::speed));
        let congestion_index = mean(
            self.districts
                .iter()
                .map(DistrictAggregate::congestion_index),
        );

        TrafficStatistics {
            total_vehicles,
            peak_hour_flow,
            average_speed: round1(average_speed),
            congestion_index: round1(congestion_index),
            traffic_events: self.events.len(),
            comparison_yesterday: round1(rng.gen_range(-8.0..=8.0)),
            comparison_last_week: round1(rng.gen_range(-8.0..=8.0)),
            district_data: self
                .districts
                .iter()
                .map(|district| DistrictShare {
                    name: district.name.clone(),
                    value: district.flow_value(),
                    fill: congestion_fill(district.congestion_index()),
                })
                .collect(),
        }
    }

    /// Past 24 hours, oldest first, ending at the current hour.
    pub fn trend<R: Rng + ?Sized>(&self, rng: &mut R) -> TrendData {
        let current = self.taken_at.hour();
        let trend_data = (0..24)
            .map(|i| {
                let hour = (current + 1 + i) % 24;
                let main = trend_base(hour, rng);
                TrendPoint {
                    hour: format!("{hour}:00"),
                    main_road: main as i64,
                    secondary_road: (main * 0.6) as i64,
                    branch_road: (main * 0.3) as i64,
                }
            })
            .collect();
        TrendData { trend_data }
    }

    /// Next 24 hours, starting at the current hour.
    pub fn prediction<R: Rng + ?Sized>(&self, rng: &mut R) -> PredictionData {
        let current = self.taken_at.hour();
        let prediction_data = (0..24)
            .map(|i| {
                let hour = (current + i) % 24;
                let value = prediction_base(hour, rng) + rng.gen::<f64>() * 5.0;
                PredictionPoint {
                    hour: format!("{hour}:00"),
                    predicted_flow: value as i64,
                    predicted_congestion_index: round1(value / 20.0 + 3.0),
                }
            })
            .collect();
        PredictionData { prediction_data }
    }

    /// One or two hotspots per district, near the district's index.
    pub fn hotspots<R: Rng + ?Sized>(&self, rng: &mut R) -> HotspotsData {
        let mut hotspots = Vec::new();
        for district in &self.districts {
            let count = rng.gen_range(1..=2);
            for _ in 0..count {
                let place = match places_for(&district.name) {
                    Some(places) => places[rng.gen_range(0..places.len())],
                    None => FALLBACK_PLACE,
                };
                let level = (district.congestion_index() + rng.gen_range(-0.5..=0.5))
                    .clamp(MIN_CONGESTION_INDEX, MAX_CONGESTION_INDEX);
                let level = round1(level);
                hotspots.push(Hotspot {
                    id: hotspots.len() + 1,
                    name: format!("{} {}", district.name, place),
                    congestion_level: level,
                    trend: Trend::random(rng),
                    status: HotspotStatus::from_level(level),
                });
            }
        }
        HotspotsData { hotspots }
    }

    pub fn bundle<R: Rng + ?Sized>(&self, rng: &mut R) -> TrafficBundle {
        TrafficBundle {
            timestamp: self.timestamp(),
            flow_data: self.flow_collection(),
            events_data: self.event_collection(),
            district_data: self.district_collection(),
            statistics: self.statistics(rng),
            trend_data: self.trend(rng),
            prediction_data: self.prediction(rng),
            hotspots_data: self.hotspots(rng),
        }
    }

    /// The message a subscriber of `topic` receives for this snapshot.
    pub fn project<R: Rng + ?Sized>(
        &self,
        topic: Topic,
        rng: &mut R,
    ) -> Result<Value, serde_json::Error> {
        match topic {
            Topic::RoadFlow => self.envelope(self.flow_collection()),
            Topic::TrafficEvents => self.envelope(self.event_collection()),
            Topic::DistrictData => self.envelope(self.district_collection()),
            Topic::Statistics => self.envelope(self.statistics(rng)),
            Topic::TrendData => self.envelope(self.trend(rng)),
            Topic::PredictionData => self.envelope(self.prediction(rng)),
            Topic::HotspotsData => self.envelope(self.hotspots(rng)),
            Topic::AllData => serde_json::to_value(self.bundle(rng)),
        }
    }

    fn envelope<T: Serialize>(&self, data: T) -> Result<Value, serde_json::Error> {
        serde_json::to_value(Envelope {
            timestamp: self.timestamp(),
            data,
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
