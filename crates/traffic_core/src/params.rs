use crate::traffic::{TimeOfDayProfile, TrafficProfileKind};

/// Default bounding box: Shenzhen, China (approx).
const DEFAULT_LNG_MIN: f64 = 113.8;
const DEFAULT_LNG_MAX: f64 = 114.3;
const DEFAULT_LAT_MIN: f64 = 22.5;
const DEFAULT_LAT_MAX: f64 = 22.8;

/// Geographic bounding box (degrees) that random event points fall inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub lng_min: f64,
    pub lng_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self {
            lng_min: DEFAULT_LNG_MIN,
            lng_max: DEFAULT_LNG_MAX,
            lat_min: DEFAULT_LAT_MIN,
            lat_max: DEFAULT_LAT_MAX,
        }
    }
}

impl GeoBounds {
    /// Corners may be given in any order.
    pub fn new(lng_a: f64, lng_b: f64, lat_a: f64, lat_b: f64) -> Self {
        Self {
            lng_min: lng_a.min(lng_b),
            lng_max: lng_a.max(lng_b),
            lat_min: lat_a.min(lat_b),
            lat_max: lat_a.max(lat_b),
        }
    }

    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        (self.lng_min..=self.lng_max).contains(&lng) && (self.lat_min..=self.lat_max).contains(&lat)
    }

    /// Point at fractions `(u, v)` of the box, each in [0, 1].
    pub fn point_at(&self, u: f64, v: f64) -> [f64; 2] {
        [
            self.lng_min + u * (self.lng_max - self.lng_min),
            self.lat_min + v * (self.lat_max - self.lat_min),
        ]
    }
}

/// Per-tick probabilities driving the event lifecycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventLifecycle {
    /// Chance that a live event attempts a status transition this tick.
    pub transition_attempt: f64,
    /// Given an attempt, chance that a processing accident is cleared.
    pub accident_clear: f64,
    /// Given an attempt, chance that ongoing congestion eases.
    pub congestion_ease: f64,
    /// Given an attempt, chance that weather eases. Weather changes slowly.
    pub weather_ease: f64,
    /// Chance that a terminal event is dropped from the live set this tick.
    pub evict_terminal: f64,
    /// Chance that one new event is generated this tick.
    pub spawn: f64,
    /// No new events are generated while this many are live.
    pub max_live: usize,
}

impl Default for EventLifecycle {
    fn default() -> Self {
        Self {
            transition_attempt: 0.2,
            accident_clear: 0.3,
            congestion_ease: 0.4,
            weather_ease: 0.1,
            evict_terminal: 0.3,
            spawn: 0.2,
            max_live: 15,
        }
    }
}

/// Parameters for building a [crate::simulator::TrafficSimulator].
#[derive(Debug, Clone)]
pub struct SimulatorParams {
    /// Random seed for reproducibility (optional; if None, uses entropy).
    pub seed: Option<u64>,
    pub bounds: GeoBounds,
    pub profile: TimeOfDayProfile,
    pub lifecycle: EventLifecycle,
    /// Events seeded at construction, uniform in `min..=max` and capped at `lifecycle.max_live`.
    pub initial_events_min: usize,
    pub initial_events_max: usize,
}

impl Default for SimulatorParams {
    fn default() -> Self {
        Self {
            seed: None,
            bounds: GeoBounds::default(),
            profile: TimeOfDayProfile::default(),
            lifecycle: EventLifecycle::default(),
            initial_events_min: 5,
            initial_events_max: 10,
        }
    }
}

impl SimulatorParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_bounds(mut self, bounds: GeoBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_profile(mut self, kind: &TrafficProfileKind) -> Self {
        self.profile = TimeOfDayProfile::from_kind(kind);
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: EventLifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Number of events seeded at construction: `min..=max`.
    pub fn with_initial_events(mut self, min: usize, max: usize) -> Self {
        self.initial_events_min = min.min(max);
        self.initial_events_max = min.max(max);
        self
    }
}
