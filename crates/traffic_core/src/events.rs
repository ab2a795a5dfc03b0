//! Discrete traffic events: accidents, construction, congestion and weather.
//!
//! Events are sampled from the template tables in [crate::templates], move at
//! most once from an active status to a terminal one, and are evicted some
//! time after becoming terminal. Ids come from a counter that is never reset.

use chrono::{DateTime, Duration, Local};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::params::{EventLifecycle, GeoBounds};
use crate::templates::{descriptions, DISTRICT_PLACES, ROAD_NAMES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Accident,
    Construction,
    Congestion,
    Weather,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Accident,
        EventKind::Construction,
        EventKind::Congestion,
        EventKind::Weather,
    ];

    /// Status a freshly reported event of this kind starts in.
    pub fn active_status(self) -> EventStatus {
        match self {
            EventKind::Accident => EventStatus::Processing,
            EventKind::Construction => EventStatus::InProgress,
            EventKind::Congestion | EventKind::Weather => EventStatus::Ongoing,
        }
    }

    /// Terminal status, if events of this kind ever resolve.
    pub fn terminal_status(self) -> Option<EventStatus> {
        match self {
            EventKind::Accident => Some(EventStatus::Cleared),
            EventKind::Construction => None,
            EventKind::Congestion | EventKind::Weather => Some(EventStatus::Eased),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Processing,
    Cleared,
    InProgress,
    Ongoing,
    Eased,
}

impl EventStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Cleared | EventStatus::Eased)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Severe,
    Moderate,
    Minor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficEvent {
    pub id: u64,
    pub kind: EventKind,
    pub location: String,
    /// `[lng, lat]`.
    pub coordinates: [f64; 2],
    pub created_at: DateTime<Local>,
    status: EventStatus,
    pub severity: Severity,
    pub description: String,
}

impl TrafficEvent {
    pub fn status(&self) -> EventStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Rolls the kind-specific resolution chance. Returns `true` if the
    /// status moved to its terminal value.
    fn try_resolve<R: Rng + ?Sized>(&mut self, rng: &mut R, lifecycle: &EventLifecycle) -> bool {
        if self.is_terminal() {
            return false;
        }
        let (chance_p, terminal) = match (self.kind, self.kind.terminal_status()) {
            (EventKind::Accident, Some(t)) => (lifecycle.accident_clear, t),
            (EventKind::Congestion, Some(t)) => (lifecycle.congestion_ease, t),
            (EventKind::Weather, Some(t)) => (lifecycle.weather_ease, t),
            _ => return false,
        };
        if chance(rng, chance_p) {
            self.status = terminal;
            true
        } else {
            false
        }
    }
}

/// Sample one event from the template tables.
///
/// The event gets `id`, a random kind and district location, a point inside
/// `bounds`, and a creation time within the two hours before `now`.
pub fn sample_event<R: Rng + ?Sized>(
    rng: &mut R,
    id: u64,
    now: DateTime<Local>,
    bounds: &GeoBounds,
) -> TrafficEvent {
    let kind = *pick(rng, &EventKind::ALL);
    let (district, places) = *pick(rng, DISTRICT_PLACES);
    let place = *pick(rng, places);
    let road = *pick(rng, ROAD_NAMES);

    let coordinates = bounds.point_at(rng.gen(), rng.gen());
    let minutes_ago = rng.gen_range(0..=120);
    let created_at = now - Duration::minutes(minutes_ago);

    let (status, severity) = match kind {
        EventKind::Accident | EventKind::Congestion => {
            // Some events are already resolved by the time they are reported.
            let status = if chance(rng, 0.3) && rng.gen::<bool>() {
                kind.terminal_status().unwrap_or(kind.active_status())
            } else {
                kind.active_status()
            };
            (status, *pick(rng, &[Severity::Severe, Severity::Moderate, Severity::Minor]))
        }
        EventKind::Construction => (
            kind.active_status(),
            *pick(rng, &[Severity::Moderate, Severity::Minor]),
        ),
        EventKind::Weather => (
            kind.active_status(),
            *pick(rng, &[Severity::Severe, Severity::Moderate, Severity::Minor]),
        ),
    };

    TrafficEvent {
        id,
        kind,
        location: format!("{district} {place}, {road}"),
        coordinates,
        created_at,
        status,
        severity,
        description: (*pick(rng, descriptions(kind))).to_string(),
    }
}

/// Outcome of one lifecycle step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleStep {
    pub resolved: usize,
    pub evicted: usize,
    pub spawned: Option<u64>,
}

/// The live event set plus the id counter that feeds it.
#[derive(Debug, Clone)]
pub struct LiveEvents {
    events: Vec<TrafficEvent>,
    next_id: u64,
}

impl Default for LiveEvents {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
        }
    }
}

impl LiveEvents {
    pub fn as_slice(&self) -> &[TrafficEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Id the next generated event will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Generate one event unconditionally and return its id.
    pub fn generate<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Local>,
        bounds: &GeoBounds,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.events.push(sample_event(rng, id, now, bounds));
        id
    }

    /// Resolve, evict, then maybe spawn. Spawning is suppressed while the
    /// live count is at `lifecycle.max_live`.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Local>,
        bounds: &GeoBounds,
        lifecycle: &EventLifecycle,
    ) -> LifecycleStep {
        let mut outcome = LifecycleStep::default();

        self.events.retain_mut(|event| {
            if chance(rng, lifecycle.transition_attempt) && event.try_resolve(rng, lifecycle) {
                outcome.resolved += 1;
            }
            if event.is_terminal() && chance(rng, lifecycle.evict_terminal) {
                outcome.evicted += 1;
                false
            } else {
                true
            }
        });

        if chance(rng, lifecycle.spawn) && self.events.len() < lifecycle.max_live {
            outcome.spawned = Some(self.generate(rng, now, bounds));
        }

        outcome
    }
}

fn chance<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    rng.gen::<f64>() < p
}

/// Uniform pick from a non-empty table.
fn pick<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn always() -> EventLifecycle {
        EventLifecycle {
            transition_attempt: 1.0,
            accident_clear: 1.0,
            congestion_ease: 1.0,
            weather_ease: 1.0,
            evict_terminal: 0.0,
            spawn: 0.0,
            max_live: 15,
        }
    }

    #[test]
    fn sampled_events_respect_vocabulary() {
        let mut rng = StdRng::seed_from_u64(3);
        let bounds = GeoBounds::default();
        let now = Local::now();
        for id in 0..200 {
            let event = sample_event(&mut rng, id, now, &bounds);
            assert_eq!(event.id, id);
            assert!(bounds.contains(event.coordinates[0], event.coordinates[1]));
            assert!(event.created_at <= now);
            assert!(now - event.created_at <= Duration::minutes(120));
            let status = event.status();
            assert!(
                status == event.kind.active_status()
                    || Some(status) == event.kind.terminal_status()
            );
            if event.kind == EventKind::Construction {
                assert_ne!(event.severity, Severity::Severe);
            }
            assert!(descriptions(event.kind).contains(&event.description.as_str()));
        }
    }

    #[test]
    fn construction_never_resolves() {
        let mut rng = StdRng::seed_from_u64(11);
        let lifecycle = always();
        let mut event = sample_event(&mut rng, 1, Local::now(), &GeoBounds::default());
        event.kind = EventKind::Construction;
        event.status = EventStatus::InProgress;
        for _ in 0..20 {
            assert!(!event.try_resolve(&mut rng, &lifecycle));
        }
        assert_eq!(event.status(), EventStatus::InProgress);
    }

    #[test]
    fn resolution_moves_to_terminal_once() {
        let mut rng = StdRng::seed_from_u64(5);
        let lifecycle = always();
        let mut event = sample_event(&mut rng, 1, Local::now(), &GeoBounds::default());
        event.kind = EventKind::Accident;
        event.status = EventStatus::Processing;

        assert!(event.try_resolve(&mut rng, &lifecycle));
        assert_eq!(event.status(), EventStatus::Cleared);
        assert!(!event.try_resolve(&mut rng, &lifecycle));
    }

    #[test]
    fn step_evicts_terminal_and_keeps_ids_increasing() {
        let mut rng = StdRng::seed_from_u64(9);
        let bounds = GeoBounds::default();
        let now = Local::now();
        let mut live = LiveEvents::default();
        for _ in 0..5 {
            live.generate(&mut rng, now, &bounds);
        }
        let lifecycle = EventLifecycle {
            evict_terminal: 1.0,
            spawn: 1.0,
            ..always()
        };

        let outcome = live.step(&mut rng, now, &bounds, &lifecycle);

        assert!(live
            .as_slice()
            .iter()
            .filter(|e| e.id < 6)
            .all(|e| !e.is_terminal()));
        assert_eq!(outcome.spawned, Some(6));
        assert_eq!(live.next_id(), 7);
        let ids: Vec<u64> = live.as_slice().iter().map(|e| e.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn spawning_stops_at_cap() {
        let mut rng = StdRng::seed_from_u64(1);
        let bounds = GeoBounds::default();
        let now = Local::now();
        let lifecycle = EventLifecycle {
            transition_attempt: 0.0,
            evict_terminal: 0.0,
            spawn: 1.0,
            max_live: 4,
            ..EventLifecycle::default()
        };
        let mut live = LiveEvents::default();
        for _ in 0..10 {
            live.step(&mut rng, now, &bounds, &lifecycle);
        }
        assert_eq!(live.len(), 4);
    }
}
