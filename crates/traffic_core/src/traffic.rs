//! Traffic model: time-of-day flow profile and the hour-keyed base tables
//! behind the trend and prediction curves.
//!
//! The flow multiplier scales every road's flow on each tick; heavier flow
//! then suppresses speed through [speed_suppression].

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Time-of-day flow profile
// ---------------------------------------------------------------------------

/// Pre-defined traffic profiles.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum TrafficProfileKind {
    /// Shenzhen-style weekday pattern with two rush hours.
    #[default]
    Shenzhen,
    /// No time-of-day effect; all hourly factors are 1.0.
    Flat,
    /// Custom per-hour factors (index 0 = midnight, index 23 = 11 PM).
    Custom([f64; 24]),
}

/// Hourly flow multipliers. Factor 1.0 = baseline; 1.8 = evening rush.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeOfDayProfile {
    /// Flow multiplier for each hour of the day (0–23).
    pub hourly_factors: [f64; 24],
}

impl Default for TimeOfDayProfile {
    fn default() -> Self {
        Self::shenzhen()
    }
}

impl TimeOfDayProfile {
    /// All factors 1.0.
    pub fn flat() -> Self {
        Self {
            hourly_factors: [1.0; 24],
        }
    }

    /// Weekday pattern.
    ///
    /// - 00–05: 0.3 (late night)
    /// - 07–09: 1.5 (morning rush)
    /// - 10–15: 0.8 (working hours)
    /// - 17–19: 1.8 (evening rush)
    /// - 23:    0.3 (late night)
    /// - other: 1.0
    pub fn shenzhen() -> Self {
        let mut f = [1.0_f64; 24];
        for slot in &mut f[0..=5] {
            *slot = 0.3;
        }
        for slot in &mut f[7..=9] {
            *slot = 1.5;
        }
        for slot in &mut f[10..=15] {
            *slot = 0.8;
        }
        for slot in &mut f[17..=19] {
            *slot = 1.8;
        }
        f[23] = 0.3;
        Self { hourly_factors: f }
    }

    /// Build from a [`TrafficProfileKind`] descriptor.
    pub fn from_kind(kind: &TrafficProfileKind) -> Self {
        match kind {
            TrafficProfileKind::Shenzhen => Self::shenzhen(),
            TrafficProfileKind::Flat => Self::flat(),
            TrafficProfileKind::Custom(factors) => Self {
                hourly_factors: *factors,
            },
        }
    }

    /// Flow multiplier for a local hour of day. Hours past 23 wrap.
    pub fn factor_for_hour(&self, hour: u32) -> f64 {
        self.hourly_factors[(hour % 24) as usize]
    }
}

// ---------------------------------------------------------------------------
// Flow / speed coupling
// ---------------------------------------------------------------------------

/// Speed factor for a road carrying `flow` vehicles per interval.
///
/// Falls linearly with flow and is bounded to [0.3, 1.2].
pub fn speed_suppression(flow: i64) -> f64 {
    let factor = 1.0 - (flow as f64 / 5000.0) * 0.5;
    factor.clamp(0.3, 1.2)
}

// ---------------------------------------------------------------------------
// Historical trend / forward prediction base tables
// ---------------------------------------------------------------------------

/// Base main-road flow for an hour of the historical trend curve.
pub fn trend_base<R: Rng + ?Sized>(hour: u32, rng: &mut R) -> f64 {
    let u: f64 = rng.gen();
    match hour % 24 {
        7..=9 => 2500.0 + u * 500.0,
        17..=19 => 2800.0 + u * 500.0,
        12..=14 => 1800.0 + u * 300.0,
        0..=5 => 500.0 + u * 200.0,
        _ => 1200.0 + u * 300.0,
    }
}

/// Base predicted flow (0–100 scale) for an hour of the forecast curve.
pub fn prediction_base<R: Rng + ?Sized>(hour: u32, rng: &mut R) -> f64 {
    let u: f64 = rng.gen();
    match hour % 24 {
        7..=9 => 85.0 + u * 10.0,
        17..=19 => 90.0 + u * 10.0,
        12..=14 => 70.0 + u * 10.0,
        0..=5 => 30.0 + u * 10.0,
        _ => 50.0 + u * 15.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
