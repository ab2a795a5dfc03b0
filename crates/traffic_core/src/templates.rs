//! Static text pools used when synthesizing events and hotspots.

use crate::events::EventKind;

/// District name → notable places inside it. Order is stable so seeded runs
/// pick the same districts.
pub const DISTRICT_PLACES: &[(&str, &[&str])] = &[
    (
        "Futian",
        &["Futian CBD", "Huaqiangbei", "Chegongmiao", "Futian Port", "Lianhuashan"],
    ),
    (
        "Nanshan",
        &["Nanshan Center", "Science Park", "Shekou", "Qianhai", "University Town"],
    ),
    (
        "Luohu",
        &["Luohu Port", "Dongmen", "Sungang", "Qingshuihe", "Huangbeiling"],
    ),
    (
        "Bao'an",
        &["Bao'an Center", "Xixiang", "Fuyong", "Shajing", "Songgang"],
    ),
    (
        "Longgang",
        &["Longgang Center", "Bantian", "Buji", "Pinghu", "Henggang"],
    ),
];

pub const ROAD_NAMES: &[&str] = &[
    "Shennan Avenue",
    "Beihuan Avenue",
    "Nanping Expressway",
    "Binhai Avenue",
    "Longgang Avenue",
    "Meiguan Expressway",
    "Guangshen Expressway",
    "Jihe Expressway",
    "Nanguang Expressway",
    "Shuiguan Expressway",
];

/// Place used for hotspots in districts absent from [DISTRICT_PLACES].
pub const FALLBACK_PLACE: &str = "Central";

pub const UNKNOWN_DISTRICT: &str = "Unknown district";

const ACCIDENT_DESCRIPTIONS: &[&str] = &[
    "Multi-vehicle collision, heavy congestion, please detour",
    "Vehicle collision, some lanes closed",
    "Minor scrape, traffic moving slowly",
    "Broken-down vehicle occupying the emergency lane",
];

const CONSTRUCTION_DESCRIPTIONS: &[&str] = &[
    "Road works, some lanes closed, slow traffic",
    "Surface repairs, please reduce speed",
    "Footbridge installation, lanes temporarily closed",
    "Pipeline works, vehicles diverted",
];

const CONGESTION_DESCRIPTIONS: &[&str] = &[
    "Heavy traffic, vehicles moving slowly",
    "Rush-hour congestion, expect delays",
    "High volume, slow passage",
    "Queue near junction, plan your route ahead",
];

const WEATHER_DESCRIPTIONS: &[&str] = &[
    "Rain, slippery surface, drive carefully",
    "Dense fog, low visibility, reduce speed",
    "Strong wind, speed limit on viaducts",
    "Thunderstorm, standing water on some sections",
];

pub fn descriptions(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::Accident => ACCIDENT_DESCRIPTIONS,
        EventKind::Construction => CONSTRUCTION_DESCRIPTIONS,
        EventKind::Congestion => CONGESTION_DESCRIPTIONS,
        EventKind::Weather => WEATHER_DESCRIPTIONS,
    }
}

/// Places for a district name, if it is a known district.
pub fn places_for(district: &str) -> Option<&'static [&'static str]> {
    DISTRICT_PLACES
        .iter()
        .find(|(name, _)| *name == district)
        .map(|(_, places)| *places)
}

/// Fill colour for a district congestion index on the statistics panel.
pub fn congestion_fill(congestion_index: f64) -> &'static str {
    if congestion_index >= 8.0 {
        "#F44336"
    } else if congestion_index >= 7.0 {
        "#FF9800"
    } else if congestion_index >= 6.0 {
        "#FFC107"
    } else {
        "#4CAF50"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_descriptions() {
        for kind in EventKind::ALL {
            assert!(!descriptions(kind).is_empty());
        }
    }

    #[test]
    fn place_lookup() {
        assert!(places_for("Nanshan").is_some_and(|p| p.contains(&"Shekou")));
        assert!(places_for("Atlantis").is_none());
    }

    #[test]
    fn fill_ramp() {
        assert_eq!(congestion_fill(8.4), "#F44336");
        assert_eq!(congestion_fill(7.0), "#FF9800");
        assert_eq!(congestion_fill(6.5), "#FFC107");
        assert_eq!(congestion_fill(5.1), "#4CAF50");
    }
}
