//! Synthetic road and district shapes.
//!
//! Stands in for the geometry loader when running the live service, benches
//! and tests without the city data files.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::network::ShapeInput;
use crate::params::GeoBounds;
use crate::templates::{DISTRICT_PLACES, ROAD_NAMES};

/// Administrative codes for the districts in [DISTRICT_PLACES], same order.
const DISTRICT_CODES: [&str; 5] = ["440304", "440305", "440303", "440306", "440307"];

#[derive(Debug, Clone, Default)]
pub struct SyntheticNetwork {
    pub roads: Vec<ShapeInput>,
    pub districts: Vec<ShapeInput>,
}

/// `road_count` random polylines inside `bounds`, plus one rectangular
/// district per known district name, tiled west to east.
pub fn synthetic_network(seed: u64, road_count: usize, bounds: &GeoBounds) -> SyntheticNetwork {
    let mut rng = StdRng::seed_from_u64(seed);

    let roads = (0..road_count)
        .map(|i| {
            let vertices = rng.gen_range(2..=4);
            let coordinates: Vec<[f64; 2]> = (0..vertices)
                .map(|_| bounds.point_at(rng.gen(), rng.gen()))
                .collect();
            let name = format!("{} #{}", ROAD_NAMES[i % ROAD_NAMES.len()], i / ROAD_NAMES.len() + 1);
            ShapeInput::new(
                format!("road-{i}"),
                name,
                json!({ "type": "LineString", "coordinates": coordinates }),
            )
            .with_level(rng.gen_range(1..=5))
        })
        .collect();

    let strips = DISTRICT_PLACES.len() as f64;
    let districts = DISTRICT_PLACES
        .iter()
        .zip(DISTRICT_CODES)
        .enumerate()
        .map(|(i, ((name, _), code))| {
            let west = i as f64 / strips;
            let east = (i + 1) as f64 / strips;
            let ring = [
                bounds.point_at(west, 0.0),
                bounds.point_at(east, 0.0),
                bounds.point_at(east, 1.0),
                bounds.point_at(west, 1.0),
                bounds.point_at(west, 0.0),
            ];
            ShapeInput::new(
                code,
                *name,
                json!({ "type": "Polygon", "coordinates": [ring] }),
            )
        })
        .collect();

    SyntheticNetwork { roads, districts }
}
