use log::{debug, warn};

use crate::topology::{Distance, EdgeIndex, Network, Unity};

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two (latitude, longitude) points in km.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> Distance {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Unity of an edge of the given length, starting from `unity`. Short edges
/// keep it; longer ones fall back to a more robust modulation.
pub fn downgraded_unity(unity: Unity, distance: Distance) -> Unity {
    if distance <= 800.0 {
        unity
    } else if distance <= 2500.0 {
        150
    } else {
        100
    }
}

/// Sets the length of every edge whose endpoints both have coordinates and
/// downgrades its unity by that length. Returns the number of edges updated.
pub fn assign_distances(network: &mut Network) -> usize {
    let mut updated = 0;
    let edges: Vec<EdgeIndex> = (0..network.edges().len()).map(EdgeIndex::from).collect();
    for e in edges {
        let edge = &network.edges()[e];
        if edge.distance().is_some() {
            continue;
        }
        let positions = (
            network.nodes()[edge.src()].position(),
            network.nodes()[edge.dst()].position(),
        );
        let (a, b) = match positions {
            (Some(a), Some(b)) => (a, b),
            _ => {
                warn!("no coordinates for edge {}", network.edge_label(e));
                continue;
            }
        };

        let distance = haversine_km(a, b);
        let unity = downgraded_unity(edge.unity(), distance);
        if network.set_edge_distance(e, distance).is_ok() {
            network.set_edge_unity(e, unity);
            debug!("edge {}: {:.0} km, unity {}", network.edge_label(e), distance, unity);
            updated += 1;
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_matches_known_distances() {
        // Seattle to Portland is about 233 km
        let d = haversine_km((47.6062, -122.3321), (45.5152, -122.6784));
        assert!((d - 233.0).abs() < 5.0, "{}", d);
        assert_eq!(haversine_km((10.0, 10.0), (10.0, 10.0)), 0.0);
    }

    #[test]
    fn unity_is_downgraded_by_length() {
        assert_eq!(downgraded_unity(200, 500.0), 200);
        assert_eq!(downgraded_unity(200, 1500.0), 150);
        assert_eq!(downgraded_unity(200, 2600.0), 100);
    }

    #[test]
    fn distances_are_assigned_once() {
        let mut network = Network::new("n");
        let near = network.add_edge("SEA", "PDX", 200, 100.0).unwrap().unwrap();
        let far = network.add_edge("SEA", "NYC", 200, 100.0).unwrap().unwrap();
        network.add_edge("SEA", "XXX", 200, 100.0).unwrap();
        for (code, lat, lon) in [
            ("SEA", 47.6062, -122.3321),
            ("PDX", 45.5152, -122.6784),
            ("NYC", 40.7128, -74.0060),
        ] {
            let n = network.node(code).unwrap();
            network.set_position(n, lat, lon);
        }

        assert_eq!(assign_distances(&mut network), 2);
        assert_eq!(network.edges()[near].unity(), 200);
        assert_eq!(network.edges()[far].unity(), 100);
        assert_eq!(assign_distances(&mut network), 0);
    }
}
