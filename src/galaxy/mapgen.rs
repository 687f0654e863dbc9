//! Deterministic galaxy generation.
//!
//! Locations are placed by weighted sampling over a grid whose weights grow
//! with Manhattan distance from every placed location, which spreads them out
//! without rejection sampling. Connections are then added greedily under the
//! planarity and clearance constraints.

// Map generation uses intentional casts for grid/RNG operations
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use thiserror::Error;

use crate::galaxy::geometry::{
    point_segment_distance, segments_intersect, shared_endpoint_overlaps,
};
use crate::galaxy::{Connection, Galaxy, Location, LocationId, Position};
use crate::rng::Rng;

/// Grid cells per location along each axis.
pub const GRID_CELLS_PER_LOCATION: usize = 8;

/// Maximum normalized distance between connected locations.
pub const MAX_CONNECTION_DISTANCE: f64 = 0.2;

/// Largest location count accepted by the generator.
pub const MAX_LOCATIONS: usize = 256;

/// Location radius range, in grid cells.
const RADIUS_CELLS: (f64, f64) = (0.5, 1.5);

/// Error type for galaxy generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MapGenError {
    /// The requested location count would exceed the generator's grid budget.
    #[error("too many locations: {0} (maximum {MAX_LOCATIONS})")]
    TooManyLocations(usize),
}

/// Generate a galaxy with exactly `count` locations.
///
/// `count == 0` yields an empty galaxy.
///
/// # Errors
///
/// Returns an error if `count` exceeds [`MAX_LOCATIONS`].
pub fn generate_galaxy(count: usize, seed: u64) -> Result<Galaxy, MapGenError> {
    if count > MAX_LOCATIONS {
        return Err(MapGenError::TooManyLocations(count));
    }
    if count == 0 {
        return Ok(Galaxy::default());
    }

    let mut rng = Rng::new(seed);
    let grid = count * GRID_CELLS_PER_LOCATION;

    let cells = place_cells(grid, count, &mut rng);
    let locations = cells_to_locations(&cells, grid, &mut rng);
    let connections = connect_locations(&locations, &mut rng);

    Ok(Galaxy::new(locations, connections))
}

/// Pick `count` distinct grid cells by repulsive weighted sampling.
///
/// Returned cells are in row-major order.
fn place_cells(grid: usize, count: usize, rng: &mut Rng) -> Vec<(usize, usize)> {
    let mut weights = vec![1u64; grid * grid];
    let mut cumulative = vec![0u64; grid * grid];

    for _ in 0..count {
        let mut total = 0u64;
        for (sum, weight) in cumulative.iter_mut().zip(&weights) {
            total += weight;
            *sum = total;
        }

        let draw = rng.below(total);
        // First cell whose cumulative weight exceeds the draw; zero-weight
        // cells can never be first because their sum equals the previous one.
        let chosen = cumulative.partition_point(|&sum| sum <= draw);
        weights[chosen] = 0;

        let (cx, cy) = (chosen % grid, chosen / grid);
        for (idx, weight) in weights.iter_mut().enumerate() {
            if *weight == 0 {
                continue;
            }
            let (x, y) = (idx % grid, idx / grid);
            *weight += (x.abs_diff(cx) + y.abs_diff(cy)) as u64;
        }
    }

    weights
        .iter()
        .enumerate()
        .filter(|(_, w)| **w == 0)
        .map(|(idx, _)| (idx % grid, idx / grid))
        .collect()
}

/// Turn placed cells into locations at their normalized cell centers.
fn cells_to_locations(cells: &[(usize, usize)], grid: usize, rng: &mut Rng) -> Vec<Location> {
    let scale = grid as f64;
    cells
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| {
            let position = Position::new((x as f64 + 0.5) / scale, (y as f64 + 0.5) / scale);
            let radius = rng.range_f64(RADIUS_CELLS.0, RADIUS_CELLS.1) / scale;
            Location::new(LocationId(i as u32), position, radius)
        })
        .collect()
}

/// Whether a candidate connection crosses an accepted one.
fn crosses_existing(
    locations: &[Location],
    accepted: &[Connection],
    a: LocationId,
    b: LocationId,
) -> bool {
    let pa = locations[a.index()].position;
    let pb = locations[b.index()].position;

    accepted.iter().any(|existing| {
        let (c, d) = existing.endpoints();
        let pc = locations[c.index()].position;
        let pd = locations[d.index()].position;

        match (existing.other(a), existing.other(b)) {
            // Same pair
            (Some(_), Some(_)) => true,
            // Shared endpoint `a`: only a collinear overlap counts
            (Some(far), None) => shared_endpoint_overlaps(pa, pb, locations[far.index()].position),
            // Shared endpoint `b`
            (None, Some(far)) => shared_endpoint_overlaps(pb, pa, locations[far.index()].position),
            (None, None) => segments_intersect(pa, pb, pc, pd),
        }
    })
}

/// Whether a candidate connection passes within a third location's radius.
fn clips_location(locations: &[Location], a: LocationId, b: LocationId) -> bool {
    let pa = locations[a.index()].position;
    let pb = locations[b.index()].position;

    locations
        .iter()
        .filter(|l| l.id != a && l.id != b)
        .any(|l| point_segment_distance(l.position, pa, pb) < l.radius)
}

/// Greedily connect nearby locations.
fn connect_locations(locations: &[Location], rng: &mut Rng) -> Vec<Connection> {
    let mut order: Vec<LocationId> = locations.iter().map(|l| l.id).collect();
    rng.shuffle(&mut order);

    let mut accepted: Vec<Connection> = Vec::new();

    for &source in &order {
        let origin = locations[source.index()].position;
        let mut fan_out = 0u32;

        for target in locations.iter().map(|l| l.id) {
            if target == source {
                continue;
            }
            if origin.distance(locations[target.index()].position) > MAX_CONNECTION_DISTANCE {
                continue;
            }
            let candidate = Connection::new(source, target);
            if accepted.contains(&candidate) {
                continue;
            }

            // Fan-out damping: the k-th extra connection is kept with p = 1 / (k + 1)
            if rng.next_f64() * f64::from(fan_out + 1) >= 1.0 {
                continue;
            }
            if crosses_existing(locations, &accepted, source, target) {
                continue;
            }
            if clips_location(locations, source, target) {
                continue;
            }

            accepted.push(candidate);
            fan_out += 1;
        }
    }

    accepted
}

/// Check the generated topology constraints.
///
/// Returns a description of every violated constraint.
#[must_use]
pub fn topology_violations(galaxy: &Galaxy) -> Vec<String> {
    let locations = galaxy.locations();
    let connections = galaxy.connections();
    let mut violations = Vec::new();

    for connection in connections {
        let (a, b) = connection.endpoints();
        if a.index() >= locations.len() || b.index() >= locations.len() || a == b {
            violations.push(format!("connection {a}-{b} has invalid endpoints"));
        }
    }
    if !violations.is_empty() {
        return violations;
    }

    for (i, connection) in connections.iter().enumerate() {
        let (a, b) = connection.endpoints();
        if clips_location(locations, a, b) {
            violations.push(format!("connection {a}-{b} passes within a third location"));
        }
        if crosses_existing(locations, &connections[..i], a, b) {
            violations.push(format!("connection {a}-{b} crosses an earlier connection"));
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_galaxy() {
        let galaxy = generate_galaxy(0, 42).unwrap();
        assert!(galaxy.is_empty());
        assert!(galaxy.connections().is_empty());
    }

    #[test]
    fn test_single_location() {
        let galaxy = generate_galaxy(1, 42).unwrap();
        assert_eq!(galaxy.len(), 1);
        assert!(galaxy.connections().is_empty());
    }

    #[test]
    fn test_exact_location_count() {
        for count in [2, 5, 17, 40] {
            let galaxy = generate_galaxy(count, 7).unwrap();
            assert_eq!(galaxy.len(), count);
        }
    }

    #[test]
    fn test_locations_in_unit_square() {
        let galaxy = generate_galaxy(30, 11).unwrap();
        for location in galaxy.locations() {
            assert!((0.0..=1.0).contains(&location.position.x));
            assert!((0.0..=1.0).contains(&location.position.y));
            assert!(location.radius > 0.0);
        }
    }

    #[test]
    fn test_generation_determinism() {
        let g1 = generate_galaxy(25, 1234).unwrap();
        let g2 = generate_galaxy(25, 1234).unwrap();

        assert_eq!(g1.connections(), g2.connections());
        for (l1, l2) in g1.locations().iter().zip(g2.locations()) {
            assert_eq!(l1.position, l2.position);
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let g1 = generate_galaxy(25, 1).unwrap();
        let g2 = generate_galaxy(25, 2).unwrap();

        let differences = g1
            .locations()
            .iter()
            .zip(g2.locations())
            .filter(|(a, b)| a.position != b.position)
            .count();
        assert!(differences > 0);
    }

    #[test]
    fn test_topology_constraints_hold() {
        for seed in 0..20 {
            let galaxy = generate_galaxy(30, seed).unwrap();
            let violations = topology_violations(&galaxy);
            assert!(violations.is_empty(), "seed {seed}: {violations:?}");
        }
    }

    #[test]
    fn test_connections_respect_distance() {
        let galaxy = generate_galaxy(40, 3).unwrap();
        for connection in galaxy.connections() {
            let (a, b) = connection.endpoints();
            let pa = galaxy.location(a).unwrap().position;
            let pb = galaxy.location(b).unwrap().position;
            assert!(pa.distance(pb) <= MAX_CONNECTION_DISTANCE);
        }
    }

    #[test]
    fn test_too_many_locations() {
        assert_eq!(
            generate_galaxy(MAX_LOCATIONS + 1, 1).unwrap_err(),
            MapGenError::TooManyLocations(MAX_LOCATIONS + 1)
        );
    }

    #[test]
    fn test_placed_cells_distinct() {
        let mut rng = Rng::new(5);
        let cells = place_cells(40, 5, &mut rng);
        assert_eq!(cells.len(), 5);
        let mut sorted = cells.clone();
        sorted.dedup();
        assert_eq!(sorted.len(), 5);
    }
}
