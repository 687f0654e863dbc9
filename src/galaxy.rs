//! Galaxy layer for Dronefall.
//!
//! The galaxy is the map the game is played on:
//! - Locations ("planets") with optional bases and the units present there
//! - Connections ("highways") forming a planar graph
//! - Deterministic procedural generation

pub mod geometry;
mod map;
mod mapgen;

pub use geometry::Position;
pub use map::{Base, Connection, Galaxy, Location, LocationId};
pub use mapgen::{
    generate_galaxy, topology_violations, MapGenError, GRID_CELLS_PER_LOCATION,
    MAX_CONNECTION_DISTANCE, MAX_LOCATIONS,
};
