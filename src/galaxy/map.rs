//! Locations, connections, bases and the galaxy that owns them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::galaxy::Position;
use crate::game::{FacilityKind, PlayerId, Unit, UnitId};

/// Identifier of a location ("planet"), its index in the galaxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub u32);

impl LocationId {
    /// Index into the galaxy's location list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A structure at a location, made of facilities with independent health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    /// Owning player.
    pub owner: PlayerId,
    /// Remaining health per facility kind.
    pub facilities: BTreeMap<FacilityKind, u32>,
}

impl Base {
    /// Create a base with the given facilities at full health.
    #[must_use]
    pub fn new(owner: PlayerId, kinds: &[FacilityKind]) -> Self {
        let facilities = kinds.iter().map(|&kind| (kind, kind.max_health())).collect();
        Self { owner, facilities }
    }

    /// Whether the base still has a facility of this kind.
    #[must_use]
    pub fn has(&self, kind: FacilityKind) -> bool {
        self.facilities.contains_key(&kind)
    }

    /// Whether every facility has been destroyed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }
}

/// An undirected edge ("highway") between two locations.
///
/// Endpoints are stored in ascending order so equal pairs compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Connection {
    a: LocationId,
    b: LocationId,
}

impl Connection {
    /// Create a connection, normalizing endpoint order.
    #[must_use]
    pub fn new(a: LocationId, b: LocationId) -> Self {
        if a <= b { Self { a, b } } else { Self { a: b, b: a } }
    }

    /// Both endpoints, lower id first.
    #[must_use]
    pub const fn endpoints(self) -> (LocationId, LocationId) {
        (self.a, self.b)
    }

    /// The endpoint opposite `id`, if `id` is an endpoint.
    #[must_use]
    pub fn other(self, id: LocationId) -> Option<LocationId> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

/// A location in the galaxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    /// Identifier (index in the galaxy).
    pub id: LocationId,
    /// Center in normalized space.
    pub position: Position,
    /// Radius in normalized space.
    pub radius: f64,
    /// Base built here, if any.
    pub base: Option<Base>,
    /// Units currently present, in arrival order.
    pub units: Vec<Unit>,
}

impl Location {
    /// Create an empty location.
    #[must_use]
    pub const fn new(id: LocationId, position: Position, radius: f64) -> Self {
        Self {
            id,
            position,
            radius,
            base: None,
            units: Vec::new(),
        }
    }
}

/// The galaxy: the single owner of every location, unit and base.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Galaxy {
    locations: Vec<Location>,
    connections: Vec<Connection>,
}

impl Galaxy {
    /// Create a galaxy from generated parts.
    ///
    /// Duplicate connections are dropped.
    #[must_use]
    pub fn new(locations: Vec<Location>, mut connections: Vec<Connection>) -> Self {
        connections.sort_unstable();
        connections.dedup();
        Self {
            locations,
            connections,
        }
    }

    /// Number of locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether the galaxy has no locations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// All locations in id order.
    #[must_use]
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// All connections.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Get a location by id.
    #[must_use]
    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.locations.get(id.index())
    }

    /// Get a mutable location by id.
    #[must_use]
    pub fn location_mut(&mut self, id: LocationId) -> Option<&mut Location> {
        self.locations.get_mut(id.index())
    }

    /// Locations directly connected to `id`, in ascending id order.
    #[must_use]
    pub fn neighbors(&self, id: LocationId) -> Vec<LocationId> {
        let mut neighbors: Vec<LocationId> =
            self.connections.iter().filter_map(|c| c.other(id)).collect();
        neighbors.sort_unstable();
        neighbors
    }

    /// Whether two locations share a connection.
    #[must_use]
    pub fn are_connected(&self, a: LocationId, b: LocationId) -> bool {
        self.connections.binary_search(&Connection::new(a, b)).is_ok()
    }

    /// Every unit in the galaxy, grouped by location.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.locations.iter().flat_map(|l| l.units.iter())
    }

    /// Every unit in the galaxy, mutably.
    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.locations.iter_mut().flat_map(|l| l.units.iter_mut())
    }

    /// Every base with its location.
    pub fn bases(&self) -> impl Iterator<Item = (LocationId, &Base)> {
        self.locations
            .iter()
            .filter_map(|l| l.base.as_ref().map(|b| (l.id, b)))
    }

    /// Ids of every unit, in galaxy order.
    #[must_use]
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units().map(|u| u.id).collect()
    }

    /// Locate a unit: its location and index within that location.
    #[must_use]
    pub fn find_unit(&self, id: UnitId) -> Option<(LocationId, usize)> {
        self.locations.iter().find_map(|l| {
            l.units
                .iter()
                .position(|u| u.id == id)
                .map(|idx| (l.id, idx))
        })
    }

    /// Get a unit by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units().find(|u| u.id == id)
    }

    /// Get a mutable unit by id.
    #[must_use]
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units_mut().find(|u| u.id == id)
    }

    /// Remove a unit from wherever it is.
    pub fn take_unit(&mut self, id: UnitId) -> Option<Unit> {
        let (location, idx) = self.find_unit(id)?;
        self.location_mut(location).map(|l| l.units.remove(idx))
    }

    /// Put a unit back at a given index of its own location.
    ///
    /// Returns the unit back if its location does not exist.
    pub fn restore_unit(&mut self, unit: Unit, idx: usize) -> Result<(), Unit> {
        match self.locations.get_mut(unit.location.index()) {
            Some(location) => {
                let idx = idx.min(location.units.len());
                location.units.insert(idx, unit);
                Ok(())
            }
            None => Err(unit),
        }
    }

    /// Append a unit to its location's unit list.
    ///
    /// Returns the unit back if its location does not exist.
    pub fn place_unit(&mut self, unit: Unit) -> Result<(), Unit> {
        match self.locations.get_mut(unit.location.index()) {
            Some(location) => {
                location.units.push(unit);
                Ok(())
            }
            None => Err(unit),
        }
    }

    /// Count units owned by a player.
    #[must_use]
    pub fn unit_count(&self, player: PlayerId) -> usize {
        self.units().filter(|u| u.owner == player).count()
    }

    /// Whether a player still owns a base with the given facility.
    #[must_use]
    pub fn owns_facility(&self, player: PlayerId, kind: FacilityKind) -> bool {
        self.bases().any(|(_, b)| b.owner == player && b.has(kind))
    }

    /// Remove destroyed units and bases without facilities.
    ///
    /// Returns the ids of removed units.
    pub fn prune(&mut self) -> Vec<UnitId> {
        let mut removed = Vec::new();
        for location in &mut self.locations {
            location.units.retain(|u| {
                if u.destroyed {
                    removed.push(u.id);
                }
                !u.destroyed
            });
            if location.base.as_ref().is_some_and(Base::is_empty) {
                location.base = None;
            }
        }
        removed
    }
}
