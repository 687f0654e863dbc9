//! Drones: player-owned units executing a bounded instruction queue.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::galaxy::LocationId;
use crate::game::{Catalog, InstructionInstance, PlayerId};

/// Unique unit identifier, issued by the game in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U{}", self.0)
    }
}

/// A drone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Identifier.
    pub id: UnitId,
    /// Owning player.
    pub owner: PlayerId,
    /// Location the unit is at.
    pub location: LocationId,
    /// Total memory available to the queue.
    pub memory: u32,
    /// Ordered instruction queue.
    pub queue: Vec<InstructionInstance>,
    /// Index of the next instance to execute.
    pub pointer: usize,
    /// Adjacent locations reachable this turn.
    pub selectable_locations: Vec<LocationId>,
    /// Other units at this location this turn.
    pub selectable_units: Vec<UnitId>,
    /// Whether the queue has finished executing this turn.
    pub finished: bool,
    /// Whether the queue has been emptied.
    pub destroyed: bool,
    /// Persistent handler data, kept across turns.
    pub data: BTreeMap<String, i64>,
}

impl Unit {
    /// Create a unit with an empty queue.
    #[must_use]
    pub fn new(id: UnitId, owner: PlayerId, location: LocationId, memory: u32) -> Self {
        Self {
            id,
            owner,
            location,
            memory,
            queue: Vec::new(),
            pointer: 0,
            selectable_locations: Vec::new(),
            selectable_units: Vec::new(),
            finished: false,
            destroyed: false,
            data: BTreeMap::new(),
        }
    }

    /// Builder-style queue setter.
    #[must_use]
    pub fn with_queue(mut self, queue: Vec<InstructionInstance>) -> Self {
        self.queue = queue;
        self
    }

    /// Memory consumed by the queue.
    #[must_use]
    pub fn used_memory(&self, catalog: &Catalog) -> u64 {
        catalog.memory_of(&self.queue)
    }

    /// Whether the queue fits in the unit's memory.
    #[must_use]
    pub fn fits_memory(&self, catalog: &Catalog) -> bool {
        self.used_memory(catalog) <= u64::from(self.memory)
    }

    /// Move the pointer by `step`, finishing the queue when it runs off the end.
    ///
    /// Backward jumps stop at the first instance.
    pub fn advance(&mut self, step: i32) {
        if self.queue.is_empty() {
            self.pointer = 0;
            self.finished = true;
            return;
        }
        let last = self.queue.len() - 1;
        let target = i64::try_from(self.pointer)
            .unwrap_or(i64::MAX)
            .saturating_add(i64::from(step));
        if target < 0 {
            self.pointer = 0;
        } else if usize::try_from(target).map_or(true, |t| t > last) {
            self.pointer = last;
            self.finished = true;
        } else {
            self.pointer = usize::try_from(target).unwrap_or(last);
        }
    }

    /// Remove the instance at `slot`, keeping the pointer on the same instance.
    pub fn remove_instance(&mut self, slot: usize) -> Option<InstructionInstance> {
        if slot >= self.queue.len() {
            return None;
        }
        let removed = self.queue.remove(slot);
        if slot < self.pointer {
            self.pointer -= 1;
        }
        self.pointer = self.pointer.min(self.queue.len().saturating_sub(1));
        Some(removed)
    }

    /// Clear per-turn execution state.
    pub fn reset_cycle(&mut self) {
        self.pointer = 0;
        self.finished = false;
    }

    /// Read a persistent data value, defaulting to zero.
    #[must_use]
    pub fn data_value(&self, key: &str) -> i64 {
        self.data.get(key).copied().unwrap_or(0)
    }

    /// Write a persistent data value.
    pub fn set_data(&mut self, key: &str, value: i64) {
        self.data.insert(key.to_string(), value);
    }
}
