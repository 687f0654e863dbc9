//! Instruction kinds, instances, and the handler execution contract.
//!
//! Handlers never touch the galaxy directly. They read the world through an
//! [`ExecContext`], mutate only the executing unit, and queue [`Effect`]s
//! that the engine applies in order once the handler returns.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::galaxy::{Galaxy, LocationId};
use crate::game::{PlayerId, Unit, UnitId};

/// Identifier of an instruction kind within a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindId(pub u16);

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "K{}", self.0)
    }
}

/// Category tags used by display layers and draft filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Moves the unit between locations.
    Movement,
    /// Damages other units or bases.
    Combat,
    /// Repairs or protects.
    Support,
    /// Produces money.
    Economy,
    /// Alters the execution pointer.
    Control,
}

/// One queued occurrence of an instruction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionInstance {
    /// Kind of this instance.
    pub kind: KindId,
    /// Remaining health.
    pub health: u32,
}

/// Pointer movement requested by an action handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step(pub i32);

impl Step {
    /// Advance to the next instruction.
    pub const NEXT: Step = Step(1);
}

/// A deferred mutation requested by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Move a unit to a location.
    Move {
        /// Unit to move.
        unit: UnitId,
        /// Destination location.
        to: LocationId,
    },
    /// Damage a unit's instruction queue.
    DamageUnit {
        /// Target unit.
        target: UnitId,
        /// Total damage to distribute.
        amount: u32,
    },
    /// Damage the facilities of the base at a location.
    DamageBase {
        /// Location of the base.
        location: LocationId,
        /// Total damage to distribute.
        amount: u32,
    },
    /// Add money to a player's balance.
    Credit {
        /// Receiving player.
        player: PlayerId,
        /// Amount credited.
        amount: i64,
    },
}

/// Everything a handler may see and touch during one invocation.
#[derive(Debug)]
pub struct ExecContext<'a> {
    /// The executing unit, detached from the galaxy for the call.
    pub unit: &'a mut Unit,
    /// Index of the invoked instance in the unit's queue.
    pub slot: usize,
    /// Current turn number.
    pub turn: u32,
    /// Read-only view of the galaxy (without the executing unit).
    pub galaxy: &'a Galaxy,
    /// The catalog in use.
    pub catalog: &'a Catalog,
    effects: Vec<Effect>,
}

impl<'a> ExecContext<'a> {
    /// Create a context for invoking the handler of `unit.queue[slot]`.
    #[must_use]
    pub fn new(
        unit: &'a mut Unit,
        slot: usize,
        turn: u32,
        galaxy: &'a Galaxy,
        catalog: &'a Catalog,
    ) -> Self {
        Self {
            unit,
            slot,
            turn,
            galaxy,
            catalog,
            effects: Vec::new(),
        }
    }

    /// Queue an effect for the engine to apply.
    pub fn emit(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Request a move to a selectable adjacent location.
    ///
    /// Returns `false` (and queues nothing) if the location is not selectable.
    pub fn move_to(&mut self, to: LocationId) -> bool {
        if !self.unit.selectable_locations.contains(&to) {
            return false;
        }
        let unit = self.unit.id;
        self.emit(Effect::Move { unit, to });
        true
    }

    /// Request damage on a selectable co-located unit.
    ///
    /// Returns `false` if the target is not selectable.
    pub fn damage_unit(&mut self, target: UnitId, amount: u32) -> bool {
        if !self.unit.selectable_units.contains(&target) {
            return false;
        }
        self.emit(Effect::DamageUnit { target, amount });
        true
    }

    /// Credit money to the executing unit's owner.
    pub fn credit_owner(&mut self, amount: i64) {
        let player = self.unit.owner;
        self.emit(Effect::Credit { player, amount });
    }

    /// The kind of the invoked instance.
    #[must_use]
    pub fn kind(&self) -> Option<&InstructionKind> {
        self.unit
            .queue
            .get(self.slot)
            .and_then(|instance| self.catalog.get(instance.kind))
    }

    /// Consume the context, returning the queued effects.
    #[must_use]
    pub fn into_effects(self) -> Vec<Effect> {
        self.effects
    }
}

/// Handler run for every instance at the start or end of a cycle, or on removal.
pub type CycleHandler = fn(&mut ExecContext<'_>);

/// Handler run when the execution pointer reaches an instance.
pub type ActionHandler = fn(&mut ExecContext<'_>) -> Step;

/// The callbacks registered for an instruction kind.
#[derive(Clone, Copy)]
pub struct Handlers {
    /// Start-cycle pass.
    pub on_start: CycleHandler,
    /// Main-action pass.
    pub on_action: ActionHandler,
    /// End-cycle pass.
    pub on_end: CycleHandler,
    /// Called once when the instance is removed by damage.
    pub on_remove: CycleHandler,
}

pub(crate) fn no_cycle(_: &mut ExecContext<'_>) {}

pub(crate) fn next_step(_: &mut ExecContext<'_>) -> Step {
    Step::NEXT
}

impl Handlers {
    /// Handlers that do nothing and step forward by one.
    pub const INERT: Handlers = Handlers {
        on_start: no_cycle,
        on_action: next_step,
        on_end: no_cycle,
        on_remove: no_cycle,
    };

    /// Inert handlers with the given action.
    #[must_use]
    pub const fn action(on_action: ActionHandler) -> Self {
        Self {
            on_action,
            ..Self::INERT
        }
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self::INERT
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers").finish_non_exhaustive()
    }
}

/// An immutable catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct InstructionKind {
    /// Identifier (index in the catalog).
    pub id: KindId,
    /// Display name.
    pub name: String,
    /// Memory consumed by one instance.
    pub memory: u32,
    /// Money needed to queue one instance.
    pub cost: u32,
    /// Health of a freshly queued instance.
    pub max_health: u32,
    /// Category tags.
    pub categories: Vec<Category>,
    /// Copies of this kind in the shared draft pool.
    pub occurrences: u32,
    /// Registered callbacks.
    #[serde(skip)]
    pub handlers: Handlers,
}

impl InstructionKind {
    /// A fresh, full-health instance of this kind.
    #[must_use]
    pub const fn instance(&self) -> InstructionInstance {
        InstructionInstance {
            kind: self.id,
            health: self.max_health,
        }
    }
}

/// The full set of instruction kinds available to a game.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    kinds: Vec<InstructionKind>,
}

impl Catalog {
    /// Build a catalog, assigning ids by position.
    #[must_use]
    pub fn new(mut kinds: Vec<InstructionKind>) -> Self {
        for (i, kind) in kinds.iter_mut().enumerate() {
            kind.id = KindId(u16::try_from(i).unwrap_or(u16::MAX));
        }
        Self { kinds }
    }

    /// Shared handle to the built-in catalog.
    #[must_use]
    pub fn shared_builtin() -> Arc<Catalog> {
        Arc::new(crate::game::builtin::catalog())
    }

    /// Look up a kind.
    #[must_use]
    pub fn get(&self, id: KindId) -> Option<&InstructionKind> {
        self.kinds.get(usize::from(id.0))
    }

    /// Look up a kind by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&InstructionKind> {
        self.kinds.iter().find(|k| k.name == name)
    }

    /// All kinds in id order.
    pub fn kinds(&self) -> impl Iterator<Item = &InstructionKind> {
        self.kinds.iter()
    }

    /// Number of kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether the catalog has no kinds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// The occurrence multiset the draft pool starts from.
    #[must_use]
    pub fn occurrences(&self) -> BTreeMap<KindId, u32> {
        self.kinds
            .iter()
            .filter(|k| k.occurrences > 0)
            .map(|k| (k.id, k.occurrences))
            .collect()
    }

    /// Total cost of a sequence of instances; unknown kinds cost nothing.
    #[must_use]
    pub fn cost_of(&self, instances: &[InstructionInstance]) -> i64 {
        instances
            .iter()
            .filter_map(|i| self.get(i.kind))
            .map(|k| i64::from(k.cost))
            .sum()
    }

    /// Total memory of a sequence of instances; unknown kinds use nothing.
    #[must_use]
    pub fn memory_of(&self, instances: &[InstructionInstance]) -> u64 {
        instances
            .iter()
            .filter_map(|i| self.get(i.kind))
            .map(|k| u64::from(k.memory))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::builtin;

    fn kind(name: &str, memory: u32, cost: u32) -> InstructionKind {
        InstructionKind {
            id: KindId(0),
            name: name.to_string(),
            memory,
            cost,
            max_health: 4,
            categories: vec![Category::Control],
            occurrences: 2,
            handlers: Handlers::INERT,
        }
    }

    #[test]
    fn test_catalog_assigns_ids() {
        let catalog = Catalog::new(vec![kind("a", 1, 1), kind("b", 2, 3)]);
        assert_eq!(catalog.get(KindId(1)).unwrap().name, "b");
        assert_eq!(catalog.by_name("a").unwrap().id, KindId(0));
        assert!(catalog.get(KindId(2)).is_none());
    }

    #[test]
    fn test_cost_and_memory_of() {
        let catalog = Catalog::new(vec![kind("a", 1, 1), kind("b", 2, 3)]);
        let queue = vec![
            catalog.get(KindId(0)).unwrap().instance(),
            catalog.get(KindId(1)).unwrap().instance(),
            catalog.get(KindId(1)).unwrap().instance(),
        ];
        assert_eq!(catalog.cost_of(&queue), 7);
        assert_eq!(catalog.memory_of(&queue), 5);
    }

    #[test]
    fn test_memory_of_does_not_wrap() {
        let catalog = Catalog::new(vec![kind("huge", u32::MAX, 1)]);
        let instance = catalog.get(KindId(0)).unwrap().instance();
        let queue = vec![instance, instance];
        assert_eq!(catalog.memory_of(&queue), 2 * u64::from(u32::MAX));

        let unit = Unit::new(UnitId(1), 1, LocationId(0), u32::MAX).with_queue(queue);
        assert!(!unit.fits_memory(&catalog));
    }

    #[test]
    fn test_occurrences() {
        let catalog = Catalog::new(vec![kind("a", 1, 1), kind("b", 2, 3)]);
        let occurrences = catalog.occurrences();
        assert_eq!(occurrences.get(&KindId(0)), Some(&2));
        assert_eq!(occurrences.values().sum::<u32>(), 4);
    }

    #[test]
    fn test_context_rejects_unselectable_targets() {
        let galaxy = Galaxy::default();
        let catalog = builtin::catalog();
        let mut unit = Unit::new(UnitId(1), 1, LocationId(0), 8);
        unit.selectable_locations = vec![LocationId(3)];
        unit.selectable_units = vec![UnitId(7)];

        let mut ctx = ExecContext::new(&mut unit, 0, 0, &galaxy, &catalog);
        assert!(!ctx.move_to(LocationId(4)));
        assert!(ctx.move_to(LocationId(3)));
        assert!(!ctx.damage_unit(UnitId(8), 2));
        assert!(ctx.damage_unit(UnitId(7), 2));

        let effects = ctx.into_effects();
        assert_eq!(
            effects,
            vec![
                Effect::Move {
                    unit: UnitId(1),
                    to: LocationId(3)
                },
                Effect::DamageUnit {
                    target: UnitId(7),
                    amount: 2
                },
            ]
        );
    }

    #[test]
    fn test_inert_handlers_step_forward() {
        let galaxy = Galaxy::default();
        let catalog = Catalog::default();
        let mut unit = Unit::new(UnitId(1), 1, LocationId(0), 8);
        let mut ctx = ExecContext::new(&mut unit, 0, 0, &galaxy, &catalog);
        assert_eq!((Handlers::INERT.on_action)(&mut ctx), Step::NEXT);
    }
}
