//! The change protocol: whole-object snapshots submitted by players.
//!
//! A change lists the full post-change state of every unit and base it
//! touches. Validation builds a [`ChangePlan`] against the canonical state
//! without mutating anything; only a fully valid plan is committed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::error::Rejection;
use crate::galaxy::{Base, Galaxy, LocationId};
use crate::game::economy::{
    facility_delta_cost, new_unit_cost, queue_delta_cost, reconcile_base, reconcile_queue,
};
use crate::game::{Catalog, FacilityKind, InstructionInstance, KindId, Player, PlayerId, Unit, UnitId};

/// Submitted state of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Existing unit id, or `None` to create a unit.
    pub id: Option<UnitId>,
    /// Location of the unit; must match the canonical one for existing units.
    pub location: LocationId,
    /// Desired queue, as kinds. Healths are taken from canonical state.
    pub queue: Vec<KindId>,
}

impl UnitSnapshot {
    /// Snapshot for a brand-new unit.
    #[must_use]
    pub fn create(location: LocationId, queue: Vec<KindId>) -> Self {
        Self {
            id: None,
            location,
            queue,
        }
    }

    /// Snapshot of an existing unit as it currently is.
    #[must_use]
    pub fn of(unit: &Unit) -> Self {
        Self {
            id: Some(unit.id),
            location: unit.location,
            queue: unit.queue.iter().map(|i| i.kind).collect(),
        }
    }
}

/// Submitted state of one base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseSnapshot {
    /// Location of the base.
    pub location: LocationId,
    /// Facilities the base should have; empty demolishes it.
    pub facilities: BTreeSet<FacilityKind>,
}

impl BaseSnapshot {
    /// Snapshot with the given facilities.
    #[must_use]
    pub fn new(location: LocationId, facilities: &[FacilityKind]) -> Self {
        Self {
            location,
            facilities: facilities.iter().copied().collect(),
        }
    }
}

/// A player's proposed mutation for the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Submitting player.
    pub player: PlayerId,
    /// Kind claimed during the draft.
    pub draft_pick: Option<KindId>,
    /// Touched units.
    pub units: Vec<UnitSnapshot>,
    /// Touched bases.
    pub bases: Vec<BaseSnapshot>,
}

impl Change {
    /// A change that touches nothing.
    #[must_use]
    pub const fn pass(player: PlayerId) -> Self {
        Self {
            player,
            draft_pick: None,
            units: Vec::new(),
            bases: Vec::new(),
        }
    }

    /// A draft pick.
    #[must_use]
    pub fn pick(player: PlayerId, kind: KindId) -> Self {
        Self {
            draft_pick: Some(kind),
            ..Self::pass(player)
        }
    }

    /// Add a unit snapshot.
    #[must_use]
    pub fn with_unit(mut self, snapshot: UnitSnapshot) -> Self {
        self.units.push(snapshot);
        self
    }

    /// Add a base snapshot.
    #[must_use]
    pub fn with_base(mut self, snapshot: BaseSnapshot) -> Self {
        self.bases.push(snapshot);
        self
    }

    /// Whether the change touches no object.
    #[must_use]
    pub fn touches_nothing(&self) -> bool {
        self.units.is_empty() && self.bases.is_empty()
    }
}

/// A validated unit update.
#[derive(Debug, Clone)]
pub(crate) enum PlannedUnit {
    /// Create a unit; its id is issued at commit time.
    Create {
        location: LocationId,
        queue: Vec<InstructionInstance>,
    },
    /// Replace the queue of an existing unit.
    Update {
        id: UnitId,
        queue: Vec<InstructionInstance>,
    },
}

/// A validated free-action change, ready to commit.
#[derive(Debug, Clone)]
pub(crate) struct ChangePlan {
    pub(crate) cost: i64,
    pub(crate) units: Vec<PlannedUnit>,
    pub(crate) bases: Vec<(LocationId, Option<Base>)>,
}

/// Canonical state a free-action change is validated against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlanContext<'a> {
    pub(crate) galaxy: &'a Galaxy,
    pub(crate) catalog: &'a Catalog,
    pub(crate) config: &'a GameConfig,
    pub(crate) player: &'a Player,
    pub(crate) money: i64,
}

impl PlanContext<'_> {
    /// Reject unknown kinds, and added kinds the player has not unlocked.
    fn check_kinds(&self, old: &[InstructionInstance], new: &[KindId]) -> Result<(), Rejection> {
        let mut before: BTreeMap<KindId, usize> = BTreeMap::new();
        for instance in old {
            *before.entry(instance.kind).or_insert(0) += 1;
        }
        let mut after: BTreeMap<KindId, usize> = BTreeMap::new();
        for &kind in new {
            if self.catalog.get(kind).is_none() {
                return Err(Rejection::UnknownKind { kind });
            }
            *after.entry(kind).or_insert(0) += 1;
        }
        for (kind, count) in after {
            let added = count > before.get(&kind).copied().unwrap_or(0);
            if added && !self.player.has_unlocked(kind) {
                return Err(Rejection::NotUnlocked { kind });
            }
        }
        Ok(())
    }

    fn check_memory(&self, unit: Option<UnitId>, queue: &[InstructionInstance], capacity: u32) -> Result<(), Rejection> {
        let used = self.catalog.memory_of(queue);
        if used > u64::from(capacity) {
            return Err(Rejection::MemoryExceeded {
                unit,
                used,
                capacity,
            });
        }
        Ok(())
    }

    fn plan_unit(&self, snapshot: &UnitSnapshot) -> Result<(PlannedUnit, i64), Rejection> {
        let player = self.player.id;
        let Some(location) = self.galaxy.location(snapshot.location) else {
            return Err(Rejection::UnknownLocation {
                location: snapshot.location,
            });
        };

        match snapshot.id {
            None => {
                if snapshot.queue.is_empty() {
                    return Err(Rejection::EmptyQueue);
                }
                let has_factory = location
                    .base
                    .as_ref()
                    .is_some_and(|b| b.owner == player && b.has(FacilityKind::Factory));
                if !has_factory {
                    return Err(Rejection::NoFactory {
                        location: snapshot.location,
                    });
                }
                self.check_kinds(&[], &snapshot.queue)?;
                let queue = reconcile_queue(self.catalog, &[], &snapshot.queue);
                self.check_memory(None, &queue, self.config.unit_memory)?;
                let cost = new_unit_cost(self.catalog, self.config.unit_cost, &queue);
                Ok((
                    PlannedUnit::Create {
                        location: snapshot.location,
                        queue,
                    },
                    cost,
                ))
            }
            Some(id) => {
                let Some(unit) = self.galaxy.unit(id) else {
                    return Err(Rejection::UnknownUnit { unit: id });
                };
                if unit.owner != player {
                    return Err(Rejection::NotOwner { unit: id });
                }
                if unit.location != snapshot.location {
                    return Err(Rejection::UnitMoved {
                        unit: id,
                        from: unit.location,
                        to: snapshot.location,
                    });
                }
                self.check_kinds(&unit.queue, &snapshot.queue)?;
                let queue = reconcile_queue(self.catalog, &unit.queue, &snapshot.queue);
                self.check_memory(Some(id), &queue, unit.memory)?;
                let cost = queue_delta_cost(self.catalog, &unit.queue, &queue);
                Ok((PlannedUnit::Update { id, queue }, cost))
            }
        }
    }

    fn plan_base(&self, snapshot: &BaseSnapshot) -> Result<(Option<Base>, i64), Rejection> {
        let player = self.player.id;
        let Some(location) = self.galaxy.location(snapshot.location) else {
            return Err(Rejection::UnknownLocation {
                location: snapshot.location,
            });
        };

        let canonical = location.base.as_ref();
        match canonical {
            Some(base) if base.owner != player => {
                return Err(Rejection::BaseNotOwned {
                    location: snapshot.location,
                });
            }
            None if !location.units.iter().any(|u| u.owner == player) => {
                return Err(Rejection::NoPresence {
                    location: snapshot.location,
                });
            }
            _ => {}
        }

        let rebuilt = (!snapshot.facilities.is_empty())
            .then(|| reconcile_base(player, canonical, &snapshot.facilities));
        let cost = facility_delta_cost(canonical, rebuilt.as_ref());
        Ok((rebuilt, cost))
    }

    /// Validate a free-action change.
    pub(crate) fn plan(&self, change: &Change) -> Result<ChangePlan, Rejection> {
        if change.draft_pick.is_some() {
            return Err(Rejection::UnexpectedDraftPick);
        }

        let existing: Vec<UnitId> = change.units.iter().filter_map(|u| u.id).collect();
        let unique_units: BTreeSet<UnitId> = existing.iter().copied().collect();
        let unique_bases: BTreeSet<LocationId> = change.bases.iter().map(|b| b.location).collect();
        if unique_units.len() != existing.len() || unique_bases.len() != change.bases.len() {
            return Err(Rejection::DuplicateSnapshot);
        }

        let mut cost = 0i64;
        let mut units = Vec::with_capacity(change.units.len());
        for snapshot in &change.units {
            let (planned, unit_cost) = self.plan_unit(snapshot)?;
            cost += unit_cost;
            units.push(planned);
        }
        let mut bases = Vec::with_capacity(change.bases.len());
        for snapshot in &change.bases {
            let (planned, base_cost) = self.plan_base(snapshot)?;
            cost += base_cost;
            bases.push((snapshot.location, planned));
        }

        if cost > self.money {
            return Err(Rejection::InsufficientFunds {
                cost,
                available: self.money,
            });
        }
        Ok(ChangePlan { cost, units, bases })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy::generate_galaxy;
    use crate::game::builtin;

    struct Fixture {
        galaxy: Galaxy,
        catalog: Catalog,
        config: GameConfig,
        player: Player,
    }

    impl Fixture {
        fn new() -> Self {
            let mut galaxy = generate_galaxy(4, 9).unwrap();
            galaxy.location_mut(LocationId(0)).unwrap().base =
                Some(Base::new(1, &[FacilityKind::Home, FacilityKind::Factory]));
            galaxy.location_mut(LocationId(1)).unwrap().base = Some(Base::new(2, &[FacilityKind::Home]));
            let catalog = builtin::catalog();
            let mut player = Player::new(1, "ada");
            for kind in catalog.kinds() {
                player.unlock(kind.id);
            }
            Self {
                galaxy,
                catalog,
                config: GameConfig::default(),
                player,
            }
        }

        fn kind(&self, name: &str) -> KindId {
            self.catalog.by_name(name).unwrap().id
        }

        fn plan(&self, money: i64, change: &Change) -> Result<ChangePlan, Rejection> {
            PlanContext {
                galaxy: &self.galaxy,
                catalog: &self.catalog,
                config: &self.config,
                player: &self.player,
                money,
            }
            .plan(change)
        }
    }

    #[test]
    fn test_noop_plan_costs_nothing() {
        let fixture = Fixture::new();
        let plan = fixture.plan(0, &Change::pass(1)).unwrap();
        assert_eq!(plan.cost, 0);
        assert!(plan.units.is_empty());
    }

    #[test]
    fn test_create_unit_cost() {
        let fixture = Fixture::new();
        let strike = fixture.kind("strike");
        let change = Change::pass(1).with_unit(UnitSnapshot::create(LocationId(0), vec![strike]));
        let plan = fixture.plan(100, &change).unwrap();
        let expected = i64::from(fixture.config.unit_cost + fixture.catalog.get(strike).unwrap().cost);
        assert_eq!(plan.cost, expected);
    }

    #[test]
    fn test_create_requires_factory() {
        let fixture = Fixture::new();
        let strike = fixture.kind("strike");
        let change = Change::pass(1).with_unit(UnitSnapshot::create(LocationId(2), vec![strike]));
        assert_eq!(
            fixture.plan(100, &change).unwrap_err(),
            Rejection::NoFactory {
                location: LocationId(2)
            }
        );
    }

    #[test]
    fn test_create_requires_queue() {
        let fixture = Fixture::new();
        let change = Change::pass(1).with_unit(UnitSnapshot::create(LocationId(0), Vec::new()));
        assert_eq!(fixture.plan(100, &change).unwrap_err(), Rejection::EmptyQueue);
    }

    #[test]
    fn test_memory_exceeded() {
        let fixture = Fixture::new();
        let strike = fixture.kind("strike");
        let change = Change::pass(1).with_unit(UnitSnapshot::create(LocationId(0), vec![strike; 3]));
        assert!(matches!(
            fixture.plan(1000, &change).unwrap_err(),
            Rejection::MemoryExceeded { unit: None, .. }
        ));
    }

    #[test]
    fn test_insufficient_funds() {
        let fixture = Fixture::new();
        let strike = fixture.kind("strike");
        let change = Change::pass(1).with_unit(UnitSnapshot::create(LocationId(0), vec![strike]));
        assert!(matches!(
            fixture.plan(1, &change).unwrap_err(),
            Rejection::InsufficientFunds { available: 1, .. }
        ));
    }

    #[test]
    fn test_not_unlocked() {
        let mut fixture = Fixture::new();
        fixture.player.unlocked.clear();
        let strike = fixture.kind("strike");
        let change = Change::pass(1).with_unit(UnitSnapshot::create(LocationId(0), vec![strike]));
        assert_eq!(
            fixture.plan(100, &change).unwrap_err(),
            Rejection::NotUnlocked { kind: strike }
        );
    }

    #[test]
    fn test_existing_unit_checks() {
        let mut fixture = Fixture::new();
        let strike = fixture.kind("strike");
        let queue = vec![fixture.catalog.get(strike).unwrap().instance()];
        fixture
            .galaxy
            .place_unit(Unit::new(UnitId(5), 1, LocationId(0), 8).with_queue(queue.clone()))
            .unwrap();
        fixture
            .galaxy
            .place_unit(Unit::new(UnitId(6), 2, LocationId(1), 8).with_queue(queue))
            .unwrap();

        let unknown = UnitSnapshot {
            id: Some(UnitId(99)),
            location: LocationId(0),
            queue: vec![strike],
        };
        assert_eq!(
            fixture.plan(100, &Change::pass(1).with_unit(unknown)).unwrap_err(),
            Rejection::UnknownUnit { unit: UnitId(99) }
        );

        let foreign = UnitSnapshot::of(fixture.galaxy.unit(UnitId(6)).unwrap());
        assert_eq!(
            fixture.plan(100, &Change::pass(1).with_unit(foreign)).unwrap_err(),
            Rejection::NotOwner { unit: UnitId(6) }
        );

        let mut moved = UnitSnapshot::of(fixture.galaxy.unit(UnitId(5)).unwrap());
        moved.location = LocationId(3);
        assert!(matches!(
            fixture.plan(100, &Change::pass(1).with_unit(moved)).unwrap_err(),
            Rejection::UnitMoved { .. }
        ));

        let same = UnitSnapshot::of(fixture.galaxy.unit(UnitId(5)).unwrap());
        let twice = Change::pass(1).with_unit(same.clone()).with_unit(same);
        assert_eq!(fixture.plan(100, &twice).unwrap_err(), Rejection::DuplicateSnapshot);
    }

    #[test]
    fn test_existing_unit_refund() {
        let mut fixture = Fixture::new();
        let strike = fixture.kind("strike");
        let advance = fixture.kind("advance");
        let queue = vec![
            fixture.catalog.get(strike).unwrap().instance(),
            fixture.catalog.get(advance).unwrap().instance(),
        ];
        fixture
            .galaxy
            .place_unit(Unit::new(UnitId(5), 1, LocationId(0), 8).with_queue(queue))
            .unwrap();

        let change = Change::pass(1).with_unit(UnitSnapshot {
            id: Some(UnitId(5)),
            location: LocationId(0),
            queue: vec![advance],
        });
        let plan = fixture.plan(0, &change).unwrap();
        assert_eq!(plan.cost, -i64::from(fixture.catalog.get(strike).unwrap().cost));
    }

    #[test]
    fn test_base_rules() {
        let mut fixture = Fixture::new();

        let foreign = Change::pass(1).with_base(BaseSnapshot::new(LocationId(1), &[FacilityKind::Mine]));
        assert_eq!(
            fixture.plan(100, &foreign).unwrap_err(),
            Rejection::BaseNotOwned {
                location: LocationId(1)
            }
        );

        let absent = Change::pass(1).with_base(BaseSnapshot::new(LocationId(2), &[FacilityKind::Mine]));
        assert_eq!(
            fixture.plan(100, &absent).unwrap_err(),
            Rejection::NoPresence {
                location: LocationId(2)
            }
        );

        fixture
            .galaxy
            .place_unit(Unit::new(UnitId(5), 1, LocationId(2), 8))
            .unwrap();
        let plan = fixture.plan(100, &absent).unwrap();
        assert_eq!(plan.cost, i64::from(FacilityKind::Mine.cost()));

        let extend = Change::pass(1).with_base(BaseSnapshot::new(
            LocationId(0),
            &[FacilityKind::Home, FacilityKind::Factory, FacilityKind::Shield],
        ));
        assert_eq!(
            fixture.plan(100, &extend).unwrap().cost,
            i64::from(FacilityKind::Shield.cost())
        );
    }

    #[test]
    fn test_draft_pick_rejected() {
        let fixture = Fixture::new();
        let change = Change::pick(1, KindId(0));
        assert_eq!(fixture.plan(100, &change).unwrap_err(), Rejection::UnexpectedDraftPick);
    }
}
