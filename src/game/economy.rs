//! Economy: facility table, change cost accounting, and per-turn income.
//!
//! Costs are computed by diffing multisets of kinds. An instance or facility
//! present in both the canonical and the submitted version is free; only
//! additions are paid for and removals refunded, each at the catalog price.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::galaxy::{Base, Galaxy};
use crate::game::{Catalog, InstructionInstance, InstructionKind, KindId, PlayerId};

/// Kinds of facility a base can be made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityKind {
    /// Keeps its owner in the game.
    Home,
    /// Produces money every turn.
    Mine,
    /// Allows new units to be built at its location.
    Factory,
    /// Soaks up damage.
    Shield,
}

impl FacilityKind {
    /// Every facility kind.
    pub const ALL: [FacilityKind; 4] = [
        FacilityKind::Home,
        FacilityKind::Mine,
        FacilityKind::Factory,
        FacilityKind::Shield,
    ];

    /// Money needed to build this facility.
    #[must_use]
    pub const fn cost(self) -> u32 {
        match self {
            FacilityKind::Home => 12,
            FacilityKind::Mine => 6,
            FacilityKind::Factory => 8,
            FacilityKind::Shield => 4,
        }
    }

    /// Health of a freshly built facility.
    #[must_use]
    pub const fn max_health(self) -> u32 {
        match self {
            FacilityKind::Home => 10,
            FacilityKind::Mine | FacilityKind::Factory => 6,
            FacilityKind::Shield => 12,
        }
    }

    /// Money produced every turn.
    #[must_use]
    pub const fn income(self) -> i64 {
        match self {
            FacilityKind::Home => 3,
            FacilityKind::Mine => 2,
            FacilityKind::Factory | FacilityKind::Shield => 0,
        }
    }
}

/// Count instances per kind.
fn kind_counts(instances: &[InstructionInstance]) -> BTreeMap<KindId, u32> {
    let mut counts = BTreeMap::new();
    for instance in instances {
        *counts.entry(instance.kind).or_insert(0) += 1;
    }
    counts
}

/// Cost of turning queue `old` into queue `new`.
///
/// Σ cost(added) − Σ cost(removed), matching instances by kind.
#[must_use]
pub fn queue_delta_cost(catalog: &Catalog, old: &[InstructionInstance], new: &[InstructionInstance]) -> i64 {
    let old_counts = kind_counts(old);
    let new_counts = kind_counts(new);
    let kinds: BTreeSet<KindId> = old_counts.keys().chain(new_counts.keys()).copied().collect();

    kinds
        .into_iter()
        .map(|kind| {
            let before = i64::from(old_counts.get(&kind).copied().unwrap_or(0));
            let after = i64::from(new_counts.get(&kind).copied().unwrap_or(0));
            let price = catalog.get(kind).map_or(0, |k| i64::from(k.cost));
            (after - before) * price
        })
        .sum()
}

/// Cost of building a brand-new unit with the given queue.
#[must_use]
pub fn new_unit_cost(catalog: &Catalog, unit_cost: u32, queue: &[InstructionInstance]) -> i64 {
    i64::from(unit_cost) + catalog.cost_of(queue)
}

/// Cost of turning facility set `old` into `new` (either may be absent).
#[must_use]
pub fn facility_delta_cost(old: Option<&Base>, new: Option<&Base>) -> i64 {
    let has = |base: Option<&Base>, kind| base.is_some_and(|b| b.has(kind));
    FacilityKind::ALL
        .iter()
        .map(|&kind| match (has(old, kind), has(new, kind)) {
            (false, true) => i64::from(kind.cost()),
            (true, false) => -i64::from(kind.cost()),
            _ => 0,
        })
        .sum()
}

/// Rebuild a submitted queue against the canonical one.
///
/// Clients only submit kinds: each submitted kind reuses the health of the
/// first unused canonical instance of that kind, and kinds with no canonical
/// counterpart start at full health. Unknown kinds are dropped, so callers
/// validate kinds first.
#[must_use]
pub fn reconcile_queue(
    catalog: &Catalog,
    canonical: &[InstructionInstance],
    submitted: &[KindId],
) -> Vec<InstructionInstance> {
    let mut used = vec![false; canonical.len()];
    submitted
        .iter()
        .filter_map(|&kind| {
            let reused = canonical
                .iter()
                .enumerate()
                .find(|(i, c)| !used[*i] && c.kind == kind)
                .map(|(i, c)| (i, c.health));
            match reused {
                Some((i, health)) => {
                    used[i] = true;
                    Some(InstructionInstance { kind, health })
                }
                None => catalog.get(kind).map(InstructionKind::instance),
            }
        })
        .collect()
}

/// Rebuild a submitted base against the canonical one.
///
/// Kept facilities keep their canonical health; new ones start at full health.
#[must_use]
pub fn reconcile_base(owner: PlayerId, canonical: Option<&Base>, kinds: &BTreeSet<FacilityKind>) -> Base {
    let facilities = kinds
        .iter()
        .map(|&kind| {
            let health = canonical
                .and_then(|b| b.facilities.get(&kind).copied())
                .unwrap_or_else(|| kind.max_health());
            (kind, health)
        })
        .collect();
    Base { owner, facilities }
}

/// Income a player earns at the end of a turn.
#[must_use]
pub fn income(galaxy: &Galaxy, player: PlayerId) -> i64 {
    galaxy
        .bases()
        .filter(|(_, base)| base.owner == player)
        .flat_map(|(_, base)| base.facilities.keys())
        .map(|kind| kind.income())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::builtin;

    fn instances(catalog: &Catalog, names: &[&str]) -> Vec<InstructionInstance> {
        names
            .iter()
            .map(|n| catalog.by_name(n).unwrap().instance())
            .collect()
    }

    fn cost(catalog: &Catalog, name: &str) -> i64 {
        i64::from(catalog.by_name(name).unwrap().cost)
    }

    #[test]
    fn test_noop_costs_nothing() {
        let catalog = builtin::catalog();
        let queue = instances(&catalog, &["advance", "strike", "strike"]);
        assert_eq!(queue_delta_cost(&catalog, &queue, &queue), 0);
    }

    #[test]
    fn test_reorder_costs_nothing() {
        let catalog = builtin::catalog();
        let old = instances(&catalog, &["advance", "strike"]);
        let new = instances(&catalog, &["strike", "advance"]);
        assert_eq!(queue_delta_cost(&catalog, &old, &new), 0);
    }

    #[test]
    fn test_add_and_remove() {
        let catalog = builtin::catalog();
        let old = instances(&catalog, &["advance", "strike"]);

        let added = instances(&catalog, &["advance", "strike", "mend"]);
        assert_eq!(queue_delta_cost(&catalog, &old, &added), cost(&catalog, "mend"));

        let removed = instances(&catalog, &["advance"]);
        assert_eq!(queue_delta_cost(&catalog, &old, &removed), -cost(&catalog, "strike"));

        let swapped = instances(&catalog, &["advance", "mend"]);
        assert_eq!(
            queue_delta_cost(&catalog, &old, &swapped),
            cost(&catalog, "mend") - cost(&catalog, "strike")
        );
    }

    #[test]
    fn test_new_unit_cost() {
        let catalog = builtin::catalog();
        let queue = instances(&catalog, &["advance", "strike"]);
        assert_eq!(
            new_unit_cost(&catalog, 5, &queue),
            5 + cost(&catalog, "advance") + cost(&catalog, "strike")
        );
    }

    #[test]
    fn test_facility_delta_cost() {
        let old = Base::new(1, &[FacilityKind::Home, FacilityKind::Factory]);
        let new = Base::new(1, &[FacilityKind::Home, FacilityKind::Mine]);
        assert_eq!(
            facility_delta_cost(Some(&old), Some(&new)),
            i64::from(FacilityKind::Mine.cost()) - i64::from(FacilityKind::Factory.cost())
        );
        assert_eq!(
            facility_delta_cost(None, Some(&new)),
            i64::from(FacilityKind::Home.cost() + FacilityKind::Mine.cost())
        );
        assert_eq!(facility_delta_cost(Some(&old), Some(&old)), 0);
    }

    #[test]
    fn test_reconcile_queue_keeps_canonical_health() {
        let catalog = builtin::catalog();
        let mut canonical = instances(&catalog, &["strike", "advance"]);
        canonical[0].health = 1;

        let advance = catalog.by_name("advance").unwrap().id;
        let strike = catalog.by_name("strike").unwrap();
        let rebuilt = reconcile_queue(&catalog, &canonical, &[advance, strike.id, strike.id]);

        assert_eq!(rebuilt[0].kind, advance);
        assert_eq!(rebuilt[1].health, 1);
        assert_eq!(rebuilt[2].health, strike.max_health);
    }

    #[test]
    fn test_reconcile_base() {
        let mut canonical = Base::new(1, &[FacilityKind::Home]);
        canonical.facilities.insert(FacilityKind::Home, 2);
        let kinds: BTreeSet<FacilityKind> = [FacilityKind::Home, FacilityKind::Mine].into_iter().collect();

        let rebuilt = reconcile_base(1, Some(&canonical), &kinds);
        assert_eq!(rebuilt.facilities[&FacilityKind::Home], 2);
        assert_eq!(rebuilt.facilities[&FacilityKind::Mine], FacilityKind::Mine.max_health());
    }

    #[test]
    fn test_income() {
        use crate::galaxy::generate_galaxy;
        use crate::galaxy::LocationId;

        let mut galaxy = generate_galaxy(3, 1).unwrap();
        galaxy.location_mut(LocationId(0)).unwrap().base =
            Some(Base::new(1, &[FacilityKind::Home, FacilityKind::Mine]));
        galaxy.location_mut(LocationId(1)).unwrap().base = Some(Base::new(1, &[FacilityKind::Mine]));
        galaxy.location_mut(LocationId(2)).unwrap().base = Some(Base::new(2, &[FacilityKind::Home]));

        assert_eq!(income(&galaxy, 1), 3 + 2 + 2);
        assert_eq!(income(&galaxy, 2), 3);
        assert_eq!(income(&galaxy, 3), 0);
    }
}
