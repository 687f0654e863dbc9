//! Game invariants - sanity checks that detect bugs.
//!
//! These should NEVER trigger in a correctly implemented game. They are run
//! by tests, fuzzers and debug builds after every mutation worth checking.

use std::collections::{BTreeMap, BTreeSet};

use crate::galaxy::topology_violations;
use crate::game::{Game, KindId, UnitId};

/// Invariant violation error.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

fn violation(message: String) -> InvariantViolation {
    InvariantViolation { message }
}

/// Check that pool, offers and unlocked sets partition the catalog multiset.
fn check_pool_partition(game: &Game, violations: &mut Vec<InvariantViolation>) {
    let mut held: BTreeMap<KindId, u32> = game.draft().pool().clone();
    for (kind, count) in game.draft().offered_counts() {
        *held.entry(kind).or_insert(0) += count;
    }
    for player in game.players() {
        for (&kind, &count) in &player.unlocked {
            *held.entry(kind).or_insert(0) += count;
        }
    }
    held.retain(|_, count| *count > 0);

    if held != game.catalog().occurrences() {
        violations.push(violation(format!(
            "Pool partition broken: held {held:?}, catalog {:?}",
            game.catalog().occurrences()
        )));
    }
}

/// Check all game invariants.
///
/// Returns a list of violations found, or empty if all invariants hold.
#[must_use]
pub fn check_invariants(game: &Game) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    check_pool_partition(game, &mut violations);

    let known: BTreeSet<u8> = game.players().iter().map(|p| p.id).collect();
    let mut seen_units: BTreeSet<UnitId> = BTreeSet::new();

    for location in game.galaxy().locations() {
        if let Some(base) = &location.base
            && !known.contains(&base.owner)
        {
            violations.push(violation(format!(
                "Base at {} owned by unknown player {}",
                location.id, base.owner
            )));
        }

        for unit in &location.units {
            if !seen_units.insert(unit.id) {
                violations.push(violation(format!("Unit {} appears twice", unit.id)));
            }
            if unit.location != location.id {
                violations.push(violation(format!(
                    "Unit {} listed at {} but records {}",
                    unit.id, location.id, unit.location
                )));
            }
            if !known.contains(&unit.owner) {
                violations.push(violation(format!(
                    "Unit {} owned by unknown player {}",
                    unit.id, unit.owner
                )));
            }
            if !unit.fits_memory(game.catalog()) {
                violations.push(violation(format!(
                    "Unit {} uses {} memory of {}",
                    unit.id,
                    unit.used_memory(game.catalog()),
                    unit.memory
                )));
            }
            if unit.id.0 >= game.next_unit_id {
                violations.push(violation(format!(
                    "Unit {} was not issued by the game",
                    unit.id
                )));
            }
        }
    }

    for message in topology_violations(game.galaxy()) {
        violations.push(violation(message));
    }

    violations
}

/// Assert all game invariants hold, panicking if any are violated.
///
/// Only active in debug builds; release builds skip the check.
///
/// # Panics
///
/// Panics if any invariant is violated.
#[cfg(debug_assertions)]
pub fn assert_invariants(game: &Game) {
    let violations = check_invariants(game);
    if !violations.is_empty() {
        let messages: Vec<String> = violations.iter().map(|v| v.message.clone()).collect();
        panic!("Game invariant violations:\n  - {}", messages.join("\n  - "));
    }
}

/// No-op in release builds.
#[cfg(not(debug_assertions))]
pub fn assert_invariants(_game: &Game) {}
