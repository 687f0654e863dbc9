#![no_main]

//! Change protocol fuzzer.
//!
//! Feeds arbitrary changes through every phase of a small game:
//! 1. Every accepted change must keep the invariants
//! 2. Every rejected change must leave the game untouched
//! 3. Unit phases run to completion whatever the board looks like

use arbitrary::Arbitrary;
use dronefall::game::invariants::check_invariants;
use dronefall::game::{BaseSnapshot, FacilityKind, UnitSnapshot};
use dronefall::{Change, Game, GameConfig, KindId, LocationId, Phase, UnitId};
use libfuzzer_sys::fuzz_target;

/// A fuzzer-generated unit snapshot.
#[derive(Arbitrary, Debug)]
struct FuzzUnit {
    /// Existing unit to update, or a new one.
    id: Option<u8>,
    location: u8,
    queue: Vec<u8>,
}

/// A fuzzer-generated base snapshot.
#[derive(Arbitrary, Debug)]
struct FuzzBase {
    location: u8,
    /// Bit set over facility kinds.
    facilities: u8,
}

/// A fuzzer-generated change.
#[derive(Arbitrary, Debug)]
struct FuzzChange {
    player: u8,
    draft_pick: Option<u8>,
    units: Vec<FuzzUnit>,
    bases: Vec<FuzzBase>,
}

/// Structured input for change fuzzing.
#[derive(Arbitrary, Debug)]
struct ChangeInput {
    seed: u64,
    players: u8,
    starting_money: u8,
    changes: Vec<FuzzChange>,
}

impl FuzzChange {
    fn to_change(&self) -> Change {
        let mut change = Change::pass(self.player % 5);
        change.draft_pick = self.draft_pick.map(|k| KindId(u16::from(k % 10)));
        for unit in self.units.iter().take(4) {
            change.units.push(UnitSnapshot {
                id: unit.id.map(|id| UnitId(u64::from(id % 16))),
                location: LocationId(u32::from(unit.location % 8)),
                queue: unit
                    .queue
                    .iter()
                    .take(8)
                    .map(|&k| KindId(u16::from(k % 10)))
                    .collect(),
            });
        }
        for base in self.bases.iter().take(3) {
            let kinds: Vec<FacilityKind> = FacilityKind::ALL
                .iter()
                .enumerate()
                .filter(|(bit, _)| base.facilities & (1 << bit) != 0)
                .map(|(_, &kind)| kind)
                .collect();
            change.bases.push(BaseSnapshot::new(
                LocationId(u32::from(base.location % 8)),
                &kinds,
            ));
        }
        change
    }
}

fuzz_target!(|input: ChangeInput| {
    let players = usize::from(input.players % 4) + 1;
    let config = GameConfig {
        locations: 7,
        seed: input.seed,
        starting_money: i64::from(input.starting_money),
        ..GameConfig::default()
    };
    let names: Vec<String> = (1..=players).map(|i| format!("p{i}")).collect();
    let Ok(mut game) = Game::new(config, &names) else {
        return;
    };

    for fuzz in input.changes.iter().take(64) {
        if game.is_over() {
            break;
        }
        if game.phase() == Phase::UnitPhase {
            game.run_unit_phase();
        }

        let change = fuzz.to_change();
        let before = serde_json::to_string(&game).unwrap();
        match game.apply_change(&change) {
            Ok(()) => {
                let violations = check_invariants(&game);
                assert!(violations.is_empty(), "after {change:?}: {violations:?}");
            }
            Err(_) => {
                let after = serde_json::to_string(&game).unwrap();
                assert_eq!(before, after, "rejected change mutated the game");
            }
        }
    }
});
