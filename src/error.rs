//! Error types for the game engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::galaxy::{LocationId, MapGenError};
use crate::game::{KindId, PlayerId, UnitId};

/// Why a submitted change was refused.
///
/// A rejected change never mutates the game. Rejections travel back to the
/// submitting client, so they carry plain data only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// The player is not expected to submit anything right now.
    #[error("player {player} is not awaited in this phase")]
    NotAwaiting {
        /// Submitting player.
        player: PlayerId,
    },
    /// A draft change did not claim a kind.
    #[error("draft change must claim exactly one kind")]
    MissingDraftPick,
    /// A draft pick was submitted outside the draft.
    #[error("draft pick submitted outside the draft")]
    UnexpectedDraftPick,
    /// Unit or base snapshots were submitted during the draft.
    #[error("unit and base snapshots are not accepted during the draft")]
    UnexpectedSnapshots,
    /// The claimed kind is not on the player's offer list.
    #[error("kind {kind} is not on offer")]
    NotOffered {
        /// Claimed kind.
        kind: KindId,
    },
    /// The change costs more than the player has.
    #[error("change costs {cost}, only {available} available")]
    InsufficientFunds {
        /// Net cost of the change.
        cost: i64,
        /// Player's balance.
        available: i64,
    },
    /// A unit's queue would not fit its memory.
    #[error("queue needs {used} memory, unit has {capacity}")]
    MemoryExceeded {
        /// Unit concerned (`None` for a new unit).
        unit: Option<UnitId>,
        /// Memory the submitted queue needs.
        used: u64,
        /// Unit memory.
        capacity: u32,
    },
    /// A new unit was submitted with nothing to run.
    #[error("new units need a non-empty queue")]
    EmptyQueue,
    /// A kind the player has not unlocked was added to a queue.
    #[error("kind {kind} is not unlocked")]
    NotUnlocked {
        /// Added kind.
        kind: KindId,
    },
    /// A snapshot references a kind the catalog does not know.
    #[error("unknown kind {kind}")]
    UnknownKind {
        /// Referenced kind.
        kind: KindId,
    },
    /// A snapshot references a unit that does not exist.
    #[error("unknown unit {unit}")]
    UnknownUnit {
        /// Referenced unit.
        unit: UnitId,
    },
    /// A snapshot references a location that does not exist.
    #[error("unknown location {location}")]
    UnknownLocation {
        /// Referenced location.
        location: LocationId,
    },
    /// A snapshot touches a unit owned by someone else.
    #[error("unit {unit} belongs to another player")]
    NotOwner {
        /// Referenced unit.
        unit: UnitId,
    },
    /// A snapshot moves a unit; units only move by executing.
    #[error("unit {unit} cannot move from {from} to {to}")]
    UnitMoved {
        /// Referenced unit.
        unit: UnitId,
        /// Canonical location.
        from: LocationId,
        /// Submitted location.
        to: LocationId,
    },
    /// A new unit was placed where the player has no factory.
    #[error("no factory at {location}")]
    NoFactory {
        /// Submitted location.
        location: LocationId,
    },
    /// A base snapshot touches another player's base.
    #[error("base at {location} belongs to another player")]
    BaseNotOwned {
        /// Base location.
        location: LocationId,
    },
    /// A new base was placed where the player has no unit.
    #[error("no unit present at {location} to build a base")]
    NoPresence {
        /// Submitted location.
        location: LocationId,
    },
    /// The same unit or location appears twice in one change.
    #[error("change touches the same object twice")]
    DuplicateSnapshot,
}

/// Error type for game setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SetupError {
    /// No players were given.
    #[error("roster is empty")]
    EmptyRoster,
    /// More players than starting locations (or player ids).
    #[error("{players} players do not fit on {locations} locations")]
    TooManyPlayers {
        /// Roster size.
        players: usize,
        /// Location count.
        locations: usize,
    },
    /// The galaxy could not be generated.
    #[error(transparent)]
    MapGen(#[from] MapGenError),
    /// A configuration value would make the game unplayable.
    #[error("invalid config: {field} {reason}")]
    InvalidConfig {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_display() {
        let rejection = Rejection::InsufficientFunds {
            cost: 12,
            available: 5,
        };
        assert_eq!(rejection.to_string(), "change costs 12, only 5 available");
        assert_eq!(
            Rejection::UnknownUnit { unit: UnitId(4) }.to_string(),
            "unknown unit U4"
        );
    }

    #[test]
    fn test_setup_error_display() {
        let err = SetupError::InvalidConfig {
            field: "max_rounds_per_turn",
            reason: "must be at least 1",
        };
        let copied = err;
        assert_eq!(copied, err);
        assert_eq!(
            err.to_string(),
            "invalid config: max_rounds_per_turn must be at least 1"
        );
        assert_eq!(
            SetupError::from(MapGenError::TooManyLocations(900)).to_string(),
            "too many locations: 900 (maximum 256)"
        );
    }

    #[test]
    fn test_rejection_wire_form() {
        let rejection = Rejection::NotOffered { kind: KindId(3) };
        let json = serde_json::to_string(&rejection).unwrap();
        assert_eq!(json, r#"{"reason":"not_offered","kind":3}"#);
        assert_eq!(serde_json::from_str::<Rejection>(&json).unwrap(), rejection);
    }
}
