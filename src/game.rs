//! Game layer for Dronefall.
//!
//! Implements the game rules on top of the galaxy:
//! - Units running instruction queues, and the catalog of instruction kinds
//! - Players, drafting and the shared pool
//! - Change validation and cost accounting
//! - The phase state machine and the unit execution cycle

pub mod builtin;
mod change;
mod combat;
mod draft;
pub mod economy;
mod execution;
mod instruction;
pub mod invariants;
mod player;
mod state;
mod unit;

pub use change::{BaseSnapshot, Change, UnitSnapshot};
pub use combat::{damage_base, damage_queue, distribute_damage};
pub use draft::DraftState;
pub use economy::FacilityKind;
pub use instruction::{
    ActionHandler, Catalog, Category, CycleHandler, Effect, ExecContext, Handlers,
    InstructionInstance, InstructionKind, KindId, Step,
};
pub use player::{Player, PlayerId};
pub use state::{Game, Phase};
pub use unit::{Unit, UnitId};
