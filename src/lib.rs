// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Dronefall: a turn-based multiplayer strategy game played on a procedurally
//! generated galaxy.
//!
//! Players draft instruction kinds from a shared pool, program drone units
//! with instruction queues, and watch every unit execute its queue in
//! lock-step during the unit phase.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Session (host, clients, wire)     │
//! ├─────────────────────────────────────┤
//! │   Game (phases, draft, execution)   │
//! ├─────────────────────────────────────┤
//! │   Galaxy (map, geometry, mapgen)    │
//! └─────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod galaxy;
pub mod game;
pub mod rng;
pub mod session;

pub use config::{ConfigError, GameConfig, ServerConfig};
pub use error::{Rejection, SetupError};

// Re-export key game types at crate root for convenience
pub use galaxy::{generate_galaxy, Galaxy, LocationId};
pub use game::{Catalog, Change, Game, KindId, Phase, PlayerId, UnitId};
pub use session::{Client, Host, SessionError};
