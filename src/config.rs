//! Game and server configuration.
//!
//! Both structs deserialize from JSON with every field optional; missing
//! fields take their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SetupError;
use crate::game::FacilityKind;

/// Error type for loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid configuration JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// The file parsed but holds unplayable values.
    #[error("{path}: {source}")]
    Invalid {
        /// File path.
        path: PathBuf,
        /// Rejected value.
        source: SetupError,
    },
}

/// Rules of a single game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of locations in the galaxy.
    pub locations: usize,
    /// Seed for map generation and drafting.
    pub seed: u64,
    /// Money each player starts with.
    pub starting_money: i64,
    /// Money needed to create a unit, on top of its queue.
    pub unit_cost: u32,
    /// Memory of a newly created unit.
    pub unit_memory: u32,
    /// Offer list size before adding one kind per participant.
    pub offer_base: usize,
    /// Main-action rounds after which every unit is force-finished.
    pub max_rounds_per_turn: u32,
    /// Facilities of every starting base.
    pub starting_facilities: Vec<FacilityKind>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            locations: 12,
            seed: 42,
            starting_money: 20,
            unit_cost: 4,
            unit_memory: 8,
            offer_base: 2,
            max_rounds_per_turn: 64,
            starting_facilities: vec![FacilityKind::Home, FacilityKind::Factory],
        }
    }
}

impl GameConfig {
    /// Offer list size for a draft with `participants` players.
    #[must_use]
    pub const fn offer_size(&self, participants: usize) -> usize {
        self.offer_base + participants
    }

    /// Reject values no game can be played with.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), SetupError> {
        let invalid = |field, reason| Err(SetupError::InvalidConfig { field, reason });
        if self.locations == 0 {
            return invalid("locations", "must be at least 1");
        }
        if self.starting_money < 0 {
            return invalid("starting_money", "must not be negative");
        }
        if self.unit_memory == 0 {
            return invalid("unit_memory", "must be at least 1");
        }
        if self.max_rounds_per_turn == 0 {
            return invalid("max_rounds_per_turn", "must be at least 1");
        }
        if !self.starting_facilities.contains(&FacilityKind::Home) {
            return invalid("starting_facilities", "must include home");
        }
        Ok(())
    }
}

/// Settings of a hosted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Number of players to wait for before the game starts.
    pub players: usize,
    /// Main-action rounds run per batch between broadcasts.
    pub batch_rounds: u32,
    /// Seconds an awaited player has before being skipped (off when `None`).
    pub phase_deadline_secs: Option<u64>,
    /// Rules of the hosted game.
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7878".to_string(),
            players: 2,
            batch_rounds: 8,
            phase_deadline_secs: None,
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// [`ServerConfig::validate`] refuses its contents.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(|source| ConfigError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    /// Reject session and game values no game can be played with.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.players == 0 {
            return Err(SetupError::InvalidConfig {
                field: "players",
                reason: "must be at least 1",
            });
        }
        if self.batch_rounds == 0 {
            return Err(SetupError::InvalidConfig {
                field: "batch_rounds",
                reason: "must be at least 1",
            });
        }
        self.game.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.players, 2);
        assert_eq!(config.game.offer_size(2), 4);
        assert_eq!(config.game.max_rounds_per_turn, 64);
        assert!(config.phase_deadline_secs.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"players": 3, "game": {{"locations": 7, "starting_facilities": ["home"]}}}}"#
        )
        .unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.players, 3);
        assert_eq!(config.bind, ServerConfig::default().bind);
        assert_eq!(config.game.locations, 7);
        assert_eq!(config.game.starting_facilities, vec![FacilityKind::Home]);
        assert_eq!(config.game.seed, GameConfig::default().seed);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_validate_rejects_degenerate_game() {
        assert_eq!(GameConfig::default().validate(), Ok(()));

        let config = GameConfig {
            max_rounds_per_turn: 0,
            ..GameConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(SetupError::InvalidConfig {
                field: "max_rounds_per_turn",
                reason: "must be at least 1",
            })
        );

        let config = GameConfig {
            starting_facilities: vec![FacilityKind::Factory],
            ..GameConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SetupError::InvalidConfig {
                field: "starting_facilities",
                ..
            })
        ));

        let config = GameConfig {
            unit_memory: 0,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"batch_rounds": 0}}"#).unwrap();
        let err = ServerConfig::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                source: SetupError::InvalidConfig {
                    field: "batch_rounds",
                    ..
                },
                ..
            }
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"game": {{"max_rounds_per_turn": 0}}}}"#).unwrap();
        let err = ServerConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_rounds_per_turn"));
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = ServerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
