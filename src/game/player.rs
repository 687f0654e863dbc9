//! Player state management.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::KindId;

/// Unique identifier for a player.
pub type PlayerId = u8;

/// State for a single player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Unique identifier for this player.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Unlocked instruction kinds, as a multiset.
    pub unlocked: BTreeMap<KindId, u32>,
    /// Whether the player's connection is still open.
    pub connected: bool,
}

impl Player {
    /// Create a connected player with nothing unlocked.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            unlocked: BTreeMap::new(),
            connected: true,
        }
    }

    /// Add one copy of a kind to the unlocked multiset.
    pub fn unlock(&mut self, kind: KindId) {
        *self.unlocked.entry(kind).or_insert(0) += 1;
    }

    /// Whether at least one copy of the kind is unlocked.
    #[must_use]
    pub fn has_unlocked(&self, kind: KindId) -> bool {
        self.unlocked.get(&kind).is_some_and(|&n| n > 0)
    }

    /// Total number of unlocked copies.
    #[must_use]
    pub fn unlocked_count(&self) -> u32 {
        self.unlocked.values().sum()
    }

    /// Mark the player as disconnected.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_creation() {
        let player = Player::new(1, "ada");
        assert_eq!(player.id, 1);
        assert_eq!(player.name, "ada");
        assert!(player.connected);
        assert_eq!(player.unlocked_count(), 0);
    }

    #[test]
    fn test_unlock_multiset() {
        let mut player = Player::new(1, "ada");
        assert!(!player.has_unlocked(KindId(3)));

        player.unlock(KindId(3));
        player.unlock(KindId(3));
        player.unlock(KindId(1));
        assert!(player.has_unlocked(KindId(3)));
        assert_eq!(player.unlocked[&KindId(3)], 2);
        assert_eq!(player.unlocked_count(), 3);
    }

    #[test]
    fn test_player_disconnect() {
        let mut player = Player::new(1, "ada");
        player.disconnect();
        assert!(!player.connected);
    }
}
