//! Drafting: the shared pool, per-player offer lists, and their rotation.
//!
//! Every copy of every kind lives in exactly one place: the pool, a player's
//! offer list, or a player's unlocked multiset. Drawing moves copies from the
//! pool into offers, claiming moves one copy from an offer into unlocked, and
//! closing the draft returns whatever is left on offer to the pool.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::{KindId, PlayerId};
use crate::rng::Rng;

/// Draft state for one game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftState {
    /// Undrafted copies per kind.
    pool: BTreeMap<KindId, u32>,
    /// Offer list currently held by each participant.
    offers: BTreeMap<PlayerId, Vec<KindId>>,
    /// Participants in passing order.
    order: Vec<PlayerId>,
    /// Rotations performed in the current draft.
    rotations: usize,
}

impl DraftState {
    /// Create a draft state with a full pool and no offers.
    #[must_use]
    pub const fn new(pool: BTreeMap<KindId, u32>) -> Self {
        Self {
            pool,
            offers: BTreeMap::new(),
            order: Vec::new(),
            rotations: 0,
        }
    }

    /// Undrafted copies per kind.
    #[must_use]
    pub const fn pool(&self) -> &BTreeMap<KindId, u32> {
        &self.pool
    }

    /// Total copies left in the pool.
    #[must_use]
    pub fn pool_size(&self) -> u32 {
        self.pool.values().sum()
    }

    /// All offer lists.
    #[must_use]
    pub const fn offers(&self) -> &BTreeMap<PlayerId, Vec<KindId>> {
        &self.offers
    }

    /// Offer list held by a player (empty if none).
    #[must_use]
    pub fn offer(&self, player: PlayerId) -> &[KindId] {
        self.offers.get(&player).map_or(&[], Vec::as_slice)
    }

    /// Participants in passing order.
    #[must_use]
    pub fn order(&self) -> &[PlayerId] {
        &self.order
    }

    /// Rotations performed in the current draft.
    #[must_use]
    pub const fn rotations(&self) -> usize {
        self.rotations
    }

    /// Whether every list has visited every participant.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.rotations + 1 >= self.order.len()
    }

    /// Participants currently holding a non-empty offer list.
    #[must_use]
    pub fn holders(&self) -> Vec<PlayerId> {
        self.order
            .iter()
            .copied()
            .filter(|p| !self.offer(*p).is_empty())
            .collect()
    }

    /// Start a new draft: each participant draws up to `offer_size` kinds.
    ///
    /// Draws are weighted by remaining copies, so the pool may run dry.
    pub fn open(&mut self, order: Vec<PlayerId>, offer_size: usize, rng: &mut Rng) {
        self.return_offers();
        self.rotations = 0;
        for &player in &order {
            let list: Vec<KindId> = (0..offer_size).map_while(|_| self.draw(rng)).collect();
            self.offers.insert(player, list);
        }
        self.order = order;
    }

    /// Draw one copy from the pool.
    fn draw(&mut self, rng: &mut Rng) -> Option<KindId> {
        let total = u64::from(self.pool_size());
        if total == 0 {
            return None;
        }
        let mut pick = rng.below(total);
        let kind = self.pool.iter().find_map(|(&kind, &count)| {
            let count = u64::from(count);
            if pick < count {
                Some(kind)
            } else {
                pick -= count;
                None
            }
        })?;

        if let Some(count) = self.pool.get_mut(&kind) {
            *count -= 1;
            if *count == 0 {
                self.pool.remove(&kind);
            }
        }
        Some(kind)
    }

    /// Remove one copy of `kind` from a player's offer list.
    ///
    /// Returns `false` if it was not on offer to that player.
    pub fn claim(&mut self, player: PlayerId, kind: KindId) -> bool {
        let Some(list) = self.offers.get_mut(&player) else {
            return false;
        };
        match list.iter().position(|&k| k == kind) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Pass every offer list to the next participant in order.
    pub fn rotate(&mut self) {
        let n = self.order.len();
        if n > 0 {
            let mut rotated = BTreeMap::new();
            for (i, player) in self.order.iter().enumerate() {
                let list = self.offers.remove(player).unwrap_or_default();
                rotated.insert(self.order[(i + 1) % n], list);
            }
            self.offers = rotated;
        }
        self.rotations += 1;
    }

    /// End the draft, returning unclaimed offers to the pool.
    pub fn close(&mut self) {
        self.return_offers();
        self.order.clear();
        self.rotations = 0;
    }

    fn return_offers(&mut self) {
        for kind in std::mem::take(&mut self.offers).into_values().flatten() {
            *self.pool.entry(kind).or_insert(0) += 1;
        }
    }

    /// Copies per kind currently on offer to anyone.
    #[must_use]
    pub fn offered_counts(&self) -> BTreeMap<KindId, u32> {
        let mut counts = BTreeMap::new();
        for &kind in self.offers.values().flatten() {
            *counts.entry(kind).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> BTreeMap<KindId, u32> {
        [(KindId(0), 3), (KindId(1), 2), (KindId(2), 5)].into_iter().collect()
    }

    fn total(draft: &DraftState) -> u32 {
        draft.pool_size() + draft.offered_counts().values().sum::<u32>()
    }

    #[test]
    fn test_open_draws_offer_size() {
        let mut draft = DraftState::new(pool());
        let mut rng = Rng::new(3);
        draft.open(vec![1, 2], 4, &mut rng);

        assert_eq!(draft.offer(1).len(), 4);
        assert_eq!(draft.offer(2).len(), 4);
        assert_eq!(draft.pool_size(), 2);
        assert_eq!(total(&draft), 10);
    }

    #[test]
    fn test_pool_runs_dry() {
        let mut draft = DraftState::new(pool());
        let mut rng = Rng::new(3);
        draft.open(vec![1, 2, 3], 4, &mut rng);

        assert_eq!(draft.offer(1).len(), 4);
        assert_eq!(draft.offer(2).len(), 4);
        assert_eq!(draft.offer(3).len(), 2);
        assert_eq!(draft.pool_size(), 0);
        assert_eq!(draft.holders(), vec![1, 2, 3]);
    }

    #[test]
    fn test_claim_only_offered() {
        let mut draft = DraftState::new(pool());
        let mut rng = Rng::new(9);
        draft.open(vec![1], 3, &mut rng);

        let kind = draft.offer(1)[0];
        assert!(draft.claim(1, kind));
        assert_eq!(draft.offer(1).len(), 2);
        assert!(!draft.claim(2, kind));
        assert!(!draft.claim(1, KindId(99)));
        assert_eq!(total(&draft), 9);
    }

    #[test]
    fn test_rotate_passes_lists() {
        let mut draft = DraftState::new(pool());
        let mut rng = Rng::new(5);
        draft.open(vec![1, 2, 3], 2, &mut rng);

        let before: Vec<Vec<KindId>> = [1, 2, 3].iter().map(|p| draft.offer(*p).to_vec()).collect();
        draft.rotate();

        assert_eq!(draft.offer(2), before[0].as_slice());
        assert_eq!(draft.offer(3), before[1].as_slice());
        assert_eq!(draft.offer(1), before[2].as_slice());
        assert_eq!(draft.rotations(), 1);
        assert!(!draft.is_complete());

        draft.rotate();
        assert!(draft.is_complete());
    }

    #[test]
    fn test_close_returns_offers() {
        let mut draft = DraftState::new(pool());
        let mut rng = Rng::new(5);
        draft.open(vec![1, 2], 3, &mut rng);
        draft.close();

        assert_eq!(draft.pool(), &pool());
        assert!(draft.offers().is_empty());
        assert!(draft.order().is_empty());
    }

    #[test]
    fn test_single_participant_completes_immediately() {
        let mut draft = DraftState::new(pool());
        let mut rng = Rng::new(1);
        draft.open(vec![4], 3, &mut rng);
        assert!(draft.is_complete());
    }

    #[test]
    fn test_draws_deterministic() {
        let mut a = DraftState::new(pool());
        let mut b = DraftState::new(pool());
        a.open(vec![1, 2], 3, &mut Rng::new(77));
        b.open(vec![1, 2], 3, &mut Rng::new(77));
        assert_eq!(a, b);
    }
}
