//! Game state management: the aggregate root and its phase machine.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::error::{Rejection, SetupError};
use crate::galaxy::{generate_galaxy, Base, Galaxy, LocationId};
use crate::game::change::{ChangePlan, PlanContext, PlannedUnit};
use crate::game::draft::DraftState;
use crate::game::execution::CycleProgress;
use crate::game::{economy, Catalog, Change, FacilityKind, KindId, Player, PlayerId, Unit, UnitId};
use crate::rng::Rng;

/// Salt separating the setup/draft stream from the map generation stream.
const DRAFT_STREAM_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Phase of the turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Players claim kinds from rotating offer lists.
    Draft,
    /// Players submit one change each.
    FreeAction,
    /// Units execute their queues.
    UnitPhase,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Draft => write!(f, "draft"),
            Phase::FreeAction => write!(f, "free action"),
            Phase::UnitPhase => write!(f, "unit phase"),
        }
    }
}

/// Complete game state.
///
/// The host owns the canonical copy; clients receive serialized snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub(super) config: GameConfig,
    pub(super) galaxy: Galaxy,
    pub(super) players: Vec<Player>,
    pub(super) phase: Phase,
    pub(super) turn: u32,
    pub(super) money: BTreeMap<PlayerId, i64>,
    pub(super) draft: DraftState,
    pub(super) awaiting: BTreeSet<PlayerId>,
    pub(super) pending_changes: Vec<Change>,
    pub(super) next_unit_id: u64,
    #[serde(skip)]
    pub(super) dirty: bool,
    #[serde(skip)]
    pub(super) cycle: CycleProgress,
    #[serde(skip)]
    pub(super) rng: Rng,
    #[serde(skip, default = "Catalog::shared_builtin")]
    pub(super) catalog: Arc<Catalog>,
}

impl Game {
    /// Set up a game for the given roster using the built-in catalog.
    ///
    /// Players get ids `1..=roster.len()` in roster order.
    ///
    /// # Errors
    ///
    /// Returns an error if the roster is empty, the config fails
    /// [`GameConfig::validate`], the roster does not fit on the map, or the
    /// galaxy cannot be generated.
    pub fn new(config: GameConfig, roster: &[String]) -> Result<Self, SetupError> {
        Self::with_catalog(config, roster, Catalog::shared_builtin())
    }

    /// Set up a game with a custom catalog.
    ///
    /// # Errors
    ///
    /// See [`Game::new`].
    pub fn with_catalog(
        config: GameConfig,
        roster: &[String],
        catalog: Arc<Catalog>,
    ) -> Result<Self, SetupError> {
        if roster.is_empty() {
            return Err(SetupError::EmptyRoster);
        }
        config.validate()?;
        if roster.len() > config.locations || roster.len() > usize::from(PlayerId::MAX) {
            return Err(SetupError::TooManyPlayers {
                players: roster.len(),
                locations: config.locations,
            });
        }

        let mut galaxy = generate_galaxy(config.locations, config.seed)?;
        let mut rng = Rng::new(config.seed ^ DRAFT_STREAM_SALT);

        let starts = pick_start_locations(&galaxy, roster.len(), &mut rng);
        let mut players = Vec::with_capacity(roster.len());
        let mut money = BTreeMap::new();
        for ((i, name), start) in roster.iter().enumerate().zip(starts) {
            let id = PlayerId::try_from(i + 1).unwrap_or(PlayerId::MAX);
            if let Some(location) = galaxy.location_mut(start) {
                location.base = Some(Base::new(id, &config.starting_facilities));
            }
            players.push(Player::new(id, name.clone()));
            money.insert(id, config.starting_money);
        }

        let mut game = Self {
            draft: DraftState::new(catalog.occurrences()),
            config,
            galaxy,
            players,
            phase: Phase::Draft,
            turn: 0,
            money,
            awaiting: BTreeSet::new(),
            pending_changes: Vec::new(),
            next_unit_id: 1,
            dirty: true,
            cycle: CycleProgress::default(),
            rng,
            catalog,
        };
        info!(
            players = game.players.len(),
            locations = game.galaxy.len(),
            connections = game.galaxy.connections().len(),
            "game created"
        );
        game.enter_draft();
        game.settle();
        Ok(game)
    }

    /// Game rules.
    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The galaxy.
    #[must_use]
    pub const fn galaxy(&self) -> &Galaxy {
        &self.galaxy
    }

    /// Mutable galaxy access for scenario setup; bypasses the change protocol.
    #[must_use]
    pub fn galaxy_mut(&mut self) -> &mut Galaxy {
        self.dirty = true;
        &mut self.galaxy
    }

    /// The instruction catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// All players in id order.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Get a player by ID.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Current turn number (0-indexed).
    #[must_use]
    pub const fn turn(&self) -> u32 {
        self.turn
    }

    /// A player's balance.
    #[must_use]
    pub fn money(&self, player: PlayerId) -> i64 {
        self.money.get(&player).copied().unwrap_or(0)
    }

    /// Add money to a player's balance (negative amounts debit).
    pub fn credit(&mut self, player: PlayerId, amount: i64) {
        if let Some(balance) = self.money.get_mut(&player) {
            *balance = balance.saturating_add(amount);
            self.dirty = true;
        }
    }

    /// Draft state: pool, offers and order.
    #[must_use]
    pub const fn draft(&self) -> &DraftState {
        &self.draft
    }

    /// Offer list currently held by a player.
    #[must_use]
    pub fn offer(&self, player: PlayerId) -> &[KindId] {
        self.draft.offer(player)
    }

    /// Players the current phase is waiting on.
    #[must_use]
    pub const fn awaiting(&self) -> &BTreeSet<PlayerId> {
        &self.awaiting
    }

    /// Whether a player is expected to submit a change.
    #[must_use]
    pub fn is_awaiting(&self, player: PlayerId) -> bool {
        self.awaiting.contains(&player)
    }

    /// Changes accepted during the current free-action phase.
    #[must_use]
    pub fn pending_changes(&self) -> &[Change] {
        &self.pending_changes
    }

    /// Whether the state changed since the last call, clearing the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Whether a player is still in the game: connected and owning a home.
    #[must_use]
    pub fn is_active(&self, player: PlayerId) -> bool {
        self.player(player).is_some_and(|p| p.connected)
            && self.galaxy.owns_facility(player, FacilityKind::Home)
    }

    /// Active players in id order.
    #[must_use]
    pub fn active_players(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .map(|p| p.id)
            .filter(|&id| self.is_active(id))
            .collect()
    }

    /// Check if the game is over.
    #[must_use]
    pub fn is_over(&self) -> bool {
        let active = self.active_players().len();
        // Solo games run until the player leaves or loses their home
        active == 0 || (self.players.len() > 1 && active <= 1)
    }

    /// Apply a change submitted by a player.
    ///
    /// # Errors
    ///
    /// Returns the reason the change was rejected; the game is untouched then.
    pub fn apply_change(&mut self, change: &Change) -> Result<(), Rejection> {
        let player = change.player;
        if !self.awaiting.contains(&player) {
            return Err(Rejection::NotAwaiting { player });
        }

        match self.phase {
            Phase::Draft => self.apply_draft_pick(change)?,
            Phase::FreeAction => self.apply_free_action(change)?,
            Phase::UnitPhase => return Err(Rejection::NotAwaiting { player }),
        }

        self.awaiting.remove(&player);
        self.dirty = true;
        self.settle();
        Ok(())
    }

    fn apply_draft_pick(&mut self, change: &Change) -> Result<(), Rejection> {
        if !change.touches_nothing() {
            return Err(Rejection::UnexpectedSnapshots);
        }
        let Some(kind) = change.draft_pick else {
            return Err(Rejection::MissingDraftPick);
        };
        if !self.draft.claim(change.player, kind) {
            return Err(Rejection::NotOffered { kind });
        }
        if let Some(player) = self.player_mut(change.player) {
            player.unlock(kind);
        }
        debug!(player = change.player, %kind, "draft pick accepted");
        Ok(())
    }

    fn apply_free_action(&mut self, change: &Change) -> Result<(), Rejection> {
        let Some(player) = self.player(change.player) else {
            return Err(Rejection::NotAwaiting {
                player: change.player,
            });
        };
        let plan = PlanContext {
            galaxy: &self.galaxy,
            catalog: &self.catalog,
            config: &self.config,
            player,
            money: self.money(change.player),
        }
        .plan(change)?;

        debug!(player = change.player, cost = plan.cost, "change accepted");
        self.commit(change.player, plan);
        self.pending_changes.push(change.clone());
        Ok(())
    }

    fn commit(&mut self, player: PlayerId, plan: ChangePlan) {
        self.credit(player, -plan.cost);

        for planned in plan.units {
            match planned {
                PlannedUnit::Create { location, queue } => {
                    let id = UnitId(self.next_unit_id);
                    self.next_unit_id += 1;
                    let unit = Unit::new(id, player, location, self.config.unit_memory).with_queue(queue);
                    if let Err(unit) = self.galaxy.place_unit(unit) {
                        warn!(unit = %unit.id, location = %unit.location, "validated unit has no location");
                    }
                }
                PlannedUnit::Update { id, queue } => {
                    if let Some(unit) = self.galaxy.unit_mut(id) {
                        unit.destroyed = queue.is_empty();
                        unit.queue = queue;
                        unit.reset_cycle();
                    }
                }
            }
        }
        for (location, base) in plan.bases {
            if let Some(location) = self.galaxy.location_mut(location) {
                location.base = base;
            }
        }
        self.galaxy.prune();
    }

    /// Mark a player as disconnected; they are no longer awaited.
    ///
    /// Returns `false` if the player was unknown or already disconnected.
    pub fn disconnect(&mut self, player: PlayerId) -> bool {
        match self.player_mut(player) {
            Some(p) if p.connected => p.disconnect(),
            _ => return false,
        }
        self.awaiting.remove(&player);
        self.dirty = true;
        info!(player, "player disconnected, forfeiting");
        self.settle();
        true
    }

    /// Skip every player the current phase is still waiting on.
    ///
    /// Returns the skipped players.
    pub fn forfeit_awaiting(&mut self) -> Vec<PlayerId> {
        let skipped: Vec<PlayerId> = std::mem::take(&mut self.awaiting).into_iter().collect();
        if !skipped.is_empty() {
            info!(?skipped, phase = %self.phase, "phase deadline passed");
            self.dirty = true;
            self.settle();
        }
        skipped
    }

    /// Advance through every phase transition that needs no further input.
    fn settle(&mut self) {
        while !self.is_over() && self.awaiting.is_empty() {
            match self.phase {
                Phase::Draft if self.draft.is_complete() => {
                    self.draft.close();
                    self.enter_free_action();
                }
                Phase::Draft => {
                    self.draft.rotate();
                    self.await_draft_holders();
                }
                Phase::FreeAction => self.enter_unit_phase(),
                Phase::UnitPhase => return,
            }
        }
    }

    fn await_draft_holders(&mut self) {
        let holders = self.draft.holders();
        self.awaiting = holders.into_iter().filter(|&p| self.is_active(p)).collect();
    }

    fn enter_draft(&mut self) {
        self.phase = Phase::Draft;
        let order = self.active_players();
        let size = self.config.offer_size(order.len());
        self.draft.open(order, size, &mut self.rng);
        self.await_draft_holders();
        self.dirty = true;
        info!(turn = self.turn, offer_size = size, "draft opened");
    }

    fn enter_free_action(&mut self) {
        self.phase = Phase::FreeAction;
        self.awaiting = self.active_players().into_iter().collect();
        self.dirty = true;
        info!(turn = self.turn, "free action opened");
    }

    fn enter_unit_phase(&mut self) {
        self.phase = Phase::UnitPhase;
        self.awaiting.clear();
        self.pending_changes.clear();
        self.cycle = CycleProgress::default();
        self.dirty = true;
        info!(turn = self.turn, units = self.galaxy.units().count(), "unit phase started");
    }

    /// Close a completed unit phase: next turn, income, new draft.
    pub(super) fn finish_unit_phase(&mut self) {
        self.turn += 1;
        for player in self.active_players() {
            let income = economy::income(&self.galaxy, player);
            self.credit(player, income);
        }
        self.enter_draft();
        self.settle();
    }
}

/// Spread starting locations out by farthest-point selection.
fn pick_start_locations(galaxy: &Galaxy, count: usize, rng: &mut Rng) -> Vec<LocationId> {
    let locations = galaxy.locations();
    if locations.is_empty() || count == 0 {
        return Vec::new();
    }

    let mut chosen = vec![locations[rng.index(locations.len())].id];
    while chosen.len() < count.min(locations.len()) {
        let mut best: Option<(LocationId, f64)> = None;
        for location in locations.iter().filter(|l| !chosen.contains(&l.id)) {
            let nearest = chosen
                .iter()
                .filter_map(|&c| galaxy.location(c))
                .map(|c| c.position.distance(location.position))
                .fold(f64::INFINITY, f64::min);
            if best.is_none_or(|(_, d)| nearest > d) {
                best = Some((location.id, nearest));
            }
        }
        match best {
            Some((id, _)) => chosen.push(id),
            None => break,
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("p{i}")).collect()
    }

    fn small_config() -> GameConfig {
        GameConfig {
            locations: 5,
            ..GameConfig::default()
        }
    }

    #[test]
    fn test_new_game_opens_draft() {
        let game = Game::new(small_config(), &roster(2)).unwrap();
        assert_eq!(game.phase(), Phase::Draft);
        assert_eq!(game.turn(), 0);
        assert_eq!(game.offer(1).len(), 4);
        assert_eq!(game.offer(2).len(), 4);
        assert_eq!(game.awaiting().len(), 2);
        assert_eq!(game.money(1), game.config().starting_money);
        assert!(game.is_active(1) && game.is_active(2));
        assert!(!game.is_over());
    }

    #[test]
    fn test_starting_bases_distinct() {
        let game = Game::new(small_config(), &roster(3)).unwrap();
        let owners: Vec<PlayerId> = game.galaxy().bases().map(|(_, b)| b.owner).collect();
        assert_eq!(owners.len(), 3);
        for id in 1..=3 {
            assert!(owners.contains(&id));
        }
    }

    #[test]
    fn test_setup_errors() {
        assert_eq!(
            Game::new(small_config(), &[]).unwrap_err(),
            SetupError::EmptyRoster
        );
        assert!(matches!(
            Game::new(small_config(), &roster(6)).unwrap_err(),
            SetupError::TooManyPlayers { players: 6, .. }
        ));
        let degenerate = GameConfig {
            max_rounds_per_turn: 0,
            ..small_config()
        };
        assert!(matches!(
            Game::new(degenerate, &roster(2)).unwrap_err(),
            SetupError::InvalidConfig {
                field: "max_rounds_per_turn",
                ..
            }
        ));
    }

    #[test]
    fn test_not_awaiting_rejected() {
        let mut game = Game::new(small_config(), &roster(2)).unwrap();
        let kind = game.offer(1)[0];
        game.apply_change(&Change::pick(1, kind)).unwrap();
        assert_eq!(
            game.apply_change(&Change::pick(1, kind)).unwrap_err(),
            Rejection::NotAwaiting { player: 1 }
        );
        assert_eq!(
            game.apply_change(&Change::pass(9)).unwrap_err(),
            Rejection::NotAwaiting { player: 9 }
        );
    }

    #[test]
    fn test_draft_pick_validation() {
        let mut game = Game::new(small_config(), &roster(2)).unwrap();
        assert_eq!(
            game.apply_change(&Change::pass(1)).unwrap_err(),
            Rejection::MissingDraftPick
        );
        let missing = (0..)
            .map(KindId)
            .find(|k| !game.offer(1).contains(k))
            .unwrap();
        assert_eq!(
            game.apply_change(&Change::pick(1, missing)).unwrap_err(),
            Rejection::NotOffered { kind: missing }
        );
        assert!(game.is_awaiting(1));
    }

    #[test]
    fn test_draft_flows_into_free_action() {
        let mut game = Game::new(small_config(), &roster(2)).unwrap();
        for _ in 0..2 {
            for player in [1, 2] {
                let kind = game.offer(player)[0];
                game.apply_change(&Change::pick(player, kind)).unwrap();
            }
        }
        assert_eq!(game.phase(), Phase::FreeAction);
        assert_eq!(game.player(1).unwrap().unlocked_count(), 2);
        assert!(game.draft().offers().is_empty());
    }

    #[test]
    fn test_disconnect_ends_two_player_game() {
        let mut game = Game::new(small_config(), &roster(2)).unwrap();
        assert!(game.disconnect(2));
        assert!(!game.disconnect(2));
        assert!(!game.is_awaiting(2));
        assert!(game.is_over());
    }

    #[test]
    fn test_forfeit_awaiting_skips_phase() {
        let mut game = Game::new(small_config(), &roster(2)).unwrap();
        let skipped = game.forfeit_awaiting();
        assert_eq!(skipped, vec![1, 2]);
        // Lists rotated, both players awaited again
        assert_eq!(game.phase(), Phase::Draft);
        assert_eq!(game.draft().rotations(), 1);

        game.forfeit_awaiting();
        assert_eq!(game.phase(), Phase::FreeAction);
    }

    #[test]
    fn test_take_dirty() {
        let mut game = Game::new(small_config(), &roster(2)).unwrap();
        assert!(game.take_dirty());
        assert!(!game.take_dirty());
        game.credit(1, 5);
        assert!(game.take_dirty());
    }

    #[test]
    fn test_pick_start_locations_spread() {
        let galaxy = generate_galaxy(20, 4).unwrap();
        let starts = pick_start_locations(&galaxy, 4, &mut Rng::new(1));
        assert_eq!(starts.len(), 4);
        let unique: BTreeSet<LocationId> = starts.iter().copied().collect();
        assert_eq!(unique.len(), 4);
    }
}
