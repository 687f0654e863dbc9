//! The unit instruction-execution cycle.
//!
//! A unit phase runs three passes. The start pass caches what each unit can
//! see and runs every start handler. Main rounds then invoke one action
//! handler per unfinished unit until all are finished. The end pass runs every
//! end handler and resets pointers for the next turn.
//!
//! The executing unit is detached from the galaxy while its handler runs, so
//! handlers see the rest of the world read-only and mutate only their own
//! unit. Everything else happens through [`Effect`]s applied afterwards.

use std::collections::VecDeque;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::galaxy::LocationId;
use crate::game::combat::{damage_base, damage_queue};
use crate::game::{CycleHandler, Effect, ExecContext, Game, Handlers, Phase, Step, Unit, UnitId};

/// Effects applied per handler invocation before the rest are dropped.
const MAX_EFFECTS_PER_INVOCATION: usize = 256;

/// Progress through the current unit phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CycleProgress {
    started: bool,
    rounds: u32,
}

/// Which per-instance callback a cycle pass invokes.
#[derive(Debug, Clone, Copy)]
enum Pass {
    Start,
    End,
}

impl Pass {
    const fn handler(self, handlers: &Handlers) -> CycleHandler {
        match self {
            Pass::Start => handlers.on_start,
            Pass::End => handlers.on_end,
        }
    }
}

impl Game {
    /// Run up to `rounds` main-action rounds of the unit phase.
    ///
    /// The first call also runs the start pass. Returns `true` once the unit
    /// phase has completed (end pass run, next draft opened), or immediately
    /// when not in the unit phase.
    pub fn run_unit_batch(&mut self, rounds: u32) -> bool {
        if self.phase != Phase::UnitPhase {
            return true;
        }
        if !self.cycle.started {
            self.start_pass();
            self.cycle.started = true;
        }

        let cap = self.config.max_rounds_per_turn;
        for _ in 0..rounds {
            if self.all_finished() || self.cycle.rounds >= cap {
                break;
            }
            self.action_round();
            self.cycle.rounds += 1;
        }

        if !self.all_finished() && self.cycle.rounds >= cap {
            warn!(turn = self.turn, rounds = cap, "round cap reached, finishing every unit");
            for unit in self.galaxy.units_mut() {
                unit.finished = true;
            }
        }

        self.dirty = true;
        if !self.all_finished() {
            return false;
        }

        self.end_pass();
        info!(turn = self.turn, rounds = self.cycle.rounds, "unit phase complete");
        self.finish_unit_phase();
        true
    }

    /// Run the whole unit phase.
    pub fn run_unit_phase(&mut self) {
        while !self.run_unit_batch(self.config.max_rounds_per_turn.max(1)) {}
    }

    fn all_finished(&self) -> bool {
        self.galaxy.units().all(|u| u.finished)
    }

    fn start_pass(&mut self) {
        let galaxy = &self.galaxy;
        let selections: Vec<(Vec<LocationId>, Vec<UnitId>)> = galaxy
            .locations()
            .par_iter()
            .flat_map_iter(|location| {
                let neighbors = galaxy.neighbors(location.id);
                location.units.iter().map(move |unit| {
                    let others = location
                        .units
                        .iter()
                        .filter(|other| other.id != unit.id)
                        .map(|other| other.id)
                        .collect();
                    (neighbors.clone(), others)
                })
            })
            .collect();

        for (unit, (locations, units)) in self.galaxy.units_mut().zip(selections) {
            unit.selectable_locations = locations;
            unit.selectable_units = units;
            unit.reset_cycle();
            if unit.queue.is_empty() {
                unit.finished = true;
            }
        }

        self.cycle_pass(Pass::Start);
        self.galaxy.prune();
    }

    fn end_pass(&mut self) {
        self.cycle_pass(Pass::End);
        for unit in self.galaxy.units_mut() {
            unit.reset_cycle();
        }
        self.galaxy.prune();
    }

    /// Invoke one callback on every instance of every unit.
    fn cycle_pass(&mut self, pass: Pass) {
        let catalog = Arc::clone(&self.catalog);
        for id in self.galaxy.unit_ids() {
            let Some((_, idx)) = self.galaxy.find_unit(id) else {
                continue;
            };
            let Some(mut unit) = self.galaxy.take_unit(id) else {
                continue;
            };

            let mut effects = Vec::new();
            let mut slot = 0;
            while slot < unit.queue.len() {
                let kind = unit.queue[slot].kind;
                if let Some(kind) = catalog.get(kind) {
                    let handler = pass.handler(&kind.handlers);
                    let mut ctx = ExecContext::new(&mut unit, slot, self.turn, &self.galaxy, &catalog);
                    handler(&mut ctx);
                    effects.extend(ctx.into_effects());
                }
                slot += 1;
            }

            self.put_back(unit, idx);
            self.apply_effects(effects);
        }
    }

    /// Invoke the action handler at the pointer of every unfinished unit.
    fn action_round(&mut self) {
        let catalog = Arc::clone(&self.catalog);
        for id in self.galaxy.unit_ids() {
            let Some((_, idx)) = self.galaxy.find_unit(id) else {
                continue;
            };
            let Some(mut unit) = self.galaxy.take_unit(id) else {
                continue;
            };
            if unit.finished || unit.destroyed {
                self.put_back(unit, idx);
                continue;
            }

            let slot = unit.pointer;
            let handler = unit
                .queue
                .get(slot)
                .and_then(|instance| catalog.get(instance.kind))
                .map(|kind| kind.handlers.on_action);
            let (step, effects) = match handler {
                Some(handler) => {
                    let mut ctx = ExecContext::new(&mut unit, slot, self.turn, &self.galaxy, &catalog);
                    let step = handler(&mut ctx);
                    (step, ctx.into_effects())
                }
                None => (Step::NEXT, Vec::new()),
            };
            unit.advance(step.0);

            self.put_back(unit, idx);
            self.apply_effects(effects);
        }
        self.galaxy.prune();
    }

    fn put_back(&mut self, unit: Unit, idx: usize) {
        if let Err(unit) = self.galaxy.restore_unit(unit, idx) {
            warn!(unit = %unit.id, location = %unit.location, "unit lost its location");
        }
    }

    /// Apply effects in order; effects raised while applying are queued behind.
    fn apply_effects(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut applied = 0;
        while let Some(effect) = queue.pop_front() {
            if applied == MAX_EFFECTS_PER_INVOCATION {
                warn!(dropped = queue.len() + 1, "effect chain too long");
                break;
            }
            applied += 1;
            match effect {
                Effect::Move { unit, to } => self.move_unit(unit, to),
                Effect::DamageUnit { target, amount } => {
                    queue.extend(self.damage_unit(target, amount));
                }
                Effect::DamageBase { location, amount } => self.damage_base_at(location, amount),
                Effect::Credit { player, amount } => self.credit(player, amount),
            }
        }
    }

    fn move_unit(&mut self, id: UnitId, to: LocationId) {
        let Some(from) = self.galaxy.unit(id).map(|u| u.location) else {
            return;
        };
        if !self.galaxy.are_connected(from, to) {
            debug!(unit = %id, %from, %to, "move along a missing connection ignored");
            return;
        }
        if let Some(mut unit) = self.galaxy.take_unit(id) {
            unit.location = to;
            if let Err(mut unit) = self.galaxy.place_unit(unit) {
                unit.location = from;
                self.put_back(unit, usize::MAX);
            }
        }
    }

    /// Damage a unit's queue, running removal handlers of destroyed instances.
    ///
    /// Returns the effects raised by those handlers.
    fn damage_unit(&mut self, id: UnitId, amount: u32) -> Vec<Effect> {
        let Some((_, idx)) = self.galaxy.find_unit(id) else {
            return Vec::new();
        };
        let Some(mut unit) = self.galaxy.take_unit(id) else {
            return Vec::new();
        };
        let catalog = Arc::clone(&self.catalog);

        let dead = damage_queue(&mut unit.queue, amount);
        let mut effects = Vec::new();
        for &slot in dead.iter().rev() {
            if let Some(kind) = unit.queue.get(slot).and_then(|i| catalog.get(i.kind)) {
                let on_remove = kind.handlers.on_remove;
                let mut ctx = ExecContext::new(&mut unit, slot, self.turn, &self.galaxy, &catalog);
                on_remove(&mut ctx);
                effects.extend(ctx.into_effects());
            }
            unit.remove_instance(slot);
        }
        unit.destroyed = unit.queue.is_empty();
        if unit.destroyed {
            debug!(unit = %id, "unit destroyed");
        }

        self.put_back(unit, idx);
        effects
    }

    fn damage_base_at(&mut self, location: LocationId, amount: u32) {
        let Some(base) = self.galaxy.location_mut(location).and_then(|l| l.base.as_mut()) else {
            return;
        };
        let destroyed = damage_base(base, amount);
        if !destroyed.is_empty() {
            debug!(%location, ?destroyed, "facilities destroyed");
        }
    }
}
