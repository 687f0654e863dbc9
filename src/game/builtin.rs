//! The built-in instruction catalog.
//!
//! A deliberately small set of kinds whose handlers between them exercise
//! every callback of the execution contract.

use crate::game::instruction::{next_step, no_cycle};
use crate::game::{
    Catalog, Category, ExecContext, Effect, FacilityKind, Handlers, InstructionKind, KindId, Step,
};

/// Damage dealt by one `strike`.
pub const STRIKE_DAMAGE: u32 = 3;

/// Money credited by one `harvest` at an owned mine.
pub const HARVEST_INCOME: i64 = 1;

const HEADING: &str = "advance.heading";
const REWIND_ARMED: &str = "rewind.armed";

/// Move to the adjacent location picked by a heading that rotates every use.
fn advance_action(ctx: &mut ExecContext<'_>) -> Step {
    let options = ctx.unit.selectable_locations.clone();
    if !options.is_empty() {
        let heading = ctx.unit.data_value(HEADING);
        let pick = usize::try_from(heading).unwrap_or(0) % options.len();
        ctx.move_to(options[pick]);
        ctx.unit.set_data(HEADING, heading.wrapping_add(1));
    }
    Step::NEXT
}

/// Hit the first enemy unit here, or failing that an enemy base.
fn strike_action(ctx: &mut ExecContext<'_>) -> Step {
    let owner = ctx.unit.owner;
    let enemy = ctx
        .unit
        .selectable_units
        .iter()
        .copied()
        .find(|&id| ctx.galaxy.unit(id).is_some_and(|u| u.owner != owner));

    if let Some(target) = enemy {
        ctx.damage_unit(target, STRIKE_DAMAGE);
    } else {
        let location = ctx.unit.location;
        let enemy_base = ctx
            .galaxy
            .location(location)
            .and_then(|l| l.base.as_ref())
            .is_some_and(|b| b.owner != owner);
        if enemy_base {
            ctx.emit(Effect::DamageBase {
                location,
                amount: STRIKE_DAMAGE,
            });
        }
    }
    Step::NEXT
}

/// Restore one health point to every damaged instance of the unit.
fn mend_end(ctx: &mut ExecContext<'_>) {
    let catalog = ctx.catalog;
    for instance in &mut ctx.unit.queue {
        if let Some(kind) = catalog.get(instance.kind)
            && instance.health < kind.max_health
        {
            instance.health += 1;
        }
    }
}

fn skip_action(_: &mut ExecContext<'_>) -> Step {
    Step(2)
}

fn rewind_start(ctx: &mut ExecContext<'_>) {
    ctx.unit.set_data(REWIND_ARMED, 1);
}

/// Jump back to the first instruction, once per turn.
fn rewind_action(ctx: &mut ExecContext<'_>) -> Step {
    if ctx.unit.data_value(REWIND_ARMED) == 0 {
        return Step::NEXT;
    }
    ctx.unit.set_data(REWIND_ARMED, 0);
    Step(-i32::try_from(ctx.slot).unwrap_or(i32::MAX))
}

fn harvest_end(ctx: &mut ExecContext<'_>) {
    let owner = ctx.unit.owner;
    let at_own_mine = ctx
        .galaxy
        .location(ctx.unit.location)
        .and_then(|l| l.base.as_ref())
        .is_some_and(|b| b.owner == owner && b.has(FacilityKind::Mine));
    if at_own_mine {
        ctx.credit_owner(HARVEST_INCOME);
    }
}

/// Refund half the kind's cost when destroyed.
fn salvage_remove(ctx: &mut ExecContext<'_>) {
    let refund = ctx.kind().map_or(0, |k| i64::from(k.cost / 2));
    if refund > 0 {
        ctx.credit_owner(refund);
    }
}

fn kind(
    name: &str,
    memory: u32,
    cost: u32,
    max_health: u32,
    categories: &[Category],
    occurrences: u32,
    handlers: Handlers,
) -> InstructionKind {
    InstructionKind {
        id: KindId(0),
        name: name.to_string(),
        memory,
        cost,
        max_health,
        categories: categories.to_vec(),
        occurrences,
        handlers,
    }
}

/// Build the built-in catalog.
#[must_use]
pub fn catalog() -> Catalog {
    Catalog::new(vec![
        kind("advance", 2, 3, 3, &[Category::Movement], 6, Handlers::action(advance_action)),
        kind("strike", 3, 4, 3, &[Category::Combat], 6, Handlers::action(strike_action)),
        kind(
            "mend",
            2,
            3,
            2,
            &[Category::Support],
            3,
            Handlers {
                on_end: mend_end,
                ..Handlers::INERT
            },
        ),
        kind("skip", 1, 1, 2, &[Category::Control], 3, Handlers::action(skip_action)),
        kind(
            "rewind",
            2,
            2,
            2,
            &[Category::Control],
            3,
            Handlers {
                on_start: rewind_start,
                on_action: rewind_action,
                on_end: no_cycle,
                on_remove: no_cycle,
            },
        ),
        kind(
            "harvest",
            2,
            3,
            2,
            &[Category::Economy],
            4,
            Handlers {
                on_end: harvest_end,
                ..Handlers::INERT
            },
        ),
        kind(
            "salvage",
            1,
            2,
            1,
            &[Category::Support, Category::Economy],
            3,
            Handlers {
                on_remove: salvage_remove,
                on_action: next_step,
                ..Handlers::INERT
            },
        ),
    ])
}
