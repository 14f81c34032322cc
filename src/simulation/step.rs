//! The per-tick stages, run in order by [`Ecosystem::tick`](super::ecosystem::Ecosystem::tick).
//!
//! 1. [`rebuild_index`]: snapshot positions and rebuild the spatial index.
//! 2. [`sense`]: find the nearest food and eat it when in reach.
//! 3. [`think`]: evaluate every brain.
//! 4. [`act`]: steer and move.
//! 5. [`account`]: accrue fitness, drain energy and cull the dead.
//!
//! Stages only read the population snapshot and push entity changes to an
//! [`EventQueue`]; nothing is created or destroyed mid-scan.

use std::collections::HashSet;
use std::f32::consts::FRAC_PI_2;

use geo::algorithm::Distance;
use geo::{Euclidean, Point};

use super::brain::{Actions, BrainOutput, BrainScratch};
use super::creature::{CreatureState, Polar};
use super::error::{GenerationError, SpatialError};
use super::events::{EventQueue, TickEvent};
use super::generation::GenerationPool;
use super::host::{EntityHost, EntityId, Template};
use super::params::Params;
use super::spatial::SpatialIndex;

/// Clears the index and inserts every food item and, when `track_creatures`
/// is set, every creature. Also refreshes each creature's cached position.
///
/// Creatures whose entity has no transform keep their previous position.
pub fn rebuild_index<H: EntityHost>(
    index: &mut SpatialIndex,
    host: &H,
    creatures: &mut [CreatureState],
    track_creatures: bool,
) -> Result<(), SpatialError> {
    index.clear();

    for food in host.entities(Template::Food) {
        if let Some(t) = host.transform(food) {
            index.insert(food, Template::Food, t.pos)?;
        }
    }

    for creature in creatures.iter_mut() {
        if let Some(t) = host.transform(creature.entity) {
            creature.cached_pos = t.pos;
        }
        if track_creatures {
            index.insert(creature.entity, Template::Creature, creature.cached_pos)?;
        }
    }
    Ok(())
}

/// Records the polar offset to each creature's nearest food and lets it eat.
///
/// A food item is eaten when it lies strictly closer than `eat_radius`. Each
/// item can be eaten once per tick: the first creature in iteration order to
/// reach it claims it, later creatures still sense it but gain nothing.
///
/// # Returns
///
/// The number of food items eaten.
pub fn sense(
    index: &SpatialIndex,
    creatures: &mut [CreatureState],
    params: &Params,
    claimed: &mut HashSet<EntityId>,
    events: &mut EventQueue,
) -> usize {
    claimed.clear();

    for creature in creatures.iter_mut() {
        let from = creature.cached_pos;
        let Some(food) = index.nearest_of_type(from, Template::Food, Some(creature.entity)) else {
            creature.nearest_food = Polar::default();
            continue;
        };

        let offset = food.pos - from;
        let dist = Euclidean.distance(from, food.pos);
        creature.nearest_food = Polar {
            angle: offset.y().atan2(offset.x()),
            dist,
        };

        if dist < params.eat_radius && claimed.insert(food.entity) {
            creature.eat(params.eat_reward);
            events.push(TickEvent::FoodEaten {
                creature: creature.entity,
                food: food.entity,
            });
        }
    }
    claimed.len()
}

/// Evaluates every brain on its sensed inputs and stores the decoded output.
pub fn think(creatures: &mut [CreatureState], params: &Params, scratch: &mut BrainScratch) {
    for creature in creatures.iter_mut() {
        let inputs = creature.brain_inputs(params.distance_scale);
        let outputs = creature
            .genome
            .evaluate_into(&inputs, params.activation, scratch);
        creature.output = BrainOutput::from_outputs(outputs);
    }
}

/// Turns and moves every creature whose brain requested `MOVE`.
///
/// The step is `speed * dt` along `(cos a, -sin a)` in XZ, where `a` is the
/// steering angle, and the result is clamped to the spawn margin.
pub fn act<H: EntityHost>(host: &mut H, creatures: &[CreatureState], params: &Params, dt: f64) {
    let (hw, hh) = params.half_extents();
    let (lx, lz) = (hw - params.spawn_margin, hh - params.spawn_margin);
    let step = dt as f32 * params.speed;

    for creature in creatures {
        if !creature.output.actions.contains(Actions::MOVE) {
            continue;
        }

        let angle = creature.output.steer_angle;
        host.set_heading(creature.entity, angle - FRAC_PI_2);

        let x = creature.cached_pos.x() + angle.cos() * step;
        let z = creature.cached_pos.y() + (-angle).sin() * step;
        host.set_position(
            creature.entity,
            Point::new(x.clamp(-lx, lx), z.clamp(-lz, lz)),
        );
    }
}

/// Accrues fitness, drains energy and records every creature that died.
///
/// Fitness is credited before the energy check, so the final tick counts.
/// A dead creature's genome and fitness are appended to `pool` immediately
/// and a [`TickEvent::CreatureDied`] is queued; the caller drops its state.
///
/// # Returns
///
/// The number of creatures that died.
///
/// # Errors
///
/// [`GenerationError::PoolOverflow`] if more creatures died than the pool holds.
pub fn account(
    creatures: &mut [CreatureState],
    params: &Params,
    dt: f64,
    pool: &mut GenerationPool,
    events: &mut EventQueue,
) -> Result<usize, GenerationError> {
    let mut deaths = 0;

    for creature in creatures.iter_mut() {
        creature.accumulate_fitness(dt, params.fitness_epsilon);

        let multiplier = if creature.output.actions.contains(Actions::MOVE) {
            params.move_drain_multiplier
        } else {
            1.0
        };
        creature.drain_energy(dt, params.energy_drain, multiplier);

        if !creature.is_alive() {
            pool.record(&creature.genome, creature.fitness)?;
            events.push(TickEvent::CreatureDied {
                creature: creature.entity,
                food_eaten: creature.food_eaten,
            });
            deaths += 1;
        }
    }
    Ok(deaths)
}
