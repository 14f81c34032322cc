//! Per-creature mutable state.

use geo::Point;
use serde::{Deserialize, Serialize};

use super::brain::{BrainOutput, Genome};
use super::host::EntityId;

/// Offset to a sensed target in polar form.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Polar {
    /// Angle in radians, `atan2(dz, dx)`.
    pub angle: f32,
    /// Euclidean distance in the XZ plane.
    pub dist: f32,
}

/// A simulated creature ("bestiole").
///
/// Energy drains every tick and is restored by eating. Fitness only grows
/// while the creature is alive. When energy drops below zero the genome and
/// final fitness are handed to the generation pool and the state is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatureState {
    /// Host entity this state belongs to.
    pub entity: EntityId,
    /// Remaining energy. The creature dies once this is negative.
    pub energy: f32,
    /// Food items eaten so far.
    pub food_eaten: u32,
    /// Accumulated fitness.
    pub fitness: f64,
    /// Last sensed offset to the nearest food, zero if none was found.
    pub nearest_food: Polar,
    /// Position snapshot taken at the start of the current tick, as (x, z).
    pub cached_pos: Point<f32>,
    /// Brain outputs from the last think stage.
    pub output: BrainOutput,
    /// Network weights. Never modified while the creature lives.
    pub genome: Genome,
}

impl CreatureState {
    /// Creates a fresh creature with zeroed counters.
    pub fn new(entity: EntityId, genome: Genome, start_energy: f32, pos: Point<f32>) -> Self {
        Self {
            entity,
            energy: start_energy,
            food_eaten: 0,
            fitness: 0.0,
            nearest_food: Polar::default(),
            cached_pos: pos,
            output: BrainOutput::default(),
            genome,
        }
    }

    /// Checks if the creature is alive.
    ///
    /// # Returns
    ///
    /// `true` while energy is not negative.
    pub fn is_alive(&self) -> bool {
        self.energy >= 0.0
    }

    /// Credits one eaten food item.
    pub fn eat(&mut self, reward: f32) {
        self.energy += reward;
        self.food_eaten += 1;
    }

    /// Normalized network inputs: angle over π and distance over `distance_scale`.
    pub fn brain_inputs(&self, distance_scale: f32) -> [f32; 2] {
        [
            self.nearest_food.angle / std::f32::consts::PI,
            self.nearest_food.dist / distance_scale,
        ]
    }

    /// Adds this tick's fitness.
    ///
    /// Rewards being close to food and having eaten:
    /// `(1 / max(epsilon, dist) + food_eaten / 10) * dt`.
    pub fn accumulate_fitness(&mut self, dt: f64, epsilon: f32) {
        let proximity = 1.0 / f64::from(self.nearest_food.dist.max(epsilon));
        self.fitness += (proximity + f64::from(self.food_eaten) / 10.0) * dt;
    }

    /// Debits energy for `dt` seconds at `drain` per second times `multiplier`.
    pub fn drain_energy(&mut self, dt: f64, drain: f64, multiplier: f64) {
        self.energy = (f64::from(self.energy) - dt * drain * multiplier) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::random::SimRng;

    fn creature() -> CreatureState {
        let genome = Genome::new_random([2, 4, 2], &mut SimRng::seeded(0));
        CreatureState::new(EntityId(1), genome, 100.0, Point::new(0.0, 0.0))
    }

    #[test]
    fn fitness_uses_epsilon_floor() {
        let mut c = creature();
        c.accumulate_fitness(1.0, 0.001);
        assert!((c.fitness - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn fitness_rewards_eating() {
        let mut c = creature();
        c.nearest_food.dist = 2.0;
        c.eat(20.0);
        c.accumulate_fitness(0.5, 0.001);
        assert!((c.fitness - (0.5 + 0.1) * 0.5).abs() < 1e-9);
        assert!((c.energy - 120.0).abs() < f32::EPSILON);
    }

    #[test]
    fn drain_with_multiplier() {
        let mut c = creature();
        c.drain_energy(0.5, 5.0, 2.0);
        assert!((c.energy - 95.0).abs() < 1e-4);
        assert!(c.is_alive());

        c.drain_energy(10.0, 5.0, 2.0);
        assert!(!c.is_alive());
    }

    #[test]
    fn inputs_are_normalized() {
        let mut c = creature();
        c.nearest_food = Polar {
            angle: std::f32::consts::FRAC_PI_2,
            dist: 50.0,
        };
        let [angle, dist] = c.brain_inputs(100.0);
        assert!((angle - 0.5).abs() < 1e-6);
        assert!((dist - 0.5).abs() < 1e-6);
    }
}
