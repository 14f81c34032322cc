use std::path::Path;

use serde::{Deserialize, Serialize};

use super::brain::Activation;
use super::error::ConfigError;

/// Simulation parameters that control world, population and evolution behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// World width along X. The world is centered at the origin.
    pub world_width: f32,
    /// World height along Z.
    pub world_height: f32,
    /// Creatures spawned per generation. Also the generation pool capacity.
    pub population: usize,
    /// Target food item count.
    pub food_count: usize,
    /// Inset from the world edge for spawning and movement clamping.
    pub spawn_margin: f32,
    /// Where each new generation is spawned, as (x, z).
    pub spawn_point: [f32; 2],

    /// Maximum cells in the spatial index arena.
    pub cell_capacity: usize,
    /// Maximum point blocks in the spatial index arena.
    pub block_capacity: usize,
    /// Points per block; a leaf splits when its block fills up.
    pub block_entity_capacity: usize,
    /// Depth beyond which leaves chain blocks instead of splitting.
    pub depth_max: u32,
    /// Whether creatures are inserted into the spatial index next to food.
    /// Off by default: only food is ever queried.
    pub track_creatures: bool,

    /// Energy each creature starts with.
    pub start_energy: f32,
    /// Energy drained per second.
    pub energy_drain: f64,
    /// Drain multiplier while the move action is set.
    pub move_drain_multiplier: f64,
    /// Movement speed in world units per second.
    pub speed: f32,
    /// Distance under which a creature eats the food it senses.
    pub eat_radius: f32,
    /// Energy gained per food item.
    pub eat_reward: f32,
    /// Divisor applied to the sensed food distance before it reaches the brain.
    pub distance_scale: f32,
    /// Lower bound on the distance used in the proximity fitness term.
    pub fitness_epsilon: f32,

    /// Input, hidden and output layer sizes (bias units excluded).
    pub layer_sizes: [usize; 3],
    /// Activation used by both brain layers.
    pub activation: Activation,
    /// Per-weight probability of replacing a weight during mutation.
    pub mutation_reset_rate: f32,
    /// Per-weight probability (cumulative) of perturbing a weight during mutation.
    pub mutation_perturb_rate: f32,
    /// Half-width of the uniform perturbation added to a weight.
    pub mutation_amplitude: f32,
    /// Probability that an individual of the new generation is mutated at all.
    pub individual_mutation_chance: f32,

    /// Visual scale range for spawned food, `[min, max)`.
    pub food_scale: [f32; 2],
    /// Number of generation reports kept for the summary.
    pub stats_history: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            world_width: 1000.0,
            world_height: 1000.0,
            population: 1000,
            food_count: 5000,
            spawn_margin: 10.0,
            spawn_point: [0.0, 0.0],

            cell_capacity: 4096,
            block_capacity: 8192,
            block_entity_capacity: 64,
            depth_max: 6,
            track_creatures: false,

            start_energy: 100.0,
            energy_drain: 5.0,
            move_drain_multiplier: 2.0,
            speed: 5.0,
            eat_radius: 0.8,
            eat_reward: 20.0,
            distance_scale: 100.0,
            fitness_epsilon: 0.001,

            layer_sizes: [2, 4, 2],
            activation: Activation::Tanh,
            mutation_reset_rate: 0.005,
            mutation_perturb_rate: 0.05,
            mutation_amplitude: 0.1,
            individual_mutation_chance: 0.1,

            food_scale: [0.3, 0.5],
            stats_history: 100,
        }
    }
}

impl Params {
    /// Loads parameters from a JSON file. Missing fields take their default value.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let params: Self = serde_json::from_str(&json)?;
        params.validate()?;
        Ok(params)
    }

    /// Checks that the parameters describe a runnable simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_width <= 0.0 || self.world_height <= 0.0 {
            return Err(invalid("world_width", "world must have a positive size"));
        }
        if self.spawn_margin <= 0.0
            || self.spawn_margin * 2.0 >= self.world_width.min(self.world_height)
        {
            return Err(invalid(
                "spawn_margin",
                "margin must be positive and leave room inside the world",
            ));
        }
        let [sx, sz] = self.spawn_point;
        if sx.abs() >= self.world_width / 2.0 - self.spawn_margin
            || sz.abs() >= self.world_height / 2.0 - self.spawn_margin
        {
            return Err(invalid("spawn_point", "spawn point must lie inside the margin"));
        }
        if self.population < 2 {
            return Err(invalid("population", "breeding needs at least two creatures"));
        }
        if self.cell_capacity == 0 {
            return Err(invalid("cell_capacity", "the root cell needs a slot"));
        }
        if self.block_entity_capacity == 0 {
            return Err(invalid("block_entity_capacity", "blocks must hold points"));
        }
        if self.block_capacity == 0 {
            return Err(invalid("block_capacity", "the index needs at least one block"));
        }
        if !(0.0..=1.0).contains(&self.individual_mutation_chance) {
            return Err(invalid(
                "individual_mutation_chance",
                "must be a probability",
            ));
        }
        if self.eat_radius < 0.0 || self.distance_scale <= 0.0 || self.fitness_epsilon <= 0.0 {
            return Err(invalid(
                "distance_scale",
                "distances must scale by a positive factor with a positive epsilon",
            ));
        }
        if self.layer_sizes.contains(&0) {
            return Err(invalid("layer_sizes", "every layer needs at least one unit"));
        }
        if self.layer_sizes[0] != 2 || self.layer_sizes[2] < 2 {
            return Err(invalid(
                "layer_sizes",
                "brains read (angle, distance) and emit at least (steer, move)",
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_reset_rate)
            || !(0.0..=1.0).contains(&self.mutation_perturb_rate)
            || self.mutation_reset_rate > self.mutation_perturb_rate
        {
            return Err(invalid(
                "mutation_reset_rate",
                "rates must be probabilities with reset <= perturb",
            ));
        }
        if self.food_scale[0] > self.food_scale[1] {
            return Err(invalid("food_scale", "min must not exceed max"));
        }
        Ok(())
    }

    /// Upper bound on cells needed to index `points` tracked points.
    ///
    /// Every internal node held at least one full block when it split, so each
    /// depth level has at most `ceil(points / block_entity_capacity)` internal
    /// nodes. The bound is also capped by a complete tree of depth `depth_max`.
    pub fn required_cell_capacity(&self, points: usize) -> usize {
        let full_blocks = points.div_ceil(self.block_entity_capacity);
        let by_points = 1 + 4 * self.depth_max as usize * full_blocks;
        let full_tree = (4usize.saturating_pow(self.depth_max + 1) - 1) / 3;
        by_points.min(full_tree)
    }

    /// Upper bound on blocks needed to index `points` tracked points.
    ///
    /// Each leaf wastes at most one partially filled block.
    pub fn required_block_capacity(&self, points: usize) -> usize {
        self.required_cell_capacity(points) + points.div_ceil(self.block_entity_capacity)
    }

    /// Half extents of the world as (x, z).
    pub fn half_extents(&self) -> (f32, f32) {
        (self.world_width / 2.0, self.world_height / 2.0)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}
