//! Main ecosystem simulation.
//!
//! The ecosystem owns everything the tick pipeline needs: parameters, the
//! entity host, the random source, the spatial index, per-creature state and
//! the generation manager. It handles:
//! - Generation boundaries when the population is extinct
//! - The five per-tick stages in [`step`](super::step)
//! - Applying deferred entity changes between stages

use std::collections::HashSet;

use log::{debug, trace, warn};

use super::brain::BrainScratch;
use super::creature::CreatureState;
use super::error::ConfigError;
use super::events::{self, EventQueue};
use super::generation::{GenerationManager, GenerationPool, GenerationReport, GenerationState};
use super::host::{EntityHost, EntityId, FrameArgs, Template};
use super::params::Params;
use super::random::RandomSource;
use super::spatial::{IndexUsage, SpatialIndex};
use super::stats::GenerationStats;
use super::step;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The population was extinct; a new generation was bred and spawned.
    Reseeded(GenerationReport),
    /// The creatures were simulated.
    Stepped(StepSummary),
}

/// Counters for one simulated tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepSummary {
    /// Creatures alive at the start of the tick.
    pub creatures: usize,
    /// Food items eaten.
    pub food_eaten: usize,
    /// Creatures that died.
    pub deaths: usize,
    /// Replacement food items spawned for the dead.
    pub food_spawned: usize,
}

/// The main ecosystem containing all simulation state.
///
/// Generic over the entity host and the random source so the same pipeline
/// runs headless, in tests with scripted randomness, or behind an engine.
#[derive(Debug)]
pub struct Ecosystem<H: EntityHost, R: RandomSource> {
    /// Simulation parameters.
    pub params: Params,
    /// Entity storage.
    pub host: H,
    /// Source of all randomness.
    pub rng: R,
    /// Live creatures, in spawn order.
    pub creatures: Vec<CreatureState>,
    /// Rolling generation history.
    pub stats: GenerationStats,
    /// Total simulation time elapsed.
    pub time: f64,
    /// Ticks run so far, reseeding ticks included.
    pub ticks: u64,
    generations: GenerationManager,
    index: SpatialIndex,
    events: EventQueue,
    claimed_food: HashSet<EntityId>,
    scratch: BrainScratch,
}

impl<H: EntityHost, R: RandomSource> Ecosystem<H, R> {
    /// Creates an ecosystem whose first tick spawns a generation of random
    /// genomes.
    ///
    /// # Errors
    ///
    /// Returns the validation error if `params` are unusable.
    pub fn new(params: Params, host: H, mut rng: R) -> Result<Self, ConfigError> {
        params.validate()?;

        let points = if params.track_creatures {
            params.food_count + params.population
        } else {
            params.food_count
        };
        let cells = params.required_cell_capacity(points);
        let blocks = params.required_block_capacity(points);
        if params.cell_capacity < cells || params.block_capacity < blocks {
            warn!(
                "Spatial index may run out of room: {} cells / {} blocks configured, up to {} / {} needed for {} points",
                params.cell_capacity, params.block_capacity, cells, blocks, points
            );
        }

        let pool = GenerationPool::random(params.population, params.layer_sizes, &mut rng);
        debug!(
            "Ecosystem created: population {}, food {}, world {}x{}",
            params.population, params.food_count, params.world_width, params.world_height
        );

        Ok(Self {
            index: SpatialIndex::from_params(&params),
            scratch: BrainScratch::new(params.layer_sizes),
            events: EventQueue::with_capacity(params.population),
            claimed_food: HashSet::with_capacity(params.population),
            creatures: Vec::with_capacity(params.population),
            stats: GenerationStats::new(params.stats_history),
            generations: GenerationManager::new(pool),
            time: 0.0,
            ticks: 0,
            params,
            host,
            rng,
        })
    }

    /// Spawns the first generation right away instead of on the first tick.
    ///
    /// # Returns
    ///
    /// `None` if creatures are already alive.
    pub fn start(&mut self) -> Option<GenerationReport> {
        if self.host.any_alive(Template::Creature) {
            return None;
        }
        match self.tick(FrameArgs::default()) {
            TickOutcome::Reseeded(report) => Some(report),
            TickOutcome::Stepped(_) => None,
        }
    }

    /// Advances the simulation by one frame.
    ///
    /// If no creature is alive the tick is spent on a generation boundary
    /// instead of simulation.
    ///
    /// # Panics
    ///
    /// Panics when the spatial index or the generation pool runs out of room,
    /// or when a generation ends without every genome reported. These mean
    /// the capacities in [`Params`] do not match the population.
    pub fn tick(&mut self, frame: FrameArgs) -> TickOutcome {
        self.ticks += 1;
        self.time += frame.delta_time;

        let alive = self.host.any_alive(Template::Creature);
        if self.generations.poll(alive) == GenerationState::Reseeding {
            let report = self
                .generations
                .reseed(&mut self.host, &self.params, &mut self.rng, &mut self.creatures)
                .unwrap_or_else(|e| panic!("generation boundary failed: {e}"));
            self.stats.record(report);
            return TickOutcome::Reseeded(report);
        }

        TickOutcome::Stepped(self.step(frame.delta_time))
    }

    fn step(&mut self, dt: f64) -> StepSummary {
        let params = &self.params;
        let mut summary = StepSummary {
            creatures: self.creatures.len(),
            ..StepSummary::default()
        };

        step::rebuild_index(
            &mut self.index,
            &self.host,
            &mut self.creatures,
            params.track_creatures,
        )
        .unwrap_or_else(|e| panic!("spatial index rebuild failed: {e}"));
        trace!("Index rebuilt: {:?}", self.index.usage());

        summary.food_eaten = step::sense(
            &self.index,
            &mut self.creatures,
            params,
            &mut self.claimed_food,
            &mut self.events,
        );
        events::apply_events(&mut self.host, params, &mut self.rng, &mut self.events);

        step::think(&mut self.creatures, params, &mut self.scratch);
        step::act(&mut self.host, &self.creatures, params, dt);

        summary.deaths = step::account(
            &mut self.creatures,
            params,
            dt,
            self.generations.pool_mut(),
            &mut self.events,
        )
        .unwrap_or_else(|e| panic!("cull failed: {e}"));
        let applied = events::apply_events(&mut self.host, params, &mut self.rng, &mut self.events);
        summary.food_spawned = applied.food_spawned;
        self.creatures.retain(CreatureState::is_alive);

        if summary.deaths > 0 {
            debug!(
                "{} creatures died, {} left, pool {}/{}",
                summary.deaths,
                self.creatures.len(),
                self.generations.pool().len(),
                self.generations.pool().capacity()
            );
        }
        summary
    }

    /// Runs ticks of `dt` seconds until `generations` boundaries have passed
    /// or `max_ticks` ticks have run.
    ///
    /// # Returns
    ///
    /// The number of ticks run.
    pub fn run_generations(&mut self, generations: u32, max_ticks: u64, dt: f64) -> u64 {
        let target = self.generations.generation() + generations;
        let start = self.ticks;
        while self.ticks - start < max_ticks {
            let frame = FrameArgs {
                time: self.time,
                delta_time: dt,
            };
            if let TickOutcome::Reseeded(report) = self.tick(frame) {
                if report.generation >= target {
                    break;
                }
            }
        }
        self.ticks - start
    }

    /// Generations spawned so far.
    pub fn generation(&self) -> u32 {
        self.generations.generation()
    }

    /// Current generation state.
    pub fn state(&self) -> GenerationState {
        self.generations.state()
    }

    /// The generation pool being filled by the current generation.
    pub fn pool(&self) -> &GenerationPool {
        self.generations.pool()
    }

    /// The spatial index as of the last tick.
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Spatial index arena usage as of the last tick.
    pub fn index_usage(&self) -> IndexUsage {
        self.index.usage()
    }
}
