//! Generational evolution.
//!
//! Every creature hands its genome and final fitness to the [`GenerationPool`]
//! when it dies. Once the whole population is gone the [`GenerationManager`]
//! sorts the pool, replaces the bottom half with children bred from the top
//! half, mutates a random share of individuals and respawns the population.

use geo::Point;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::brain::Genome;
use super::creature::CreatureState;
use super::error::GenerationError;
use super::food;
use super::host::{EntityHost, Template};
use super::params::Params;
use super::random::RandomSource;

/// One recorded death.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolEntry {
    /// Genome the creature lived with.
    pub genome: Genome,
    /// Fitness accumulated over its lifetime.
    pub fitness: f64,
}

/// Fixed-capacity record of the current generation's genomes.
#[derive(Debug, Clone)]
pub struct GenerationPool {
    entries: Vec<PoolEntry>,
    capacity: usize,
}

impl GenerationPool {
    /// Creates an empty pool for `capacity` creatures.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Creates a full pool of random genomes with zero fitness.
    pub fn random(capacity: usize, layer_sizes: [usize; 3], rng: &mut impl RandomSource) -> Self {
        let mut pool = Self::new(capacity);
        pool.entries.extend((0..capacity).map(|_| PoolEntry {
            genome: Genome::new_random(layer_sizes, rng),
            fitness: 0.0,
        }));
        pool
    }

    /// Appends a genome and its fitness.
    ///
    /// # Errors
    ///
    /// [`GenerationError::PoolOverflow`] if the pool is already full.
    pub fn record(&mut self, genome: &Genome, fitness: f64) -> Result<(), GenerationError> {
        if self.is_full() {
            return Err(GenerationError::PoolOverflow {
                capacity: self.capacity,
            });
        }
        self.entries.push(PoolEntry {
            genome: genome.clone(),
            fitness,
        });
        Ok(())
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every creature of the generation has been recorded.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Recorded entries in recording order (or fitness order right after breeding).
    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }
}

/// Lifecycle of the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenerationState {
    /// Creatures are alive and ticking.
    Running,
    /// The population is extinct; the next tick breeds and respawns.
    #[default]
    Reseeding,
}

/// Summary of one generation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Number of the generation that was just spawned, starting at 1.
    pub generation: u32,
    /// Mean fitness of the finished generation.
    pub avg_fitness: f64,
    /// Best fitness of the finished generation.
    pub best_fitness: f64,
    /// Children bred to replace the bottom half.
    pub children: usize,
    /// Individuals selected for mutation.
    pub mutated_individuals: usize,
    /// Weights changed by mutation, summed over all individuals.
    pub mutations: usize,
}

/// Drives the Running/Reseeding cycle and owns the generation pool.
#[derive(Debug, Clone)]
pub struct GenerationManager {
    state: GenerationState,
    generation: u32,
    pool: GenerationPool,
}

impl GenerationManager {
    /// Creates a manager that will breed from `pool` on the first tick.
    pub fn new(pool: GenerationPool) -> Self {
        Self {
            state: GenerationState::Reseeding,
            generation: 0,
            pool,
        }
    }

    /// Current state.
    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Number of generations spawned so far.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The pool being filled by the current generation.
    pub fn pool(&self) -> &GenerationPool {
        &self.pool
    }

    /// Mutable access to the pool, used by the cull stage.
    pub fn pool_mut(&mut self) -> &mut GenerationPool {
        &mut self.pool
    }

    /// Switches to reseeding once the host reports no live creatures.
    pub fn poll(&mut self, creatures_alive: bool) -> GenerationState {
        if !creatures_alive {
            self.state = GenerationState::Reseeding;
        }
        self.state
    }

    /// Produces the genomes of the next generation from a full pool.
    ///
    /// The pool is sorted by fitness, highest first. Each slot of the bottom
    /// half is overwritten by a child of two parents drawn uniformly from the
    /// top half. Every individual is then mutated with probability
    /// `individual_mutation_chance`. The pool is left empty.
    ///
    /// # Errors
    ///
    /// [`GenerationError::PoolUnderfilled`] if some creature never reported.
    pub fn breed(
        &mut self,
        params: &Params,
        rng: &mut impl RandomSource,
    ) -> Result<(Vec<Genome>, GenerationReport), GenerationError> {
        if !self.pool.is_full() {
            return Err(GenerationError::PoolUnderfilled {
                count: self.pool.len(),
                capacity: self.pool.capacity,
            });
        }

        let entries = &mut self.pool.entries;
        entries.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let n = entries.len();
        let best_fitness = entries.first().map_or(0.0, |e| e.fitness);
        let avg_fitness = entries.iter().map(|e| e.fitness).sum::<f64>() / n as f64;

        let top = n / 2;
        let last_parent = top.saturating_sub(1) as u32;
        for i in top..n {
            let a = rng.uint(0, last_parent) as usize;
            let b = rng.uint(0, last_parent) as usize;
            let child = Genome::crossover(&entries[a].genome, &entries[b].genome, rng);
            entries[i].genome = child;
        }

        let mut mutated_individuals = 0;
        let mut mutations = 0;
        for entry in entries.iter_mut() {
            if rng.float(0.0, 1.0) < params.individual_mutation_chance {
                mutated_individuals += 1;
                mutations += entry.genome.mutate(
                    params.mutation_reset_rate,
                    params.mutation_perturb_rate,
                    params.mutation_amplitude,
                    rng,
                );
            }
        }

        let genomes = entries.drain(..).map(|e| e.genome).collect();
        self.generation += 1;

        let report = GenerationReport {
            generation: self.generation,
            avg_fitness,
            best_fitness,
            children: n - top,
            mutated_individuals,
            mutations,
        };
        Ok((genomes, report))
    }

    /// Runs a full generation boundary.
    ///
    /// Breeds the next genomes, replaces all food with a fresh
    /// `food_count` items and spawns one creature per genome at the spawn
    /// point. `creatures` is replaced by the new population.
    pub fn reseed<H: EntityHost>(
        &mut self,
        host: &mut H,
        params: &Params,
        rng: &mut impl RandomSource,
        creatures: &mut Vec<CreatureState>,
    ) -> Result<GenerationReport, GenerationError> {
        let (genomes, report) = self.breed(params, rng)?;

        let stale_food = host.entities(Template::Food);
        let stale_creatures = host.entities(Template::Creature);
        debug!(
            "Reseeding: clearing {} food and {} creature entities",
            stale_food.len(),
            stale_creatures.len()
        );
        host.queue_destroy(&stale_food);
        host.queue_destroy(&stale_creatures);
        host.flush_destroyed();

        food::spawn_food(host, params, rng, params.food_count);

        let spawn = Point::new(params.spawn_point[0], params.spawn_point[1]);
        let ids = host.create_batch(Template::Creature, genomes.len());
        creatures.clear();
        for (entity, genome) in ids.into_iter().zip(genomes) {
            host.set_position(entity, spawn);
            host.set_heading(entity, 0.0);
            creatures.push(CreatureState::new(entity, genome, params.start_energy, spawn));
        }

        self.state = GenerationState::Running;
        info!(
            "Generation {}: fitness(avg={:.3} best={:.3}) mutations={} ({} individuals)",
            report.generation,
            report.avg_fitness,
            report.best_fitness,
            report.mutations,
            report.mutated_individuals
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::random::SimRng;

    #[test]
    fn pool_rejects_overflow() {
        let mut rng = SimRng::seeded(0);
        let genome = Genome::new_random([2, 4, 2], &mut rng);
        let mut pool = GenerationPool::new(2);

        assert!(pool.record(&genome, 1.0).is_ok());
        assert!(pool.record(&genome, 2.0).is_ok());
        assert!(pool.is_full());
        assert_eq!(
            pool.record(&genome, 3.0),
            Err(GenerationError::PoolOverflow { capacity: 2 })
        );
    }

    #[test]
    fn breeding_requires_a_full_pool() {
        let mut rng = SimRng::seeded(0);
        let genome = Genome::new_random([2, 4, 2], &mut rng);
        let mut pool = GenerationPool::new(3);
        pool.record(&genome, 1.0).unwrap();

        let mut manager = GenerationManager::new(pool);
        let err = manager.breed(&Params::default(), &mut rng).unwrap_err();
        assert_eq!(
            err,
            GenerationError::PoolUnderfilled {
                count: 1,
                capacity: 3
            }
        );
        assert_eq!(manager.generation(), 0);
    }

    #[test]
    fn poll_enters_reseeding_on_extinction() {
        let mut manager = GenerationManager::new(GenerationPool::new(2));
        manager.state = GenerationState::Running;
        assert_eq!(manager.poll(true), GenerationState::Running);
        assert_eq!(manager.poll(false), GenerationState::Reseeding);
    }

    #[test]
    fn report_summarizes_the_finished_generation() {
        let mut rng = SimRng::seeded(4);
        let mut pool = GenerationPool::new(4);
        for fitness in [1.0, 4.0, 2.0, 3.0] {
            pool.record(&Genome::new_random([2, 4, 2], &mut rng), fitness)
                .unwrap();
        }
        let params = Params {
            individual_mutation_chance: 0.0,
            ..Params::default()
        };

        let mut manager = GenerationManager::new(pool);
        let (genomes, report) = manager.breed(&params, &mut rng).unwrap();

        assert_eq!(genomes.len(), 4);
        assert!(manager.pool().is_empty());
        assert_eq!(report.generation, 1);
        assert_eq!(report.children, 2);
        assert_eq!(report.mutations, 0);
        assert!((report.avg_fitness - 2.5).abs() < 1e-12);
        assert!((report.best_fitness - 4.0).abs() < 1e-12);
    }
}
