//! # Bestioles - Generational Artificial-Life Simulation
//!
//! A population of creatures ("bestioles") forages for food in a square world.
//! Each creature steers with a tiny neural network; when the whole population
//! has starved, the fittest half breeds the next generation.
//!
//! ## Features
//!
//! - Quad-tree spatial index with pooled, reusable storage
//! - Neural network brains (2-4-2 MLP with tanh activation)
//! - Genetic algorithm evolution (crossover and mutation)
//! - Deferred, two-phase entity creation and destruction
//! - Pluggable entity host and random source
//!
//! ## Core Modules
//!
//! - [`simulation::ecosystem`] - Context object and tick pipeline driver
//! - [`simulation::step`] - The five per-tick stages
//! - [`simulation::spatial`] - Nearest-of-type queries
//! - [`simulation::brain`] - Neural network implementation
//! - [`simulation::generation`] - Generation pool and breeding
//! - [`simulation::host`] - Entity host interface

/// Core simulation logic and data structures.
pub mod simulation {
    /// Neural network implementation for creature brains.
    pub mod brain;
    /// Per-creature state.
    pub mod creature;
    /// Main ecosystem simulation.
    pub mod ecosystem;
    /// Error types.
    pub mod error;
    /// Deferred entity changes.
    pub mod events;
    /// Food items that creatures can eat.
    pub mod food;
    /// Generation pool, breeding and the reseeding state machine.
    pub mod generation;
    /// Entity host interface and an in-memory implementation.
    ///
    /// The simulation reaches every entity through the [`host::EntityHost`]
    /// trait, so it can run headless or inside an engine.
    pub mod host;
    /// Simulation parameters.
    pub mod params;
    /// Injectable random source.
    pub mod random;
    /// Spatial index over tracked entities.
    pub mod spatial;
    /// Generation statistics tracking.
    pub mod stats;
    /// Per-tick pipeline stages.
    pub mod step;
}
