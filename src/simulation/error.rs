//! Error types for configuration and capacity failures.
//!
//! Configuration errors are recoverable at load time. Spatial index and
//! generation pool errors indicate a sizing bug; the tick pipeline treats them
//! as fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to load or validate [`Params`](super::params::Params).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path:?}: {source}")]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The configuration file is not valid JSON for `Params`.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field holds a value the simulation cannot run with.
    #[error("invalid parameter `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable constraint that was violated.
        reason: String,
    },
}

/// Capacity and bounds violations inside the spatial index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialError {
    /// No room left for four more cells during a split.
    #[error("cell pool exhausted ({capacity} cells)")]
    CellPoolExhausted {
        /// Configured cell capacity.
        capacity: usize,
    },
    /// The free block list is empty.
    #[error("block pool exhausted ({capacity} blocks)")]
    BlockPoolExhausted {
        /// Configured block capacity.
        capacity: usize,
    },
    /// A point lies on or outside the root rectangle.
    #[error("point ({x}, {z}) is not strictly inside the world")]
    OutOfBounds {
        /// World X coordinate.
        x: f32,
        /// World Z coordinate.
        z: f32,
    },
}

/// Bookkeeping violations in the generation pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// More deaths were recorded than the pool can hold.
    #[error("generation pool overflow: capacity {capacity}")]
    PoolOverflow {
        /// Pool capacity (starting population size).
        capacity: usize,
    },
    /// A generation ended before every creature reported its genome.
    #[error("generation pool holds {count} of {capacity} genomes")]
    PoolUnderfilled {
        /// Genomes recorded.
        count: usize,
        /// Genomes expected.
        capacity: usize,
    },
}
