//! Uniform random source injected into every stochastic operation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform random numbers with the range conventions the simulation relies on.
pub trait RandomSource {
    /// Uniform float in `[min, max)`. Returns `min` when the range is empty.
    fn float(&mut self, min: f32, max: f32) -> f32;

    /// Uniform integer in `[min, max]`, both ends inclusive.
    fn uint(&mut self, min: u32, max: u32) -> u32;
}

/// Default random source backed by [`StdRng`].
#[derive(Debug, Clone)]
pub struct SimRng {
    rng: StdRng,
}

impl SimRng {
    /// Creates a reproducible source from a seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a source seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl RandomSource for SimRng {
    fn float(&mut self, min: f32, max: f32) -> f32 {
        if min < max {
            self.rng.random_range(min..max)
        } else {
            min
        }
    }

    fn uint(&mut self, min: u32, max: u32) -> u32 {
        if min < max {
            self.rng.random_range(min..=max)
        } else {
            min
        }
    }
}
