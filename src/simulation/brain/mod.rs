//! Neural network implementation for creature brains.
//!
//! A fixed-topology two-layer perceptron (inputs → hidden → outputs) whose
//! weights form the genome, together with the genetic operators used when
//! breeding a new generation.

use std::f32::consts::PI;

use bitflags::bitflags;
use ndarray::{Array1, s};
use serde::{Deserialize, Serialize};

use super::random::RandomSource;

pub mod mlp;

pub use mlp::DenseLayer;

/// Bounded odd activation shared by both layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Activation {
    /// Hyperbolic tangent.
    #[default]
    Tanh,
    /// `x / (1 + |x|)`, a cheaper sigmoid-shaped alternative.
    Softsign,
}

impl Activation {
    /// Applies the activation to a single value.
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Softsign => x / (1.0 + x.abs()),
        }
    }
}

bitflags! {
    /// Actions a brain can request for the current tick.
    ///
    /// Only `MOVE` is ever produced; `CHOMP` and `MULTIPLY` are reserved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Actions: u32 {
        /// Walk forward along the steering angle.
        const MOVE = 1 << 0;
        /// Reserved.
        const CHOMP = 1 << 1;
        /// Reserved.
        const MULTIPLY = 1 << 2;
    }
}

/// Interpreted network outputs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BrainOutput {
    /// Steering angle in `(-π, π)`.
    pub steer_angle: f32,
    /// Requested actions.
    pub actions: Actions,
}

impl BrainOutput {
    /// Reads steering from output 0 and the move bit from output 1.
    pub fn from_outputs(outputs: &Array1<f32>) -> Self {
        let mut actions = Actions::empty();
        actions.set(Actions::MOVE, outputs[1] > 0.0);
        Self {
            steer_angle: outputs[0] * PI,
            actions,
        }
    }
}

/// The weights defining one creature's behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// Input-to-hidden weights, bias column included.
    pub w0: DenseLayer,
    /// Hidden-to-output weights, bias column included.
    pub w1: DenseLayer,
}

/// Reusable activation buffers so evaluation does not allocate per tick.
#[derive(Debug, Clone)]
pub struct BrainScratch {
    input: Array1<f32>,
    hidden: Array1<f32>,
    output: Array1<f32>,
}

impl BrainScratch {
    /// Allocates buffers for the given layer sizes.
    pub fn new(layer_sizes: [usize; 3]) -> Self {
        let [inputs, hidden, outputs] = layer_sizes;
        Self {
            input: Array1::zeros(inputs + 1),
            hidden: Array1::zeros(hidden + 1),
            output: Array1::zeros(outputs),
        }
    }
}

impl Genome {
    /// Creates a genome with weights drawn uniformly from `[-1, 1)`.
    pub fn new_random(layer_sizes: [usize; 3], rng: &mut impl RandomSource) -> Self {
        let [inputs, hidden, outputs] = layer_sizes;
        Self {
            w0: DenseLayer::new_random(inputs, hidden, rng),
            w1: DenseLayer::new_random(hidden, outputs, rng),
        }
    }

    /// Layer sizes as (inputs, hidden, outputs), bias units excluded.
    pub fn layer_sizes(&self) -> [usize; 3] {
        [self.w0.inputs(), self.w0.outputs(), self.w1.outputs()]
    }

    /// Runs a forward pass and returns the raw outputs.
    pub fn evaluate(&self, inputs: &[f32], activation: Activation) -> Array1<f32> {
        let mut scratch = BrainScratch::new(self.layer_sizes());
        self.evaluate_into(inputs, activation, &mut scratch).clone()
    }

    /// Runs a forward pass using preallocated buffers.
    ///
    /// `inputs` excludes the bias; a trailing 1.0 is appended for both layers.
    #[inline]
    pub fn evaluate_into<'a>(
        &self,
        inputs: &[f32],
        activation: Activation,
        scratch: &'a mut BrainScratch,
    ) -> &'a Array1<f32> {
        let n_in = inputs.len();
        let n_hidden = self.w0.outputs();

        scratch
            .input
            .slice_mut(s![..n_in])
            .assign(&ndarray::aview1(inputs));
        scratch.input[n_in] = 1.0;

        self.w0.forward_into(
            &scratch.input,
            activation,
            scratch.hidden.slice_mut(s![..n_hidden]),
        );
        scratch.hidden[n_hidden] = 1.0;

        self.w1
            .forward_into(&scratch.hidden, activation, scratch.output.view_mut());
        &scratch.output
    }

    /// Creates a child by mixing both layers of two parents independently.
    pub fn crossover(parent1: &Genome, parent2: &Genome, rng: &mut impl RandomSource) -> Self {
        Self {
            w0: DenseLayer::crossover(&parent1.w0, &parent2.w0, rng),
            w1: DenseLayer::crossover(&parent1.w1, &parent2.w1, rng),
        }
    }

    /// Mutates both layers. Returns the number of weights changed.
    pub fn mutate(
        &mut self,
        reset_rate: f32,
        perturb_rate: f32,
        amplitude: f32,
        rng: &mut impl RandomSource,
    ) -> usize {
        self.w0.mutate(reset_rate, perturb_rate, amplitude, rng)
            + self.w1.mutate(reset_rate, perturb_rate, amplitude, rng)
    }

    /// Flattens all weights, `w0` first, in row-major order.
    pub fn to_flat_vector(&self) -> Vec<f32> {
        self.w0
            .weights
            .iter()
            .chain(self.w1.weights.iter())
            .copied()
            .collect()
    }
}
