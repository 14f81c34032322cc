//! Dense layer with the bias folded into the weight matrix.

use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array1, Array2, ArrayViewMut1, Zip};
use serde::{Deserialize, Serialize};

use super::super::random::RandomSource;
use super::Activation;

/// A fully connected layer.
///
/// `weights` has shape (`outputs`, `inputs + 1`); the last column multiplies
/// a constant bias input of 1.0. Row-major storage makes the flat index of
/// weight (o, i) equal to `(inputs + 1) * o + i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weight matrix (`outputs` × `inputs + 1`).
    pub weights: Array2<f32>,
}

impl DenseLayer {
    /// Creates a layer with weights drawn uniformly from `[-1, 1)`.
    pub fn new_random(inputs: usize, outputs: usize, rng: &mut impl RandomSource) -> Self {
        Self {
            weights: Array2::from_shape_simple_fn((outputs, inputs + 1), || rng.float(-1.0, 1.0)),
        }
    }

    /// Number of inputs, bias excluded.
    pub fn inputs(&self) -> usize {
        self.weights.ncols() - 1
    }

    /// Number of outputs.
    pub fn outputs(&self) -> usize {
        self.weights.nrows()
    }

    /// Writes `activation(weights · inputs)` into `out`.
    ///
    /// `inputs` must already end with the bias term.
    #[inline]
    pub fn forward_into(
        &self,
        inputs: &Array1<f32>,
        activation: Activation,
        mut out: ArrayViewMut1<'_, f32>,
    ) {
        general_mat_vec_mul(1.0, &self.weights, inputs, 0.0, &mut out);
        out.mapv_inplace(|x| activation.apply(x));
    }

    /// Mixes two parent layers weight by weight.
    ///
    /// Each weight independently takes parent 1's value, parent 2's value, or
    /// a uniformly blended value, with equal probability.
    pub fn crossover(parent1: &Self, parent2: &Self, rng: &mut impl RandomSource) -> Self {
        let mut weights = parent1.weights.clone();
        Zip::from(&mut weights)
            .and(&parent2.weights)
            .for_each(|w, &other| match rng.uint(0, 2) {
                0 => {}
                1 => *w = other,
                _ => {
                    let t = rng.float(0.0, 1.0);
                    *w += (other - *w) * t;
                }
            });
        Self { weights }
    }

    /// Resets or perturbs individual weights. Returns how many changed.
    ///
    /// A uniform draw below `reset_rate` replaces the weight with a fresh value
    /// in `[-1, 1)`; otherwise a draw below `perturb_rate` adds noise in
    /// `[-amplitude, amplitude)`.
    pub fn mutate(
        &mut self,
        reset_rate: f32,
        perturb_rate: f32,
        amplitude: f32,
        rng: &mut impl RandomSource,
    ) -> usize {
        let mut mutations = 0;
        for w in &mut self.weights {
            let f = rng.float(0.0, 1.0);
            if f < reset_rate {
                *w = rng.float(-1.0, 1.0);
                mutations += 1;
            } else if f < perturb_rate {
                *w += rng.float(-amplitude, amplitude);
                mutations += 1;
            }
        }
        mutations
    }
}
