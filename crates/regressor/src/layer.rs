//! Dense layer and its Adam optimizer state.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{RegressorError, Result};

/// Fully connected layer: `z = W a + b`.
///
/// Weights are stored row-major, one row per output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    pub(crate) inputs: usize,
    pub(crate) outputs: usize,
    pub(crate) weights: Vec<f64>,
    pub(crate) biases: Vec<f64>,
}

impl Dense {
    /// He-normal initialisation, biases at zero
    pub fn he_init<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Result<Self> {
        let std_dev = (2.0 / inputs.max(1) as f64).sqrt();
        let normal = Normal::new(0.0, std_dev)
            .map_err(|e| RegressorError::InvalidConfig(format!("weight init: {e}")))?;
        let weights = (0..inputs * outputs).map(|_| normal.sample(rng)).collect();
        Ok(Self {
            inputs,
            outputs,
            weights,
            biases: vec![0.0; outputs],
        })
    }

    /// Pre-activation output for one input vector
    pub fn forward(&self, input: &[f64], out: &mut Vec<f64>) {
        out.clear();
        out.extend(self.weights.chunks_exact(self.inputs).zip(&self.biases).map(
            |(row, bias)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias,
        ));
    }

    /// Accumulate parameter gradients for one sample and return the
    /// gradient with respect to the layer input.
    pub fn backward(
        &self,
        input: &[f64],
        delta: &[f64],
        grads: &mut Gradients,
        input_delta: &mut Vec<f64>,
    ) {
        input_delta.clear();
        input_delta.resize(self.inputs, 0.0);
        for (unit, d) in delta.iter().enumerate() {
            if *d == 0.0 {
                continue;
            }
            let row = unit * self.inputs;
            grads.biases[unit] += d;
            for (j, x) in input.iter().enumerate() {
                grads.weights[row + j] += d * x;
                input_delta[j] += d * self.weights[row + j];
            }
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

/// Gradient accumulator shaped like a [`Dense`] layer
#[derive(Debug, Clone)]
pub struct Gradients {
    pub weights: Vec<f64>,
    pub biases: Vec<f64>,
}

impl Gradients {
    pub fn zeros_like(layer: &Dense) -> Self {
        Self {
            weights: vec![0.0; layer.weights.len()],
            biases: vec![0.0; layer.biases.len()],
        }
    }

    pub fn reset(&mut self) {
        self.weights.fill(0.0);
        self.biases.fill(0.0);
    }
}

/// Adam hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamParams {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl AdamParams {
    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// First and second moment estimates for one layer
#[derive(Debug, Clone)]
pub struct AdamState {
    m: Gradients,
    v: Gradients,
}

impl AdamState {
    pub fn new(layer: &Dense) -> Self {
        Self {
            m: Gradients::zeros_like(layer),
            v: Gradients::zeros_like(layer),
        }
    }

    /// Apply one update. `step` is 1-based; `scale` divides the raw
    /// gradients (batch size).
    pub fn update(
        &mut self,
        layer: &mut Dense,
        grads: &Gradients,
        params: &AdamParams,
        step: u64,
        scale: f64,
    ) {
        let step = step as i32;
        let correction1 = 1.0 - params.beta1.powi(step);
        let correction2 = 1.0 - params.beta2.powi(step);

        let apply = |theta: &mut [f64], g: &[f64], m: &mut [f64], v: &mut [f64]| {
            for i in 0..theta.len() {
                let grad = g[i] / scale;
                m[i] = params.beta1 * m[i] + (1.0 - params.beta1) * grad;
                v[i] = params.beta2 * v[i] + (1.0 - params.beta2) * grad * grad;
                let m_hat = m[i] / correction1;
                let v_hat = v[i] / correction2;
                theta[i] -= params.learning_rate * m_hat / (v_hat.sqrt() + params.epsilon);
            }
        };
        apply(&mut layer.weights, &grads.weights, &mut self.m.weights, &mut self.v.weights);
        apply(&mut layer.biases, &grads.biases, &mut self.m.biases, &mut self.v.biases);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    fn fixed_layer() -> Dense {
        Dense {
            inputs: 2,
            outputs: 2,
            weights: vec![1.0, 2.0, -1.0, 0.5],
            biases: vec![0.5, 0.0],
        }
    }

    #[test]
    fn test_forward() {
        let mut out = Vec::new();
        fixed_layer().forward(&[1.0, 2.0], &mut out);
        assert_eq!(out, vec![5.5, 0.0]);
    }

    #[test]
    fn test_backward_accumulates() {
        let layer = fixed_layer();
        let mut grads = Gradients::zeros_like(&layer);
        let mut input_delta = Vec::new();
        layer.backward(&[1.0, 2.0], &[1.0, 0.0], &mut grads, &mut input_delta);
        assert_eq!(grads.weights, vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(grads.biases, vec![1.0, 0.0]);
        assert_eq!(input_delta, vec![1.0, 2.0]);
    }

    #[test]
    fn test_he_init_is_seeded() {
        let a = Dense::he_init(8, 4, &mut Pcg64Mcg::seed_from_u64(7)).unwrap();
        let b = Dense::he_init(8, 4, &mut Pcg64Mcg::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.parameter_count(), 36);
        assert!(a.biases.iter().all(|b| *b == 0.0));
    }

    #[test]
    fn test_adam_moves_against_gradient() {
        let mut layer = fixed_layer();
        let before = layer.weights[0];
        let mut state = AdamState::new(&layer);
        let mut grads = Gradients::zeros_like(&layer);
        grads.weights[0] = 4.0;
        state.update(&mut layer, &grads, &AdamParams::with_learning_rate(0.1), 1, 1.0);
        // First bias-corrected Adam step has magnitude ~learning_rate
        assert!((before - layer.weights[0] - 0.1).abs() < 1e-6);
        assert_eq!(layer.weights[1], 2.0);
    }
}
