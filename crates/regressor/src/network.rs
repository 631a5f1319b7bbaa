//! In-process feed-forward regression network.
//!
//! ## Architecture
//! `input -> [Dense -> ReLU] x hidden.len() -> Dense(1)` trained on mean
//! squared error with Adam.
//!
//! ## Algorithm
//! For each epoch, rows are visited in their given order (no shuffling) in
//! mini-batches. Gradients are accumulated per sample by backpropagation,
//! averaged over the batch and applied with one Adam step. After every epoch
//! the train MSE and, if a validation set was supplied, validation MSE/MAE
//! are recorded. Initialisation is He-normal from a seeded PCG stream, so the
//! same data and config always produce the same weights.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{RegressorError, Result};
use crate::layer::{AdamParams, AdamState, Dense, Gradients};
use crate::metrics::{mae, mse, EpochMetrics, TrainingHistory};
use crate::traits::{Dataset, Regressor};

/// Hyper-parameters for [`FeedForwardRegressor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorConfig {
    /// Widths of the hidden layers, input side first
    pub hidden: Vec<usize>,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    /// Seed for weight initialisation
    pub seed: u64,
}

impl Default for RegressorConfig {
    fn default() -> Self {
        Self {
            hidden: vec![128, 64, 32],
            learning_rate: 1e-3,
            batch_size: 32,
            epochs: 50,
            seed: 42,
        }
    }
}

impl RegressorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hidden(mut self, hidden: Vec<usize>) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.hidden.iter().any(|w| *w == 0) {
            return Err(RegressorError::InvalidConfig(
                "hidden layer widths must be positive".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(RegressorError::InvalidConfig(
                "batch size must be positive".into(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(RegressorError::InvalidConfig(format!(
                "learning rate {} must be positive",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Multi-layer perceptron regressor.
///
/// Serializable: the layers hold everything needed to predict, so a fitted
/// network written with serde can be loaded and used directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedForwardRegressor {
    config: RegressorConfig,
    layers: Vec<Dense>,
}

/// Per-sample activations kept for backpropagation
struct Trace {
    /// `activations[0]` is the input; `activations[l + 1]` is the output of layer `l`
    activations: Vec<Vec<f64>>,
}

impl FeedForwardRegressor {
    pub fn new(config: RegressorConfig) -> Self {
        Self {
            config,
            layers: Vec::new(),
        }
    }

    pub fn config(&self) -> &RegressorConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        !self.layers.is_empty()
    }

    /// Total number of trainable parameters (0 before fitting)
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Dense::parameter_count).sum()
    }

    /// Check that every layer's parameters match its declared shape, that
    /// widths chain between layers, and that the network ends in one output.
    ///
    /// A network loaded from disk has only been through serde; this is what
    /// makes it safe to run.
    pub fn check_layers(&self) -> Result<()> {
        let malformed = |layer: usize, reason: String| RegressorError::MalformedLayer { layer, reason };
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.inputs == 0 || layer.outputs == 0 {
                return Err(malformed(
                    idx,
                    format!("zero width ({} -> {})", layer.inputs, layer.outputs),
                ));
            }
            if layer.weights.len() != layer.inputs * layer.outputs {
                return Err(malformed(
                    idx,
                    format!(
                        "{} weights for a {} x {} layer",
                        layer.weights.len(),
                        layer.inputs,
                        layer.outputs
                    ),
                ));
            }
            if layer.biases.len() != layer.outputs {
                return Err(malformed(
                    idx,
                    format!("{} biases for {} outputs", layer.biases.len(), layer.outputs),
                ));
            }
            if idx > 0 && self.layers[idx - 1].outputs != layer.inputs {
                return Err(malformed(
                    idx,
                    format!(
                        "takes {} inputs but the previous layer has {} outputs",
                        layer.inputs,
                        self.layers[idx - 1].outputs
                    ),
                ));
            }
        }
        match self.layers.last() {
            Some(last) if last.outputs != 1 => Err(malformed(
                self.layers.len() - 1,
                format!("{} outputs, expected 1", last.outputs),
            )),
            _ => Ok(()),
        }
    }

    fn build(&mut self, input_dim: usize) -> Result<()> {
        let mut rng = Pcg64Mcg::seed_from_u64(self.config.seed);
        let mut widths = Vec::with_capacity(self.config.hidden.len() + 2);
        widths.push(input_dim);
        widths.extend(self.config.hidden.iter().copied());
        widths.push(1);

        self.layers = widths
            .windows(2)
            .map(|pair| Dense::he_init(pair[0], pair[1], &mut rng))
            .collect::<Result<_>>()?;
        info!(
            "Built network {:?} with {} parameters",
            widths,
            self.parameter_count()
        );
        Ok(())
    }

    /// Forward pass keeping every activation
    fn forward_trace(&self, input: &[f64]) -> Trace {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());
        let last = self.layers.len() - 1;
        for (idx, layer) in self.layers.iter().enumerate() {
            let mut out = Vec::with_capacity(layer.outputs);
            layer.forward(&activations[idx], &mut out);
            if idx != last {
                relu_in_place(&mut out);
            }
            activations.push(out);
        }
        Trace { activations }
    }

    fn predict_one(&self, input: &[f64]) -> f64 {
        let mut current = input.to_vec();
        let mut next = Vec::new();
        let last = self.layers.len() - 1;
        for (idx, layer) in self.layers.iter().enumerate() {
            layer.forward(&current, &mut next);
            if idx != last {
                relu_in_place(&mut next);
            }
            std::mem::swap(&mut current, &mut next);
        }
        // check_layers guarantees exactly one output
        current[0]
    }

    /// Backpropagate squared error for one sample into `grads`
    fn accumulate(&self, trace: &Trace, target: f64, grads: &mut [Gradients]) {
        let output = trace.activations[self.layers.len()][0];
        let mut delta = vec![2.0 * (output - target)];
        let mut input_delta = Vec::new();

        for idx in (0..self.layers.len()).rev() {
            let layer_input = &trace.activations[idx];
            self.layers[idx].backward(layer_input, &delta, &mut grads[idx], &mut input_delta);
            if idx > 0 {
                // ReLU derivative of the previous layer's output
                for (d, a) in input_delta.iter_mut().zip(layer_input) {
                    if *a <= 0.0 {
                        *d = 0.0;
                    }
                }
                std::mem::swap(&mut delta, &mut input_delta);
            }
        }
    }

    fn check_rows(&self, x: &[Vec<f64>]) -> Result<()> {
        if let Some(expected) = self.input_dim() {
            if let Some(bad) = x.iter().find(|row| row.len() != expected) {
                return Err(RegressorError::DimensionMismatch {
                    expected,
                    got: bad.len(),
                });
            }
        }
        Ok(())
    }
}

fn relu_in_place(values: &mut [f64]) {
    for v in values {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}

fn check_dataset(data: &Dataset<'_>) -> Result<usize> {
    if data.x.len() != data.y.len() {
        return Err(RegressorError::LengthMismatch {
            rows: data.x.len(),
            targets: data.y.len(),
        });
    }
    let width = data
        .x
        .first()
        .map(Vec::len)
        .ok_or_else(|| RegressorError::EmptyData("no training rows".into()))?;
    if let Some(bad) = data.x.iter().find(|row| row.len() != width) {
        return Err(RegressorError::DimensionMismatch {
            expected: width,
            got: bad.len(),
        });
    }
    Ok(width)
}

impl Regressor for FeedForwardRegressor {
    #[instrument(skip_all, fields(rows = train.x.len(), epochs = self.config.epochs))]
    fn fit(&mut self, train: Dataset<'_>, validation: Option<Dataset<'_>>) -> Result<TrainingHistory> {
        self.config.validate()?;
        let input_dim = check_dataset(&train)?;
        if let Some(val) = &validation {
            if val.x.len() != val.y.len() {
                return Err(RegressorError::LengthMismatch {
                    rows: val.x.len(),
                    targets: val.y.len(),
                });
            }
            if let Some(bad) = val.x.iter().find(|row| row.len() != input_dim) {
                return Err(RegressorError::DimensionMismatch {
                    expected: input_dim,
                    got: bad.len(),
                });
            }
        }

        self.build(input_dim)?;
        let params = AdamParams::with_learning_rate(self.config.learning_rate);
        let mut optimizers: Vec<AdamState> = self.layers.iter().map(AdamState::new).collect();
        let mut grads: Vec<Gradients> = self.layers.iter().map(Gradients::zeros_like).collect();
        let mut step: u64 = 0;
        let mut history = TrainingHistory::default();

        for epoch in 1..=self.config.epochs {
            for (rows, targets) in train
                .x
                .chunks(self.config.batch_size)
                .zip(train.y.chunks(self.config.batch_size))
            {
                grads.iter_mut().for_each(Gradients::reset);
                for (row, target) in rows.iter().zip(targets) {
                    let trace = self.forward_trace(row);
                    self.accumulate(&trace, *target, &mut grads);
                }
                step += 1;
                let scale = rows.len() as f64;
                for ((layer, state), g) in self.layers.iter_mut().zip(&mut optimizers).zip(&grads) {
                    state.update(layer, g, &params, step, scale);
                }
            }

            let train_mse = mse(&self.predict(train.x)?, train.y);
            if !train_mse.is_finite() {
                return Err(RegressorError::Diverged { epoch });
            }
            let (val_mse, val_mae) = match &validation {
                Some(val) if !val.x.is_empty() => {
                    let predicted = self.predict(val.x)?;
                    (Some(mse(&predicted, val.y)), Some(mae(&predicted, val.y)))
                }
                _ => (None, None),
            };
            debug!(
                "Epoch {}/{}: train_mse={:.6} val_mse={:?}",
                epoch, self.config.epochs, train_mse, val_mse
            );
            history.push(EpochMetrics {
                epoch,
                train_mse,
                val_mse,
                val_mae,
            });
        }

        if let Some(last) = history.last() {
            info!(
                "Training finished after {} epochs: train_mse={:.6}, val_mse={:?}",
                last.epoch, last.train_mse, last.val_mse
            );
        }
        Ok(history)
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(RegressorError::NotFitted);
        }
        self.check_layers()?;
        self.check_rows(x)?;
        Ok(x.iter().map(|row| self.predict_one(row)).collect())
    }

    fn input_dim(&self) -> Option<usize> {
        self.layers.first().map(|layer| layer.inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = 0.6 * x0 + 0.3 * x1 on a grid in [0, 1]^2
    fn linear_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..8 {
            for j in 0..8 {
                let a = i as f64 / 7.0;
                let b = j as f64 / 7.0;
                x.push(vec![a, b]);
                y.push(0.6 * a + 0.3 * b);
            }
        }
        (x, y)
    }

    fn small_config() -> RegressorConfig {
        RegressorConfig::new()
            .with_hidden(vec![16, 8])
            .with_learning_rate(0.01)
            .with_batch_size(16)
            .with_epochs(150)
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let model = FeedForwardRegressor::new(RegressorConfig::default());
        assert!(matches!(
            model.predict(&[vec![1.0]]),
            Err(RegressorError::NotFitted)
        ));
        assert_eq!(model.input_dim(), None);
    }

    #[test]
    fn test_learns_linear_target() {
        let (x, y) = linear_data();
        let mut model = FeedForwardRegressor::new(small_config());
        let history = model.fit(Dataset::new(&x, &y), None).unwrap();

        assert_eq!(history.len(), 150);
        let first = history.epochs[0].train_mse;
        let last = history.last().unwrap().train_mse;
        assert!(last < first, "loss did not decrease: {first} -> {last}");
        assert!(last < 0.01, "final train mse too high: {last}");
        assert_eq!(model.input_dim(), Some(2));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = linear_data();
        let config = small_config().with_epochs(5);
        let mut a = FeedForwardRegressor::new(config.clone());
        let mut b = FeedForwardRegressor::new(config);
        a.fit(Dataset::new(&x, &y), None).unwrap();
        b.fit(Dataset::new(&x, &y), None).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_validation_metrics_recorded() {
        let (x, y) = linear_data();
        let mut model = FeedForwardRegressor::new(small_config().with_epochs(3));
        let history = model
            .fit(Dataset::new(&x[..48], &y[..48]), Some(Dataset::new(&x[48..], &y[48..])))
            .unwrap();
        assert!(history.epochs.iter().all(|m| m.val_mse.is_some() && m.val_mae.is_some()));
    }

    #[test]
    fn test_input_errors() {
        let mut model = FeedForwardRegressor::new(small_config().with_epochs(1));
        assert!(matches!(
            model.fit(Dataset::new(&[], &[]), None),
            Err(RegressorError::EmptyData(_))
        ));
        assert!(matches!(
            model.fit(Dataset::new(&[vec![1.0]], &[1.0, 2.0]), None),
            Err(RegressorError::LengthMismatch { rows: 1, targets: 2 })
        ));

        let (x, y) = linear_data();
        model.fit(Dataset::new(&x, &y), None).unwrap();
        assert!(matches!(
            model.predict(&[vec![1.0, 2.0, 3.0]]),
            Err(RegressorError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (x, y) = linear_data();
        let mut model = FeedForwardRegressor::new(small_config().with_batch_size(0));
        assert!(matches!(
            model.fit(Dataset::new(&x, &y), None),
            Err(RegressorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_serde_round_trip_predicts_identically() {
        let (x, y) = linear_data();
        let mut model = FeedForwardRegressor::new(small_config().with_epochs(2));
        model.fit(Dataset::new(&x, &y), None).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let loaded: FeedForwardRegressor = serde_json::from_str(&json).unwrap();
        let before = model.predict(&x).unwrap();
        let after = loaded.predict(&x).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_malformed_layers_are_rejected() {
        let (x, y) = linear_data();
        let mut model = FeedForwardRegressor::new(small_config().with_epochs(1));
        model.fit(Dataset::new(&x, &y), None).unwrap();
        assert!(model.check_layers().is_ok());

        let mut truncated = model.clone();
        truncated.layers[0].weights.pop();
        assert!(matches!(
            truncated.check_layers(),
            Err(RegressorError::MalformedLayer { layer: 0, .. })
        ));
        assert!(truncated.predict(&x).is_err());

        let mut short_bias = model.clone();
        let last = short_bias.layers.len() - 1;
        short_bias.layers[last].biases.clear();
        assert!(short_bias.check_layers().is_err());

        let mut broken_chain = model.clone();
        broken_chain.layers.remove(1);
        assert!(matches!(
            broken_chain.check_layers(),
            Err(RegressorError::MalformedLayer { layer: 1, .. })
        ));
    }
}
