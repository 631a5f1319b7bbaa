//! # Training Pipeline
//!
//! Turns a labeled corpus into a complete set of [`ModelArtifacts`]:
//! 1. Drop rows missing a required field or a target
//! 2. Fit encoders on the clean corpus (vocabularies and schema)
//! 3. Assemble the feature matrix
//! 4. Deterministic train/test split
//! 5. Fit the feature and target scalers on the training partition only
//! 6. Scale both partitions
//! 7. Fit the regressor, tracking the test partition as validation
//! 8. Evaluate on the test partition, in scaled and currency units
//!
//! ## Design Note
//! Encoders see the whole clean corpus so every category present in the data
//! has a column; scalers only see training rows so test rows are scaled like
//! live rows would be.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{info, instrument, warn};

use crate::artifacts::{DataPartition, ModelArtifacts, Scalers};
use data_loader::{DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION, RawSample, TrainingCorpus};
use pipeline::{EncoderConfig, FeatureAssembler, FeatureScaler, TargetScaler};
use regressor::{Dataset, FeedForwardRegressor, Regressor, RegressorConfig, mae, mse};

/// Settings for one training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Seed for the train/test split
    pub seed: u64,
    pub test_fraction: f64,
    pub encoders: EncoderConfig,
    pub regressor: RegressorConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SPLIT_SEED,
            test_fraction: DEFAULT_TEST_FRACTION,
            encoders: EncoderConfig::default(),
            regressor: RegressorConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    pub fn with_hash_width(mut self, hash_width: usize) -> Self {
        self.encoders = self.encoders.with_hash_width(hash_width);
        self
    }

    pub fn with_regressor(mut self, regressor: RegressorConfig) -> Self {
        self.regressor = regressor;
        self
    }
}

/// Test-partition error figures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub rows: usize,
    pub scaled_mse: f64,
    pub scaled_mae: f64,
    /// In currency units squared
    pub mse: f64,
    /// In currency units
    pub mae: f64,
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifacts: ModelArtifacts,
    /// `None` when the test partition is empty
    pub evaluation: Option<Evaluation>,
    /// Rows removed as incomplete before fitting
    pub dropped: usize,
}

pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Run every training step on `corpus`
    #[instrument(skip(self, corpus), fields(rows = corpus.len()))]
    pub fn run(&self, mut corpus: TrainingCorpus) -> Result<TrainingOutcome> {
        let start = Instant::now();

        let dropped = corpus.drop_incomplete();
        if corpus.is_empty() {
            bail!("No complete samples to train on ({dropped} dropped)");
        }

        let samples: Vec<RawSample> = corpus.samples().cloned().collect();
        let targets = corpus.targets();

        let encoders = Arc::new(
            self.config
                .encoders
                .fit(&samples)
                .context("Failed to fit encoders")?,
        );
        let assembler =
            FeatureAssembler::new(encoders.clone()).context("Encoder schema is inconsistent")?;
        let matrix = assembler
            .assemble_batch(&samples)
            .context("Failed to assemble feature matrix")?;
        info!(
            "Assembled {} x {} feature matrix",
            matrix.len(),
            assembler.width()
        );

        let split = corpus.split(self.config.seed, self.config.test_fraction);
        let pick = |indices: &[usize]| -> (Vec<u64>, Vec<Vec<f64>>, Vec<f64>) {
            let ids = indices.iter().map(|&i| samples[i].id).collect();
            let x = indices.iter().map(|&i| matrix[i].clone()).collect();
            let y = indices.iter().map(|&i| targets[i]).collect();
            (ids, x, y)
        };
        let (train_ids, x_train, y_train) = pick(&split.train);
        let (test_ids, x_test, y_test) = pick(&split.test);
        info!(
            "Split {} rows: {} train, {} test (seed {})",
            samples.len(),
            x_train.len(),
            x_test.len(),
            self.config.seed
        );

        let feature_scaler = FeatureScaler::fit(&x_train).context("Failed to fit feature scaler")?;
        let target_scaler = TargetScaler::fit(&y_train).context("Failed to fit target scaler")?;

        let x_train = feature_scaler.transform_batch(&x_train)?;
        let x_test = feature_scaler.transform_batch(&x_test)?;
        let y_train_scaled = target_scaler.transform_all(&y_train);
        let y_test_scaled = target_scaler.transform_all(&y_test);

        let mut regressor = FeedForwardRegressor::new(self.config.regressor.clone());
        let validation = if x_test.is_empty() {
            warn!("Test partition is empty; training without validation");
            None
        } else {
            Some(Dataset::new(&x_test, &y_test_scaled))
        };
        let history = regressor
            .fit(Dataset::new(&x_train, &y_train_scaled), validation)
            .context("Failed to fit regressor")?;

        let evaluation = if x_test.is_empty() {
            None
        } else {
            let scaled = regressor.predict(&x_test)?;
            let currency: Vec<f64> = scaled.iter().map(|p| target_scaler.inverse(*p)).collect();
            let evaluation = Evaluation {
                rows: x_test.len(),
                scaled_mse: mse(&scaled, &y_test_scaled),
                scaled_mae: mae(&scaled, &y_test_scaled),
                mse: mse(&currency, &y_test),
                mae: mae(&currency, &y_test),
            };
            info!(
                "Test MSE {:.6} / MAE {:.6} (scaled); MAE ${:.0}",
                evaluation.scaled_mse, evaluation.scaled_mae, evaluation.mae
            );
            Some(evaluation)
        };

        let artifacts = ModelArtifacts {
            encoders: encoders.as_ref().clone(),
            scalers: Scalers {
                features: feature_scaler,
                target: target_scaler,
            },
            regressor,
            train_data: DataPartition {
                ids: train_ids,
                features: x_train,
                targets: y_train,
            },
            test_data: DataPartition {
                ids: test_ids,
                features: x_test,
                targets: y_test,
            },
            history,
        };
        artifacts
            .validate()
            .context("Trained artifacts failed validation")?;

        info!("Training finished in {:.2?}", start.elapsed());
        Ok(TrainingOutcome {
            artifacts,
            evaluation,
            dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::LabeledSample;

    fn labeled(id: u64, budget: u64, complete: bool) -> LabeledSample {
        let mut s = RawSample::new(id);
        s.budget = Some(budget);
        s.runtime = Some(90.0 + (id % 30) as f64);
        s.genres = vec![if id % 2 == 0 { "Drama" } else { "Action" }.to_string()];
        s.rating = Some(if id % 3 == 0 { "R" } else { "PG-13" }.to_string());
        s.month = Some((id % 12 + 1) as u32);
        s.day = Some((id % 28 + 1) as u32);
        if !complete {
            s.rating = None;
        }
        LabeledSample {
            sample: s,
            target: Some(budget as f64 * 0.4),
        }
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig::new().with_hash_width(16).with_regressor(
            RegressorConfig::new()
                .with_hidden(vec![8, 4])
                .with_epochs(3)
                .with_batch_size(8),
        )
    }

    #[test]
    fn test_run_produces_consistent_artifacts() {
        let corpus: TrainingCorpus = (1..=40)
            .map(|i| labeled(i, i * 1_000_000, i != 5))
            .collect();
        let outcome = TrainingPipeline::new(quick_config()).run(corpus).unwrap();

        assert_eq!(outcome.dropped, 1);
        let a = &outcome.artifacts;
        assert_eq!(a.train_data.len() + a.test_data.len(), 39);
        assert_eq!(a.test_data.len(), 10);
        assert_eq!(a.history.len(), 3);
        assert!(a.validate().is_ok());

        let eval = outcome.evaluation.unwrap();
        assert_eq!(eval.rows, 10);
        assert!(eval.scaled_mse.is_finite());
        assert!(eval.mae >= 0.0);
    }

    #[test]
    fn test_same_seed_same_partitions() {
        let corpus: TrainingCorpus = (1..=20).map(|i| labeled(i, i * 500_000, true)).collect();
        let pipeline = TrainingPipeline::new(quick_config().with_seed(7));
        let a = pipeline.run(corpus.clone()).unwrap();
        let b = pipeline.run(corpus).unwrap();
        assert_eq!(a.artifacts.test_data.ids, b.artifacts.test_data.ids);
        assert_eq!(a.artifacts.regressor, b.artifacts.regressor);
    }

    #[test]
    fn test_empty_corpus_is_an_error() {
        let corpus: TrainingCorpus = (1..=3).map(|i| labeled(i, 1_000, false)).collect();
        let err = TrainingPipeline::new(quick_config()).run(corpus).unwrap_err();
        assert!(err.to_string().contains("No complete samples"));
    }
}
