//! Predictor crate for the opening-weekend forecaster.
//!
//! Ties the lower crates into the two phases that share one feature contract:
//! - **training**: corpus to fitted encoders, scalers and regressor
//! - **artifacts**: the persisted, validated model directory
//! - **service**: the prediction facade used at inference time

pub mod artifacts;
pub mod service;
pub mod training;

pub use artifacts::{ArtifactError, DataPartition, ModelArtifacts, Scalers};
pub use service::{DEFAULT_CONCURRENCY, Prediction, PredictionReport, PredictionService, Stage};
pub use training::{Evaluation, TrainingConfig, TrainingOutcome, TrainingPipeline};
