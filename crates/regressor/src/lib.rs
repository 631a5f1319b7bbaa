//! Regression models for the opening-weekend forecaster.
//!
//! This crate provides:
//! - The [`Regressor`] trait the prediction service is written against
//! - [`FeedForwardRegressor`]: an in-process multi-layer perceptron
//!   (ReLU hidden layers, linear output, MSE loss, Adam)
//! - Regression metrics and per-epoch [`TrainingHistory`]
//!
//! ## Example Usage
//! ```ignore
//! use regressor::{Dataset, FeedForwardRegressor, Regressor, RegressorConfig};
//!
//! let mut model = FeedForwardRegressor::new(RegressorConfig::new().with_epochs(50));
//! let history = model.fit(Dataset::new(&x_train, &y_train), Some(Dataset::new(&x_test, &y_test)))?;
//! let predictions = model.predict(&x_test)?;
//! ```

pub mod error;
pub mod layer;
pub mod metrics;
pub mod network;
pub mod traits;

pub use error::{RegressorError, Result};
pub use metrics::{mae, mse, EpochMetrics, TrainingHistory};
pub use network::{FeedForwardRegressor, RegressorConfig};
pub use traits::{Dataset, Regressor};
