use crate::error::Result;
use crate::metrics::TrainingHistory;

/// A borrowed design matrix with its targets
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    pub x: &'a [Vec<f64>],
    pub y: &'a [f64],
}

impl<'a> Dataset<'a> {
    pub fn new(x: &'a [Vec<f64>], y: &'a [f64]) -> Self {
        Self { x, y }
    }
}

/// A model mapping feature vectors to a scalar.
///
/// The prediction service only sees this trait, so any model that can be
/// fitted on `(X, y)` and queried row by row can stand in for the built-in
/// network.
pub trait Regressor: Send + Sync {
    /// Fit on `train`, reporting validation loss on `validation` per epoch
    fn fit(&mut self, train: Dataset<'_>, validation: Option<Dataset<'_>>) -> Result<TrainingHistory>;

    /// Predict one value per row
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Width of the input vectors, once known
    fn input_dim(&self) -> Option<usize>;
}
