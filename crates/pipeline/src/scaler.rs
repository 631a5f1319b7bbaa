//! Min-max scaling for feature vectors and the regression target.
//!
//! Both scalers are fitted on the training partition only and then applied
//! unchanged to the test partition and to live vectors.

use crate::error::{EncodingError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-feature min-max scaler mapping the training range onto [0, 1].
///
/// ## Algorithm
/// - fit: record min and max of every column
/// - transform: `(x - min) / (max - min)`
/// - a column that was constant during fitting always maps to 0
/// - with clipping on, results are clamped to [0, 1]; off by default, so
///   values outside the training range extrapolate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    min: Vec<f64>,
    /// `1 / (max - min)`, or 0 for constant columns
    scale: Vec<f64>,
    #[serde(default)]
    clip: bool,
}

impl FeatureScaler {
    /// Learn per-column ranges from the training rows.
    ///
    /// # Errors
    /// - `EmptyData` if there are no rows
    /// - `FeatureMismatch` if rows disagree on width
    /// - `InvalidValue` on NaN or infinite entries
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows
            .first()
            .map(Vec::len)
            .ok_or_else(|| EncodingError::EmptyData("cannot fit scaler on zero rows".into()))?;

        let mut min = vec![f64::INFINITY; width];
        let mut max = vec![f64::NEG_INFINITY; width];
        for row in rows {
            if row.len() != width {
                return Err(EncodingError::FeatureMismatch {
                    expected: width,
                    got: row.len(),
                });
            }
            for (col, value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(EncodingError::InvalidValue(format!(
                        "non-finite value {value} in column {col}"
                    )));
                }
                min[col] = min[col].min(*value);
                max[col] = max[col].max(*value);
            }
        }

        let scale: Vec<f64> = min
            .iter()
            .zip(&max)
            .map(|(lo, hi)| {
                let range = hi - lo;
                if range == 0.0 { 0.0 } else { 1.0 / range }
            })
            .collect();
        debug!(
            "Fitted feature scaler: {} columns, {} constant",
            width,
            scale.iter().filter(|s| **s == 0.0).count()
        );

        Ok(Self {
            min,
            scale,
            clip: false,
        })
    }

    /// Clamp transformed values to [0, 1] (builder pattern)
    pub fn with_clip(mut self, clip: bool) -> Self {
        self.clip = clip;
        self
    }

    /// Number of columns this scaler was fitted on
    pub fn width(&self) -> usize {
        self.min.len()
    }

    /// Scale one vector
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.width() {
            return Err(EncodingError::FeatureMismatch {
                expected: self.width(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.min.iter().zip(&self.scale))
            .map(|(x, (lo, scale))| {
                let scaled = (x - lo) * scale;
                if self.clip { scaled.clamp(0.0, 1.0) } else { scaled }
            })
            .collect())
    }

    /// Scale every row
    pub fn transform_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.transform(row)).collect()
    }
}

/// Min-max scaler for the scalar target, with an exact inverse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetScaler {
    min: f64,
    max: f64,
}

impl TargetScaler {
    /// Learn the target range from the training targets
    pub fn fit(targets: &[f64]) -> Result<Self> {
        if targets.is_empty() {
            return Err(EncodingError::EmptyData(
                "cannot fit target scaler on zero targets".into(),
            ));
        }
        if let Some(bad) = targets.iter().find(|t| !t.is_finite()) {
            return Err(EncodingError::InvalidValue(format!(
                "non-finite target {bad}"
            )));
        }
        let min = targets.iter().copied().fold(f64::INFINITY, f64::min);
        let max = targets.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self { min, max })
    }

    fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Map a target into [0, 1] (training range)
    pub fn transform(&self, target: f64) -> f64 {
        let range = self.range();
        if range == 0.0 {
            0.0
        } else {
            (target - self.min) / range
        }
    }

    pub fn transform_all(&self, targets: &[f64]) -> Vec<f64> {
        targets.iter().map(|t| self.transform(*t)).collect()
    }

    /// Map a scaled value back to currency units
    pub fn inverse(&self, scaled: f64) -> f64 {
        scaled * self.range() + self.min
    }

    /// Learned (min, max) of the training targets
    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}
