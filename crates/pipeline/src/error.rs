//! Error types for encoding, assembly and scaling.

use thiserror::Error;

/// Errors raised while fitting or applying the feature pipeline.
///
/// Unseen categories are deliberately absent from this list: they are
/// absorbed by the encoders and never surface as errors.
#[derive(Error, Debug)]
pub enum EncodingError {
    /// Nothing to fit on
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// A vector does not have the width the fitted state expects
    #[error("Feature mismatch: expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    /// Persisted column layout disagrees with the fitted encoders
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Input contains a value the pipeline cannot represent (NaN, Inf)
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, EncodingError>;
