use thiserror::Error;

/// Errors that can occur when fitting or querying a regressor
#[derive(Error, Debug)]
pub enum RegressorError {
    #[error("Regressor has not been fitted")]
    NotFitted,

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Input dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Got {rows} rows but {targets} targets")]
    LengthMismatch { rows: usize, targets: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Layer {layer} is malformed: {reason}")]
    MalformedLayer { layer: usize, reason: String },

    #[error("Training diverged at epoch {epoch}: loss is not finite")]
    Diverged { epoch: usize },
}

pub type Result<T> = std::result::Result<T, RegressorError>;
