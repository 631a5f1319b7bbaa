//! Persisted model directory.
//!
//! A trained model is a directory of named JSON files:
//!
//! | file              | contents                                      |
//! |-------------------|-----------------------------------------------|
//! | `encoders.json`   | fitted encoder set, including its schema      |
//! | `scalers.json`    | feature and target scalers                    |
//! | `regressor.json`  | fitted regressor                              |
//! | `train_data.json` | training partition (ids, scaled X, raw y)     |
//! | `test_data.json`  | held-out partition                            |
//! | `history.json`    | per-epoch training metrics                    |
//!
//! Nothing is trusted on load: the schema is re-derived from the encoders and
//! the scaler width and regressor input dimension must both agree with it.

use pipeline::{EncodingError, FeatureScaler, FittedEncoderSet, TargetScaler};
use regressor::{FeedForwardRegressor, Regressor, RegressorError, TrainingHistory};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use data_loader::TmdbId;

pub const ENCODERS_FILE: &str = "encoders.json";
pub const SCALERS_FILE: &str = "scalers.json";
pub const REGRESSOR_FILE: &str = "regressor.json";
pub const TRAIN_DATA_FILE: &str = "train_data.json";
pub const TEST_DATA_FILE: &str = "test_data.json";
pub const HISTORY_FILE: &str = "history.json";

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Schema check failed: {0}")]
    Schema(#[from] EncodingError),

    #[error("{component} expects {got} features but the schema has {expected}")]
    WidthMismatch {
        component: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Regressor is not fitted")]
    Unfitted,

    #[error("Regressor check failed: {0}")]
    Regressor(#[from] RegressorError),
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Both fitted scalers, persisted together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scalers {
    pub features: FeatureScaler,
    pub target: TargetScaler,
}

/// One side of the train/test split as the regressor saw it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPartition {
    pub ids: Vec<TmdbId>,
    /// Scaled feature rows
    pub features: Vec<Vec<f64>>,
    /// Unscaled targets, in currency units
    pub targets: Vec<f64>,
}

impl DataPartition {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `(id, actual opening)` pairs
    pub fn actuals(&self) -> impl Iterator<Item = (TmdbId, f64)> + '_ {
        self.ids.iter().copied().zip(self.targets.iter().copied())
    }
}

/// Everything inference needs, plus the training record
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifacts {
    pub encoders: FittedEncoderSet,
    pub scalers: Scalers,
    pub regressor: FeedForwardRegressor,
    pub train_data: DataPartition,
    pub test_data: DataPartition,
    pub history: TrainingHistory,
}

impl ModelArtifacts {
    /// Check that encoders, scalers and regressor agree on the feature width
    /// and that the regressor's layers are well formed
    pub fn validate(&self) -> Result<()> {
        self.encoders.verify_schema()?;
        let expected = self.encoders.schema().total_width();

        let scaler_width = self.scalers.features.width();
        if scaler_width != expected {
            return Err(ArtifactError::WidthMismatch {
                component: "feature scaler",
                expected,
                got: scaler_width,
            });
        }

        let input_dim = self.regressor.input_dim().ok_or(ArtifactError::Unfitted)?;
        self.regressor.check_layers()?;
        if input_dim != expected {
            return Err(ArtifactError::WidthMismatch {
                component: "regressor",
                expected,
                got: input_dim,
            });
        }
        Ok(())
    }

    /// Write every artifact file into `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.validate()?;
        fs::create_dir_all(dir).map_err(|source| ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        write_json(&dir.join(ENCODERS_FILE), &self.encoders)?;
        write_json(&dir.join(SCALERS_FILE), &self.scalers)?;
        write_json(&dir.join(REGRESSOR_FILE), &self.regressor)?;
        write_json(&dir.join(TRAIN_DATA_FILE), &self.train_data)?;
        write_json(&dir.join(TEST_DATA_FILE), &self.test_data)?;
        write_json(&dir.join(HISTORY_FILE), &self.history)?;

        info!("Saved model artifacts to {}", dir.display());
        Ok(())
    }

    /// Read and validate a model directory
    pub fn load(dir: &Path) -> Result<Self> {
        let artifacts = Self {
            encoders: read_json(&dir.join(ENCODERS_FILE))?,
            scalers: read_json(&dir.join(SCALERS_FILE))?,
            regressor: read_json(&dir.join(REGRESSOR_FILE))?,
            train_data: read_json(&dir.join(TRAIN_DATA_FILE))?,
            test_data: read_json(&dir.join(TEST_DATA_FILE))?,
            history: read_json(&dir.join(HISTORY_FILE))?,
        };
        artifacts.validate()?;
        info!(
            "Loaded model from {} ({} features)",
            dir.display(),
            artifacts.encoders.schema().total_width()
        );
        Ok(artifacts)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let io_err = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}
