//! # Prediction Service
//!
//! Inference facade. Every request walks the same stages:
//!
//! ```text
//! Received → Resolved → Encoded → Scaled → Predicted → Unscaled
//! ```
//!
//! - **Resolved**: a `RawSample` exists (given directly, or resolved from a
//!   title, fetched and normalized from the provider)
//! - **Encoded**: assembled with the persisted encoder set
//! - **Scaled**: feature scaler applied
//! - **Predicted**: regressor output, in scaled target units
//! - **Unscaled**: target scaler inverse, in currency units
//!
//! A failure at any stage ends that request only. The report still carries
//! whatever sample fields were gathered, so metadata is never lost because a
//! prediction failed.
//!
//! Fitted state is read-only after construction and shared through `Arc`;
//! inference takes no locks.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::artifacts::{ArtifactError, ModelArtifacts, Scalers};
use data_loader::{RawSample, TmdbId};
use pipeline::FeatureAssembler;
use regressor::{FeedForwardRegressor, Regressor};
use sources::{
    Attempt, MatchKind, MetadataProvider, RetryPolicy, Sleeper, ThreadSleeper, TitleResolver,
    normalize_movie, run_with_retry,
};

/// Lookups in flight at once in [`PredictionService::predict_ids`]
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Request lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Resolved,
    Encoded,
    Scaled,
    Predicted,
    Unscaled,
}

/// Result of predicting one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Opening-weekend revenue in currency units; `None` on failure
    pub predicted_value: Option<f64>,
    pub success: bool,
    pub failure_reason: Option<String>,
    /// Stage that failed, if any
    pub failed_at: Option<Stage>,
}

impl Prediction {
    fn succeeded(value: f64) -> Self {
        Self {
            predicted_value: Some(value),
            success: true,
            failure_reason: None,
            failed_at: None,
        }
    }

    fn failed(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            predicted_value: None,
            success: false,
            failure_reason: Some(reason.into()),
            failed_at: Some(stage),
        }
    }
}

/// Everything known about one movie after a lookup-and-predict request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionReport {
    /// `None` when a title lookup found no id
    pub tmdb_id: Option<TmdbId>,
    /// Title searched for, on title lookups
    pub query: Option<String>,
    /// How the title was matched, on title lookups
    pub match_kind: Option<MatchKind>,
    /// Normalized metadata, present whenever the fetch succeeded
    pub sample: Option<RawSample>,
    pub prediction: Prediction,
    /// Known opening from the historical data, if this id was trained on
    pub actual_opening: Option<f64>,
}

impl PredictionReport {
    pub fn predicted_opening(&self) -> Option<f64> {
        self.prediction.predicted_value
    }

    /// Provider title, falling back to the searched title
    pub fn title(&self) -> Option<&str> {
        self.sample
            .as_ref()
            .and_then(|s| s.title.as_deref())
            .or(self.query.as_deref())
    }
}

/// Inference facade over a loaded model
pub struct PredictionService {
    assembler: FeatureAssembler,
    scalers: Scalers,
    regressor: FeedForwardRegressor,
    actuals: HashMap<TmdbId, f64>,
    sleeper: Arc<dyn Sleeper>,
    concurrency: usize,
}

impl PredictionService {
    /// Build from validated artifacts.
    ///
    /// Known actual openings are seeded from the ids the model was trained
    /// and tested on.
    pub fn new(artifacts: ModelArtifacts) -> std::result::Result<Self, ArtifactError> {
        artifacts.validate()?;
        let actuals = artifacts
            .train_data
            .actuals()
            .chain(artifacts.test_data.actuals())
            .collect();
        let assembler = FeatureAssembler::new(Arc::new(artifacts.encoders))?;
        Ok(Self {
            assembler,
            scalers: artifacts.scalers,
            regressor: artifacts.regressor,
            actuals,
            sleeper: Arc::new(ThreadSleeper),
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// Load a model directory
    pub fn from_model_dir(dir: &Path) -> Result<Self> {
        let artifacts = ModelArtifacts::load(dir)
            .with_context(|| format!("Failed to load model from {}", dir.display()))?;
        Ok(Self::new(artifacts)?)
    }

    /// Merge extra known openings, e.g. from an accepted-ids file
    pub fn with_actuals(mut self, actuals: HashMap<TmdbId, f64>) -> Self {
        self.actuals.extend(actuals);
        self
    }

    /// Replace the back-off sleeper (builder pattern)
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Cap on concurrent lookups in `predict_ids` (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn feature_width(&self) -> usize {
        self.assembler.width()
    }

    pub fn actual_opening(&self, id: TmdbId) -> Option<f64> {
        self.actuals.get(&id).copied()
    }

    /// Predict the opening for one sample.
    ///
    /// Never returns an error: encoder and regressor failures are reported
    /// in the [`Prediction`].
    pub fn predict(&self, sample: &RawSample) -> Prediction {
        let missing = sample.missing_required_fields();
        if !missing.is_empty() {
            debug!("Sample {} is missing {:?}; encoding as absent", sample.id, missing);
        }

        let encoded = match self.assembler.assemble(sample) {
            Ok(v) => v,
            Err(e) => return Prediction::failed(Stage::Encoded, e.to_string()),
        };
        let scaled = match self.scalers.features.transform(&encoded) {
            Ok(v) => v,
            Err(e) => return Prediction::failed(Stage::Scaled, e.to_string()),
        };
        let output = match self.regressor.predict(&[scaled]) {
            Ok(out) => out,
            Err(e) => return Prediction::failed(Stage::Predicted, e.to_string()),
        };
        let value = match output.first() {
            Some(v) if v.is_finite() => *v,
            Some(v) => {
                return Prediction::failed(Stage::Predicted, format!("Non-finite output {v}"));
            }
            None => return Prediction::failed(Stage::Predicted, "Regressor returned no output"),
        };

        let opening = self.scalers.target.inverse(value);
        debug!("Sample {}: scaled {:.6} -> {:.0}", sample.id, value, opening);
        Prediction::succeeded(opening)
    }

    /// Fetch, normalize and predict one provider id.
    ///
    /// Rate limits are retried without bound. A failed fetch or a sample
    /// with a normalization issue ends the request at `Resolved`; in the
    /// second case the partial sample is still returned.
    #[instrument(skip(self, provider))]
    pub fn predict_for_id(&self, provider: &dyn MetadataProvider, id: TmdbId) -> PredictionReport {
        let actual_opening = self.actual_opening(id);
        let what = format!("fetch {id}");
        let fetched = run_with_retry(RetryPolicy::Unbounded, self.sleeper.as_ref(), &what, || {
            Attempt::from(provider.fetch(id))
        });

        let json = match fetched {
            Ok(json) => json,
            Err(failure) => {
                warn!("Lookup for {} failed: {}", id, failure);
                return PredictionReport {
                    tmdb_id: Some(id),
                    query: None,
                    match_kind: None,
                    sample: None,
                    prediction: Prediction::failed(Stage::Resolved, failure.to_string()),
                    actual_opening,
                };
            }
        };

        let normalized = normalize_movie(id, &json);
        let prediction = match normalized.issue() {
            Some(issue) => {
                warn!("{}", issue);
                Prediction::failed(Stage::Resolved, issue)
            }
            None => self.predict(&normalized.sample),
        };
        PredictionReport {
            tmdb_id: Some(id),
            query: None,
            match_kind: None,
            sample: Some(normalized.sample),
            prediction,
            actual_opening,
        }
    }

    /// Resolve a title to an id, then fetch and predict it.
    ///
    /// A trailing `" (YYYY)"` in the title stands in for a missing year.
    /// Rate limits are retried without bound; a title that resolves to
    /// nothing ends the request at `Resolved`.
    #[instrument(skip(self, provider))]
    pub fn predict_for_title(
        &self,
        provider: &dyn MetadataProvider,
        title: &str,
        year: Option<i32>,
    ) -> PredictionReport {
        let resolver = TitleResolver::new(provider);
        let resolved = run_with_retry(RetryPolicy::Unbounded, self.sleeper.as_ref(), title, || {
            Attempt::from(resolver.resolve(title, year))
        });

        let resolution = match resolved {
            Ok(resolution) => resolution,
            Err(failure) => {
                warn!("Could not resolve {:?}: {}", title, failure);
                return PredictionReport {
                    tmdb_id: None,
                    query: Some(title.to_string()),
                    match_kind: None,
                    sample: None,
                    prediction: Prediction::failed(Stage::Resolved, failure.to_string()),
                    actual_opening: None,
                };
            }
        };
        debug!("{:?} resolved to {} ({:?})", title, resolution.id, resolution.kind);

        let mut report = self.predict_for_id(provider, resolution.id);
        report.query = Some(title.to_string());
        report.match_kind = Some(resolution.kind);
        report
    }

    /// Predict every upcoming release the provider lists
    pub fn predict_upcoming(&self, provider: &dyn MetadataProvider) -> Result<Vec<PredictionReport>> {
        let upcoming = run_with_retry(RetryPolicy::Unbounded, self.sleeper.as_ref(), "upcoming", || {
            Attempt::from(provider.upcoming())
        })
        .context("Failed to list upcoming releases")?;

        let ids: Vec<TmdbId> = upcoming
            .iter()
            .filter_map(|movie| movie.get("id").and_then(serde_json::Value::as_u64))
            .collect();
        info!("Predicting {} upcoming releases", ids.len());

        Ok(ids
            .into_iter()
            .map(|id| self.predict_for_id(provider, id))
            .collect())
    }

    /// Predict many ids on the blocking pool, preserving order.
    ///
    /// At most `concurrency` lookups run at once, so a rate-limited
    /// provider is not hit with every request together.
    pub async fn predict_ids(
        self: Arc<Self>,
        provider: Arc<dyn MetadataProvider>,
        ids: Vec<TmdbId>,
    ) -> Result<Vec<PredictionReport>> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .context("Prediction semaphore closed")?;
            let service = self.clone();
            let provider = provider.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let report = service.predict_for_id(provider.as_ref(), id);
                drop(permit);
                report
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            reports.push(handle.await.context("Prediction task panicked")?);
        }
        Ok(reports)
    }
}
