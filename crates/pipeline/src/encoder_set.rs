//! The fitted encoder set: one named encoder per movie attribute.
//!
//! [`EncoderConfig`] is the unfit form: just the knobs. Calling
//! [`EncoderConfig::fit`] on the training samples produces a
//! [`FittedEncoderSet`], which is then serialized next to the model and loaded
//! read-only by every process that serves it.
//!
//! ## Rust concept: no dynamic attribute lookup
//! Every encoder is a named, statically typed field. `encode_field` dispatches
//! on [`FeatureField`] with an exhaustive `match`, so adding a field without
//! wiring its encoder is a compile error rather than a runtime surprise.

use crate::encoders::{
    DEFAULT_HASH_WIDTH, HashedEncoder, MultiHotEncoder, NumericEncoder, OneHotEncoder,
};
use crate::error::{EncodingError, Result};
use crate::schema::{FeatureField, FeatureSchema, FeatureSegment, SCHEMA_VERSION};
use crate::traits::Encoder;
use data_loader::RawSample;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Settings for fitting an encoder set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Output width of every hashed field
    pub hash_width: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            hash_width: DEFAULT_HASH_WIDTH,
        }
    }
}

impl EncoderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hashed field width (builder pattern)
    pub fn with_hash_width(mut self, hash_width: usize) -> Self {
        self.hash_width = hash_width;
        self
    }

    /// Fit every encoder on `samples` and freeze the result.
    ///
    /// ## Algorithm
    /// 1. Learn the genre union and the rating/month/day vocabularies
    /// 2. Fix the hashed widths
    /// 3. Record the resulting layout as the schema
    ///
    /// # Errors
    /// `EmptyData` when there is nothing to learn from.
    pub fn fit(&self, samples: &[RawSample]) -> Result<FittedEncoderSet> {
        if samples.is_empty() {
            return Err(EncodingError::EmptyData(
                "cannot fit encoders on zero samples".to_string(),
            ));
        }
        if self.hash_width == 0 {
            return Err(EncodingError::InvalidValue(
                "hash width must be at least 1".to_string(),
            ));
        }

        let hashed = HashedEncoder::fit(self.hash_width);
        let mut set = FittedEncoderSet {
            schema: FeatureSchema {
                version: SCHEMA_VERSION,
                segments: Vec::new(),
            },
            budget: NumericEncoder::new(),
            runtime: NumericEncoder::new(),
            genres: MultiHotEncoder::fit(samples.iter().map(|s| s.genres.as_slice())),
            directors: hashed,
            producers: hashed,
            writers: hashed,
            keywords: hashed,
            studios: hashed,
            cast: hashed,
            rating: OneHotEncoder::fit(samples.iter().filter_map(|s| s.rating.as_ref())),
            month: OneHotEncoder::fit(samples.iter().filter_map(|s| s.month.as_ref())),
            day: OneHotEncoder::fit(samples.iter().filter_map(|s| s.day.as_ref())),
        };
        set.schema = set.live_schema()?;

        info!(
            "Fitted encoders on {} samples: {} genres, {} ratings, {} months, {} days, {} total columns",
            samples.len(),
            set.genres.width(),
            set.rating.width(),
            set.month.width(),
            set.day.width(),
            set.schema.total_width()
        );
        Ok(set)
    }
}

/// All fitted encoders plus the schema they produced.
///
/// Read-only once built; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedEncoderSet {
    /// Layout recorded at fit time
    schema: FeatureSchema,

    budget: NumericEncoder,
    runtime: NumericEncoder,
    genres: MultiHotEncoder,
    directors: HashedEncoder,
    producers: HashedEncoder,
    writers: HashedEncoder,
    keywords: HashedEncoder,
    studios: HashedEncoder,
    cast: HashedEncoder,
    rating: OneHotEncoder<String>,
    month: OneHotEncoder<u32>,
    day: OneHotEncoder<u32>,
}

impl FittedEncoderSet {
    /// The layout recorded when the set was fitted
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Encoding family and width of one field's encoder
    pub fn segment(&self, field: FeatureField) -> FeatureSegment {
        let (encoding, width) = match field {
            FeatureField::Budget => (self.budget.kind(), self.budget.width()),
            FeatureField::Runtime => (self.runtime.kind(), self.runtime.width()),
            FeatureField::Genres => (self.genres.kind(), self.genres.width()),
            FeatureField::Directors => (self.directors.kind(), self.directors.width()),
            FeatureField::Producers => (self.producers.kind(), self.producers.width()),
            FeatureField::Writers => (self.writers.kind(), self.writers.width()),
            FeatureField::Keywords => (self.keywords.kind(), self.keywords.width()),
            FeatureField::Studios => (self.studios.kind(), self.studios.width()),
            FeatureField::Cast => (self.cast.kind(), self.cast.width()),
            FeatureField::Rating => (self.rating.kind(), self.rating.width()),
            FeatureField::Month => (self.month.kind(), self.month.width()),
            FeatureField::Day => (self.day.kind(), self.day.width()),
        };
        FeatureSegment {
            field,
            encoding,
            width,
        }
    }

    /// Schema derived from the encoders as they are now
    pub fn live_schema(&self) -> Result<FeatureSchema> {
        FeatureSchema::new(
            FeatureField::CANONICAL_ORDER
                .iter()
                .map(|field| self.segment(*field))
                .collect(),
        )
    }

    /// Check that the recorded schema still describes these encoders.
    ///
    /// Fails when the persisted layout and the deserialized encoders disagree,
    /// e.g. a hand-edited or mixed-version artifact.
    pub fn verify_schema(&self) -> Result<()> {
        self.schema.validate()?;
        self.live_schema()?.ensure_matches(&self.schema)
    }

    /// Append the columns for one field of `sample` to `out`
    pub fn encode_field(&self, field: FeatureField, sample: &RawSample, out: &mut Vec<f64>) {
        match field {
            FeatureField::Budget => self.budget.encode_into(&sample.budget.map(|b| b as f64), out),
            FeatureField::Runtime => self.runtime.encode_into(&sample.runtime, out),
            FeatureField::Genres => self.genres.encode_into(sample.genres.as_slice(), out),
            FeatureField::Directors => self.directors.encode_into(sample.directors.as_slice(), out),
            FeatureField::Producers => self.producers.encode_into(sample.producers.as_slice(), out),
            FeatureField::Writers => self.writers.encode_into(sample.writers.as_slice(), out),
            FeatureField::Keywords => self.keywords.encode_into(sample.keywords.as_slice(), out),
            FeatureField::Studios => self.studios.encode_into(sample.studios.as_slice(), out),
            FeatureField::Cast => self.cast.encode_into(sample.cast.as_slice(), out),
            FeatureField::Rating => self.rating.encode_into(&sample.rating, out),
            FeatureField::Month => self.month.encode_into(&sample.month, out),
            FeatureField::Day => self.day.encode_into(&sample.day, out),
        }
    }

    /// Human-readable name of every column, in order
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.schema.total_width());
        for segment in &self.schema.segments {
            let prefix = segment.field.column_prefix();
            match segment.field {
                FeatureField::Budget | FeatureField::Runtime => names.push(prefix.to_string()),
                FeatureField::Genres => names.extend(
                    self.genres
                        .classes()
                        .iter()
                        .map(|class| format!("{prefix}{class}")),
                ),
                FeatureField::Rating => names.extend(
                    self.rating
                        .categories()
                        .iter()
                        .map(|rating| format!("{prefix}{rating}")),
                ),
                FeatureField::Month => names.extend(
                    self.month
                        .categories()
                        .iter()
                        .map(|month| format!("{prefix}{month}")),
                ),
                FeatureField::Day => names.extend(
                    self.day
                        .categories()
                        .iter()
                        .map(|day| format!("{prefix}{day}")),
                ),
                _ => names.extend((0..segment.width).map(|i| format!("{prefix}{i}"))),
            }
        }
        names
    }

    // Accessors used for decoding and reporting

    pub fn genres(&self) -> &MultiHotEncoder {
        &self.genres
    }

    pub fn rating(&self) -> &OneHotEncoder<String> {
        &self.rating
    }

    pub fn month(&self) -> &OneHotEncoder<u32> {
        &self.month
    }

    pub fn day(&self) -> &OneHotEncoder<u32> {
        &self.day
    }

    /// Width shared by the hashed fields
    pub fn hash_width(&self) -> usize {
        self.directors.width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: u64, genres: &[&str], rating: &str, month: u32, day: u32) -> RawSample {
        let mut s = RawSample::new(id);
        s.budget = Some(100_000_000);
        s.runtime = Some(120.0);
        s.genres = genres.iter().map(|g| g.to_string()).collect();
        s.rating = Some(rating.to_string());
        s.month = Some(month);
        s.day = Some(day);
        s.directors = vec!["Jon Watts".to_string()];
        s
    }

    fn fitted() -> FittedEncoderSet {
        let samples = vec![
            sample(1, &["Action", "Adventure"], "PG-13", 7, 7),
            sample(2, &["Drama"], "R", 12, 25),
        ];
        EncoderConfig::new().with_hash_width(8).fit(&samples).unwrap()
    }

    #[test]
    fn test_fit_records_schema() {
        let set = fitted();
        let schema = set.schema();
        // 2 numeric + 3 genres + 6 hashed * 8 + 2 ratings + 2 months + 2 days
        assert_eq!(schema.total_width(), 2 + 3 + 48 + 2 + 2 + 2);
        assert!(set.verify_schema().is_ok());
    }

    #[test]
    fn test_fit_on_nothing_fails() {
        assert!(matches!(
            EncoderConfig::new().fit(&[]),
            Err(EncodingError::EmptyData(_))
        ));
    }

    #[test]
    fn test_column_names_match_width() {
        let set = fitted();
        let names = set.column_names();
        assert_eq!(names.len(), set.schema().total_width());
        assert_eq!(names[0], "Budget");
        assert_eq!(names[2], "Genre_Action");
        assert!(names.contains(&"Directing_0".to_string()));
        assert!(names.contains(&"Rating_PG-13".to_string()));
        assert_eq!(names.last().map(String::as_str), Some("Day_25"));
    }

    #[test]
    fn test_tampered_schema_is_detected() {
        let mut set = fitted();
        set.schema.segments[2].width += 1;
        assert!(matches!(
            set.verify_schema(),
            Err(EncodingError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_serde_round_trip_keeps_schema_valid() {
        let set = fitted();
        let json = serde_json::to_string(&set).unwrap();
        let loaded: FittedEncoderSet = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, set);
        assert!(loaded.verify_schema().is_ok());
    }
}
