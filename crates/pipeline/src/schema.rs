//! Feature schema: the fixed column layout of the model input.
//!
//! The schema is produced when the encoders are fitted and saved alongside
//! them. At inference time the assembler checks the live encoders against it,
//! so a model can never be fed a vector laid out differently from the one it
//! was trained on.
//!
//! ## Canonical order
//! budget, runtime, genres, directors, producers, writers, keywords,
//! studios, cast, rating, month, day

use crate::error::{EncodingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Bumped whenever the layout rules change incompatibly
pub const SCHEMA_VERSION: u32 = 1;

/// One attribute of a movie that contributes columns to the feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureField {
    Budget,
    Runtime,
    Genres,
    Directors,
    Producers,
    Writers,
    Keywords,
    Studios,
    Cast,
    Rating,
    Month,
    Day,
}

impl FeatureField {
    /// Every field, in the order its columns appear
    pub const CANONICAL_ORDER: [FeatureField; 12] = [
        FeatureField::Budget,
        FeatureField::Runtime,
        FeatureField::Genres,
        FeatureField::Directors,
        FeatureField::Producers,
        FeatureField::Writers,
        FeatureField::Keywords,
        FeatureField::Studios,
        FeatureField::Cast,
        FeatureField::Rating,
        FeatureField::Month,
        FeatureField::Day,
    ];

    /// Prefix used for this field's column names
    pub fn column_prefix(&self) -> &'static str {
        match self {
            FeatureField::Budget => "Budget",
            FeatureField::Runtime => "Runtime",
            FeatureField::Genres => "Genre_",
            FeatureField::Directors => "Directing_",
            FeatureField::Producers => "Producing_",
            FeatureField::Writers => "Writing_",
            FeatureField::Keywords => "Keyword_",
            FeatureField::Studios => "Studios_",
            FeatureField::Cast => "Cast_",
            FeatureField::Rating => "Rating_",
            FeatureField::Month => "Month_",
            FeatureField::Day => "Day_",
        }
    }

    /// The encoding family this field always uses
    pub fn encoding(&self) -> EncodingKind {
        match self {
            FeatureField::Budget | FeatureField::Runtime => EncodingKind::Numeric,
            FeatureField::Genres => EncodingKind::MultiHot,
            FeatureField::Directors
            | FeatureField::Producers
            | FeatureField::Writers
            | FeatureField::Keywords
            | FeatureField::Studios
            | FeatureField::Cast => EncodingKind::Hashed,
            FeatureField::Rating | FeatureField::Month | FeatureField::Day => EncodingKind::OneHot,
        }
    }
}

impl fmt::Display for FeatureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureField::Budget => "budget",
            FeatureField::Runtime => "runtime",
            FeatureField::Genres => "genres",
            FeatureField::Directors => "directors",
            FeatureField::Producers => "producers",
            FeatureField::Writers => "writers",
            FeatureField::Keywords => "keywords",
            FeatureField::Studios => "studios",
            FeatureField::Cast => "cast",
            FeatureField::Rating => "rating",
            FeatureField::Month => "month",
            FeatureField::Day => "day",
        };
        f.write_str(name)
    }
}

/// Encoding family of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingKind {
    Numeric,
    OneHot,
    MultiHot,
    Hashed,
}

/// A contiguous run of columns produced by one field's encoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSegment {
    pub field: FeatureField,
    pub encoding: EncodingKind,
    pub width: usize,
}

/// Named group of columns, for reporting and inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnGroup {
    pub field: FeatureField,
    pub columns: Range<usize>,
}

impl ColumnGroup {
    /// Number of columns in the group
    pub fn count(&self) -> usize {
        self.columns.len()
    }
}

/// Ordered list of segments making up one feature vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub segments: Vec<FeatureSegment>,
}

impl FeatureSchema {
    /// Build a schema from per-field widths.
    ///
    /// Segments must be given in canonical order, one per field.
    pub fn new(segments: Vec<FeatureSegment>) -> Result<Self> {
        let schema = Self {
            version: SCHEMA_VERSION,
            segments,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Check version, ordering and encoding of every segment
    pub fn validate(&self) -> Result<()> {
        if self.version != SCHEMA_VERSION {
            return Err(EncodingError::SchemaMismatch(format!(
                "schema version {} is not supported (expected {})",
                self.version, SCHEMA_VERSION
            )));
        }
        if self.segments.len() != FeatureField::CANONICAL_ORDER.len() {
            return Err(EncodingError::SchemaMismatch(format!(
                "expected {} segments, found {}",
                FeatureField::CANONICAL_ORDER.len(),
                self.segments.len()
            )));
        }
        for (segment, expected) in self.segments.iter().zip(FeatureField::CANONICAL_ORDER) {
            if segment.field != expected {
                return Err(EncodingError::SchemaMismatch(format!(
                    "segment {} found where {} was expected",
                    segment.field, expected
                )));
            }
            if segment.encoding != expected.encoding() {
                return Err(EncodingError::SchemaMismatch(format!(
                    "field {} uses {:?} encoding, expected {:?}",
                    segment.field,
                    segment.encoding,
                    expected.encoding()
                )));
            }
            if segment.encoding == EncodingKind::Numeric && segment.width != 1 {
                return Err(EncodingError::SchemaMismatch(format!(
                    "numeric field {} must be one column wide, found {}",
                    segment.field, segment.width
                )));
            }
        }
        Ok(())
    }

    /// Sum of all segment widths
    pub fn total_width(&self) -> usize {
        self.segments.iter().map(|s| s.width).sum()
    }

    /// Column range covered by `field`
    pub fn segment_range(&self, field: FeatureField) -> Option<Range<usize>> {
        let mut start = 0;
        for segment in &self.segments {
            if segment.field == field {
                return Some(start..start + segment.width);
            }
            start += segment.width;
        }
        None
    }

    /// Every field with its column range, in order
    pub fn column_groups(&self) -> Vec<ColumnGroup> {
        let mut start = 0;
        self.segments
            .iter()
            .map(|segment| {
                let group = ColumnGroup {
                    field: segment.field,
                    columns: start..start + segment.width,
                };
                start += segment.width;
                group
            })
            .collect()
    }

    /// Compare against another schema, reporting the first difference
    pub fn ensure_matches(&self, other: &FeatureSchema) -> Result<()> {
        if self.version != other.version {
            return Err(EncodingError::SchemaMismatch(format!(
                "schema version {} does not match {}",
                self.version, other.version
            )));
        }
        for (mine, theirs) in self.segments.iter().zip(&other.segments) {
            if mine != theirs {
                return Err(EncodingError::SchemaMismatch(format!(
                    "segment {} differs: {:?}/{} vs {:?}/{}",
                    mine.field, mine.encoding, mine.width, theirs.encoding, theirs.width
                )));
            }
        }
        if self.segments.len() != other.segments.len() {
            return Err(EncodingError::SchemaMismatch(format!(
                "segment count {} does not match {}",
                self.segments.len(),
                other.segments.len()
            )));
        }
        Ok(())
    }
}
