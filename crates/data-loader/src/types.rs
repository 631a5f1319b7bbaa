//! Core domain types shared by acquisition, training and inference.
//!
//! Key pieces:
//! - [`RawSample`]: one movie's normalized attributes, the input to encoding
//! - [`HistoricalRecord`]: one row of the box-office history table
//! - [`RequiredField`]: the fields a training row cannot be without

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier of a movie at the metadata provider (TMDB id)
pub type TmdbId = u64;

/// Opening-weekend revenue in dollars
pub type Revenue = f64;

// =============================================================================
// RawSample
// =============================================================================

/// Normalized record of one movie's attributes.
///
/// Produced either from a batch historical dataset or from a live metadata
/// lookup. Display fields (title, overview, artwork) travel with the sample
/// so a failed prediction can still return what was gathered; they never
/// become features.
///
/// Multi-valued fields use an empty `Vec` for "nothing known". Their order is
/// irrelevant to encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub id: TmdbId,

    // Display metadata
    pub title: Option<String>,
    pub release_date: Option<String>,
    pub overview: Option<String>,
    pub tagline: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,

    // Numeric attributes
    /// Production budget in USD
    pub budget: Option<u64>,
    /// Run length in minutes
    pub runtime: Option<f64>,

    // Single-valued categorical attributes
    /// MPAA certification ("PG-13", "R", ...)
    pub rating: Option<String>,
    /// Release month, 1-12
    pub month: Option<u32>,
    /// Release day of month, 1-31
    pub day: Option<u32>,

    // Multi-valued categorical attributes
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub directors: Vec<String>,
    #[serde(default)]
    pub producers: Vec<String>,
    #[serde(default)]
    pub writers: Vec<String>,
    #[serde(default)]
    pub studios: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub cast: Vec<String>,
}

/// Fields a sample must carry to be used for fitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequiredField {
    Budget,
    Runtime,
    Rating,
    Month,
    Day,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequiredField::Budget => "budget",
            RequiredField::Runtime => "runtime",
            RequiredField::Rating => "rating",
            RequiredField::Month => "month",
            RequiredField::Day => "day",
        };
        f.write_str(name)
    }
}

impl RawSample {
    /// Create an empty sample for the given id
    pub fn new(id: TmdbId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// List the required fields that are absent
    pub fn missing_required_fields(&self) -> Vec<RequiredField> {
        let mut missing = Vec::new();
        if self.budget.is_none() {
            missing.push(RequiredField::Budget);
        }
        if self.runtime.is_none_or(|r| !r.is_finite()) {
            missing.push(RequiredField::Runtime);
        }
        if self.rating.as_deref().is_none_or(str::is_empty) {
            missing.push(RequiredField::Rating);
        }
        if self.month.is_none_or(|m| !(1..=12).contains(&m)) {
            missing.push(RequiredField::Month);
        }
        if self.day.is_none_or(|d| !(1..=31).contains(&d)) {
            missing.push(RequiredField::Day);
        }
        missing
    }

    /// True when every required field is present
    pub fn is_complete(&self) -> bool {
        self.missing_required_fields().is_empty()
    }

    /// Overwrite month/day with the given release date
    ///
    /// The historical table records the domestic release the opening figure
    /// belongs to, which is what the model is trained against.
    pub fn set_release(&mut self, date: NaiveDate) {
        self.month = Some(date.month());
        self.day = Some(date.day());
    }
}

// =============================================================================
// HistoricalRecord
// =============================================================================

/// One row of the historical opening-weekend table.
///
/// Columns: Title, Studio, Opening, Theaters, Date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub title: String,
    pub studio: String,
    /// Actual opening-weekend revenue, the training target.
    /// `None` when the cell is blank or unreadable.
    pub opening: Option<Revenue>,
    pub theaters: Option<u32>,
    pub date: NaiveDate,
}

impl HistoricalRecord {
    /// Release year, used to disambiguate title searches
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}
