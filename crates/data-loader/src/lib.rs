//! # Data Loader Crate
//!
//! Shared data model and file formats for the opening-weekend forecaster.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (RawSample, HistoricalRecord)
//! - **parser**: Parse the historical box-office CSV into Rust structs
//! - **corpus**: TrainingCorpus and the seeded train/test split
//! - **store**: JSON-lines persistence for acquired samples
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{parser, TrainingCorpus};
//! use std::path::Path;
//!
//! let records = parser::parse_historical(Path::new("data/openingweekend.csv"))?;
//! println!("Loaded {} historical rows", records.len());
//!
//! let mut corpus = data_loader::store::load_corpus(Path::new("data/samples.jsonl"))?;
//! corpus.drop_incomplete();
//! let split = corpus.split(42, 0.25);
//! ```

// Public modules
pub mod corpus;
pub mod error;
pub mod parser;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use corpus::{
    CorpusSplit, DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION, LabeledSample, TrainingCorpus,
};
pub use error::{DataLoadError, Result};
pub use types::{HistoricalRecord, RawSample, RequiredField, Revenue, TmdbId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_corpus_creation() {
        let corpus = TrainingCorpus::new();
        assert!(corpus.is_empty());
        assert_eq!(corpus.len(), 0);
        assert!(corpus.targets().is_empty());
    }

    #[test]
    fn test_new_sample_has_nothing_known() {
        let sample = RawSample::new(420818);
        assert_eq!(sample.id, 420818);
        assert!(sample.budget.is_none());
        assert!(sample.genres.is_empty());
        assert_eq!(sample.missing_required_fields().len(), 5);
    }
}
