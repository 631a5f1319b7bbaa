//! Metadata provider contract.
//!
//! Everything the acquisition pipeline knows about the outside world goes
//! through [`MetadataProvider`]. The TMDB client implements it over HTTP;
//! tests implement it in memory.

use data_loader::TmdbId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors a provider call can end in
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// No such movie, or a search that returned nothing
    #[error("{0}")]
    NotFound(String),

    /// The provider asked us to back off
    #[error("Rate limited; retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Any other failure (transport, server error, malformed response)
    #[error("{0}")]
    Failed(String),
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// One search hit, in provider order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub id: TmdbId,
    pub title: String,
    /// `YYYY-MM-DD` as given by the provider, possibly empty
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
}

impl SearchCandidate {
    /// Year part of the release date, if there is one
    pub fn release_year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .and_then(|date| date.get(0..4))
            .and_then(|year| year.parse().ok())
    }
}

/// Source of movie metadata.
///
/// ## Design Note
/// - Methods are blocking; callers that need concurrency shard the work
///   across threads rather than awaiting
/// - `Send + Sync` so one provider can be shared by every worker
pub trait MetadataProvider: Send + Sync {
    /// Search by title, optionally restricted to a primary release year
    fn search(&self, title: &str, year: Option<i32>) -> Result<Vec<SearchCandidate>>;

    /// Full metadata document for one movie
    fn fetch(&self, id: TmdbId) -> Result<serde_json::Value>;

    /// Metadata documents for upcoming releases
    fn upcoming(&self) -> Result<Vec<serde_json::Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_year() {
        let mut candidate = SearchCandidate {
            id: 420818,
            title: "The Lion King".to_string(),
            release_date: Some("2019-07-12".to_string()),
            overview: None,
        };
        assert_eq!(candidate.release_year(), Some(2019));

        candidate.release_date = Some(String::new());
        assert_eq!(candidate.release_year(), None);

        candidate.release_date = None;
        assert_eq!(candidate.release_year(), None);
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::RateLimited {
            retry_after: Duration::from_secs(3),
        };
        assert!(err.is_rate_limited());
        assert_eq!(err.to_string(), "Rate limited; retry after 3s");
        assert_eq!(
            ProviderError::NotFound("No results returned for 'X'".into()).to_string(),
            "No results returned for 'X'"
        );
    }
}
