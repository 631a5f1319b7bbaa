//! Title to TMDB id resolution.
//!
//! ## Algorithm
//! 1. Strip a trailing ` (YYYY)` from the title; use that year if no explicit
//!    year was given
//! 2. Search with (title, year). Nothing found and a year was used ⇒ search
//!    again without it (a degraded match). Still nothing ⇒ `NotFound`
//! 3. Exactly one hit ⇒ take it, noting any title/year discrepancy
//! 4. Several hits ⇒ keep exact title matches; if still several and a year
//!    is known, keep those released that year; if still several take the
//!    first in provider order; if none matched exactly take the first raw hit
//!
//! Ambiguity is logged, never an error. Provider errors (including rate
//! limits) are passed through untouched for the retry loop to classify.

use crate::provider::{MetadataProvider, ProviderError, Result, SearchCandidate};
use data_loader::TmdbId;
use data_loader::parser::split_title_year;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How a resolution was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// The only search hit, title and year agree
    Single,
    /// The only search hit, but its title or year differs from the query
    SingleMismatch,
    /// Exactly one hit with the exact title
    Exact,
    /// Several exact-title hits narrowed to one by release year
    ExactYear,
    /// Several exact matches remained; the first was taken
    Ambiguous,
    /// No exact title match; the first raw hit was taken
    FirstResult,
}

/// A resolved title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub id: TmdbId,
    pub matched_title: String,
    pub kind: MatchKind,
    /// The year filter had to be dropped to get any hit
    pub degraded: bool,
}

/// Resolves titles against a provider. One search round per call; wrap in
/// [`run_with_retry`](crate::retry::run_with_retry) to handle rate limits.
pub struct TitleResolver<'a> {
    provider: &'a dyn MetadataProvider,
}

impl<'a> TitleResolver<'a> {
    pub fn new(provider: &'a dyn MetadataProvider) -> Self {
        Self { provider }
    }

    pub fn resolve(&self, title: &str, year: Option<i32>) -> Result<Resolution> {
        let (query, title_year) = split_title_year(title);
        let year = year.or(title_year);

        let mut degraded = false;
        let mut results = self.provider.search(query, year)?;
        if results.is_empty() && year.is_some() {
            results = self.provider.search(query, None)?;
            if !results.is_empty() {
                warn!(
                    "{} / {:?}: found {} results without release year",
                    title,
                    year,
                    results.len()
                );
                degraded = true;
            }
        }
        if results.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "No results returned for '{title}'"
            )));
        }

        if results.len() == 1 {
            let hit = &results[0];
            let year_differs = year.is_some() && hit.release_year() != year;
            let kind = if hit.title != query || year_differs {
                warn!(
                    "{} / {:?} --> {} / {}",
                    title,
                    year,
                    hit.title,
                    hit.release_date.as_deref().unwrap_or("")
                );
                MatchKind::SingleMismatch
            } else {
                MatchKind::Single
            };
            return Ok(resolution(hit, kind, degraded));
        }

        let mut exact: Vec<&SearchCandidate> = results.iter().filter(|r| r.title == query).collect();
        let mut narrowed_by_year = false;
        if exact.len() > 1 {
            if let Some(y) = year {
                exact.retain(|r| r.release_year() == Some(y));
                narrowed_by_year = true;
            }
        }

        match exact.as_slice() {
            [] => {
                warn!(
                    "{} matches for '{}', none exact; taking first result",
                    results.len(),
                    title
                );
                log_candidates(results.iter());
                Ok(resolution(&results[0], MatchKind::FirstResult, degraded))
            }
            [only] => {
                let kind = if narrowed_by_year {
                    MatchKind::ExactYear
                } else {
                    MatchKind::Exact
                };
                Ok(resolution(only, kind, degraded))
            }
            [first, ..] => {
                warn!(
                    "Too many matches for '{}' ({}); choosing the first",
                    title,
                    exact.len()
                );
                log_candidates(exact.iter().copied());
                Ok(resolution(first, MatchKind::Ambiguous, degraded))
            }
        }
    }
}

fn resolution(hit: &SearchCandidate, kind: MatchKind, degraded: bool) -> Resolution {
    Resolution {
        id: hit.id,
        matched_title: hit.title.clone(),
        kind,
        degraded,
    }
}

fn log_candidates<'c>(candidates: impl Iterator<Item = &'c SearchCandidate>) {
    for c in candidates {
        debug!(
            "  - {} {} - {}: {}",
            c.id,
            c.title,
            c.release_date.as_deref().unwrap_or(""),
            c.overview.as_deref().unwrap_or("")
        );
    }
}
