//! TMDB movie document to [`RawSample`].
//!
//! Expects the `/movie/{id}` document with `releases,credits,keywords`
//! appended. Fields that are absent stay absent on the sample; a missing US
//! release is reported as an issue but the rest of the sample is kept.

use chrono::{Datelike, NaiveDate};
use data_loader::{RawSample, TmdbId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// Prefix for poster and backdrop paths
pub const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/original";

pub const DIRECTOR_JOBS: &[&str] = &["Director"];
pub const PRODUCER_JOBS: &[&str] = &[
    "Producer",
    "Executive Producer",
    "Co-Producer",
    "Co-Executive Producer",
];
pub const WRITER_JOBS: &[&str] = &[
    "Writer",
    "Co-Writer",
    "Screenplay",
    "Story",
    "Adaptation",
    "Author",
    "Comic Book",
    "Novel",
    "Original Story",
];

/// Top-billed cast members kept per movie
pub const CAST_LIMIT: usize = 10;

const RELEASE_COUNTRY: &str = "US";

// TMDB document shapes. Only what we read is modelled. Every field is
// read on its own: a value of the wrong type reads as absent and a bad list
// entry is skipped, so one odd field never costs the rest of the document.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MovieDoc {
    #[serde(deserialize_with = "lenient")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient")]
    release_date: Option<String>,
    #[serde(deserialize_with = "lenient")]
    overview: Option<String>,
    #[serde(deserialize_with = "lenient")]
    tagline: Option<String>,
    #[serde(deserialize_with = "lenient")]
    poster_path: Option<String>,
    #[serde(deserialize_with = "lenient")]
    backdrop_path: Option<String>,
    #[serde(deserialize_with = "lenient")]
    budget: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    runtime: Option<f64>,
    #[serde(deserialize_with = "lenient_vec")]
    genres: Vec<Named>,
    #[serde(deserialize_with = "lenient")]
    keywords: Option<KeywordsDoc>,
    #[serde(deserialize_with = "lenient_vec")]
    production_companies: Vec<Named>,
    #[serde(deserialize_with = "lenient")]
    releases: Option<ReleasesDoc>,
    #[serde(deserialize_with = "lenient")]
    credits: Option<CreditsDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Named {
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeywordsDoc {
    #[serde(deserialize_with = "lenient_vec")]
    keywords: Vec<Named>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReleasesDoc {
    #[serde(deserialize_with = "lenient_vec")]
    countries: Vec<CountryRelease>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CountryRelease {
    #[serde(deserialize_with = "lenient")]
    iso_3166_1: Option<String>,
    #[serde(deserialize_with = "lenient")]
    certification: Option<String>,
    #[serde(deserialize_with = "lenient")]
    release_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreditsDoc {
    #[serde(deserialize_with = "lenient_vec")]
    cast: Vec<CastMember>,
    #[serde(deserialize_with = "lenient_vec")]
    crew: Vec<CrewMember>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CastMember {
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    order: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CrewMember {
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    department: Option<String>,
    #[serde(deserialize_with = "lenient")]
    job: Option<String>,
}

/// Read a field, falling back to its default when the value has the wrong shape
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Read a list, skipping entries with the wrong shape
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| T::deserialize(item).ok())
        .collect())
}

/// A normalized sample plus anything that makes it unfit for training
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub sample: RawSample,
    pub issues: Vec<String>,
}

impl Normalized {
    /// All issues joined with `"; "`, or `None` when clean
    pub fn issue(&self) -> Option<String> {
        if self.issues.is_empty() {
            None
        } else {
            Some(self.issues.join("; "))
        }
    }
}

/// Normalize one TMDB movie document
pub fn normalize_movie(id: TmdbId, json: &Value) -> Normalized {
    let doc = match MovieDoc::deserialize(json) {
        Ok(doc) => doc,
        Err(e) => {
            return Normalized {
                sample: RawSample::new(id),
                issues: vec![format!("Malformed metadata for TMDB ID {id}: {e}")],
            };
        }
    };

    let mut issues = Vec::new();
    let mut sample = RawSample::new(id);

    sample.title = doc.title;
    sample.release_date = doc.release_date;
    sample.overview = doc.overview;
    sample.tagline = doc.tagline;
    sample.poster_url = doc.poster_path.map(|p| format!("{IMAGE_BASE_URL}{p}"));
    sample.backdrop_url = doc.backdrop_path.map(|p| format!("{IMAGE_BASE_URL}{p}"));
    sample.budget = doc.budget;
    sample.runtime = doc.runtime;

    sample.genres = names(doc.genres);
    sample.studios = names(doc.production_companies);
    sample.keywords = names(doc.keywords.map(|k| k.keywords).unwrap_or_default());

    if let Some(releases) = doc.releases {
        match releases
            .countries
            .into_iter()
            .find(|c| c.iso_3166_1.as_deref() == Some(RELEASE_COUNTRY))
        {
            Some(us) => {
                sample.rating = us.certification;
                match us
                    .release_date
                    .as_deref()
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                {
                    Some(date) => {
                        sample.month = Some(date.month());
                        sample.day = Some(date.day());
                    }
                    None => issues.push(format!("Unparseable US release date for TMDB ID {id}")),
                }
            }
            None => issues.push(format!("No US release for TMDB ID {id}")),
        }
    }

    if let Some(credits) = doc.credits {
        sample.directors = crew_names(&credits.crew, "Directing", DIRECTOR_JOBS);
        sample.producers = crew_names(&credits.crew, "Production", PRODUCER_JOBS);
        sample.writers = crew_names(&credits.crew, "Writing", WRITER_JOBS);

        let mut cast = credits.cast;
        cast.sort_by_key(|c| c.order.unwrap_or(u32::MAX));
        sample.cast = cast
            .into_iter()
            .filter_map(|c| c.name)
            .take(CAST_LIMIT)
            .collect();
    }

    debug!(
        "Normalized TMDB ID {}: {} genres, {} crew, {} issues",
        id,
        sample.genres.len(),
        sample.directors.len() + sample.producers.len() + sample.writers.len(),
        issues.len()
    );
    Normalized { sample, issues }
}

fn names(items: Vec<Named>) -> Vec<String> {
    items.into_iter().filter_map(|n| n.name).collect()
}

fn crew_names(crew: &[CrewMember], department: &str, jobs: &[&str]) -> Vec<String> {
    crew.iter()
        .filter(|c| {
            c.department.as_deref() == Some(department)
                && c.job.as_deref().is_some_and(|job| jobs.contains(&job))
        })
        .filter_map(|c| c.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lion_king() -> serde_json::Value {
        json!({
            "id": 420818,
            "title": "The Lion King",
            "release_date": "2019-07-12",
            "overview": "Simba idolizes his father.",
            "tagline": "The King has Returned.",
            "poster_path": "/2bXbqYdUdNVa8VIWXVfclP2ICtT.jpg",
            "backdrop_path": null,
            "budget": 260000000,
            "runtime": 118,
            "genres": [{"id": 12, "name": "Adventure"}, {"id": 16, "name": "Animation"}],
            "production_companies": [{"id": 2, "name": "Walt Disney Pictures"}],
            "keywords": {"keywords": [{"id": 1, "name": "lion"}, {"id": 2, "name": "remake"}]},
            "releases": {"countries": [
                {"iso_3166_1": "GB", "certification": "PG", "release_date": "2019-07-19"},
                {"iso_3166_1": "US", "certification": "PG", "release_date": "2019-07-12"}
            ]},
            "credits": {
                "cast": [
                    {"name": "Seth Rogen", "order": 2},
                    {"name": "Donald Glover", "order": 0},
                    {"name": "Beyoncé", "order": 1}
                ],
                "crew": [
                    {"name": "Jon Favreau", "department": "Directing", "job": "Director"},
                    {"name": "Jon Favreau", "department": "Production", "job": "Producer"},
                    {"name": "Someone", "department": "Directing", "job": "Script Supervisor"},
                    {"name": "Jeff Nathanson", "department": "Writing", "job": "Screenplay"},
                    {"name": "Tom Peitzman", "department": "Production", "job": "Executive Producer"}
                ]
            }
        })
    }

    #[test]
    fn test_full_document() {
        let n = normalize_movie(420818, &lion_king());
        assert!(n.issue().is_none());
        let s = n.sample;
        assert_eq!(s.title.as_deref(), Some("The Lion King"));
        assert_eq!(
            s.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/original/2bXbqYdUdNVa8VIWXVfclP2ICtT.jpg")
        );
        assert_eq!(s.backdrop_url, None);
        assert_eq!(s.budget, Some(260_000_000));
        assert_eq!(s.runtime, Some(118.0));
        assert_eq!(s.genres, vec!["Adventure", "Animation"]);
        assert_eq!(s.studios, vec!["Walt Disney Pictures"]);
        assert_eq!(s.keywords, vec!["lion", "remake"]);
        assert_eq!(s.rating.as_deref(), Some("PG"));
        assert_eq!((s.month, s.day), (Some(7), Some(12)));
        assert_eq!(s.directors, vec!["Jon Favreau"]);
        assert_eq!(s.producers, vec!["Jon Favreau", "Tom Peitzman"]);
        assert_eq!(s.writers, vec!["Jeff Nathanson"]);
        assert_eq!(s.cast, vec!["Donald Glover", "Beyoncé", "Seth Rogen"]);
        assert!(s.is_complete());
    }

    #[test]
    fn test_missing_us_release_is_an_issue() {
        let mut doc = lion_king();
        doc["releases"] = json!({"countries": [
            {"iso_3166_1": "GB", "certification": "PG", "release_date": "2019-07-19"}
        ]});
        let n = normalize_movie(420818, &doc);
        assert_eq!(n.issue().as_deref(), Some("No US release for TMDB ID 420818"));
        assert_eq!(n.sample.rating, None);
        assert_eq!(n.sample.genres.len(), 2);
    }

    #[test]
    fn test_cast_is_capped() {
        let mut doc = lion_king();
        let cast: Vec<_> = (0..25)
            .map(|i| json!({"name": format!("Actor {i}"), "order": i}))
            .collect();
        doc["credits"]["cast"] = json!(cast);
        let n = normalize_movie(1, &doc);
        assert_eq!(n.sample.cast.len(), CAST_LIMIT);
        assert_eq!(n.sample.cast[0], "Actor 0");
    }

    #[test]
    fn test_sparse_document() {
        let n = normalize_movie(5, &json!({"id": 5, "title": "Bare"}));
        assert!(n.issue().is_none());
        assert_eq!(n.sample.title.as_deref(), Some("Bare"));
        assert!(n.sample.genres.is_empty());
        assert!(!n.sample.is_complete());
    }

    #[test]
    fn test_bad_fields_keep_the_rest() {
        let mut doc = lion_king();
        doc["tagline"] = json!(7);
        doc["budget"] = json!("lots");
        doc["genres"] = json!([{"name": null}, {"name": "Adventure"}, "Animation"]);
        doc["production_companies"] = json!("not a list");
        doc["credits"]["crew"][0]["job"] = Value::Null;
        doc["credits"]["cast"][0]["name"] = Value::Null;

        let n = normalize_movie(420818, &doc);
        assert!(n.issue().is_none());
        let s = n.sample;
        assert_eq!(s.title.as_deref(), Some("The Lion King"));
        assert_eq!(s.tagline, None);
        assert_eq!(s.budget, None);
        assert_eq!(s.runtime, Some(118.0));
        assert_eq!(s.genres, vec!["Adventure"]);
        assert!(s.studios.is_empty());
        assert_eq!(s.rating.as_deref(), Some("PG"));
        assert!(s.directors.is_empty());
        assert_eq!(s.producers, vec!["Jon Favreau", "Tom Peitzman"]);
        assert_eq!(s.cast, vec!["Donald Glover", "Beyoncé"]);
    }

    #[test]
    fn test_malformed_document() {
        let n = normalize_movie(9, &json!("not a movie"));
        assert!(n.issue().unwrap().starts_with("Malformed metadata for TMDB ID 9"));
        assert_eq!(n.sample.id, 9);
    }
}
