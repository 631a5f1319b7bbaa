//! Blocking TMDB API client.
//!
//! Implements [`MetadataProvider`] against the v3 REST API:
//! - `GET /search/movie`
//! - `GET /movie/{id}?append_to_response=releases,credits,keywords`
//! - `GET /movie/upcoming`
//!
//! Status mapping: 429 ⇒ `RateLimited` (from `Retry-After`, seconds, 1 if
//! absent), 404 ⇒ `NotFound`, anything else non-2xx ⇒ `Failed`. The client
//! never retries on its own; that is the caller's policy.

use crate::provider::{MetadataProvider, ProviderError, Result, SearchCandidate};
use anyhow::Context;
use data_loader::TmdbId;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const API_KEY_ENV: &str = "TMDB_API_KEY";

/// Back-off assumed when a 429 carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

const APPEND_TO_RESPONSE: &str = "releases,credits,keywords";

/// TMDB client configuration
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: String,
    pub base_url: String,
    pub language: String,
    pub timeout: Duration,
}

impl TmdbConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            language: "en-US".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Read the API key from `TMDB_API_KEY`
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .with_context(|| format!("{API_KEY_ENV} is not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchCandidate>,
}

#[derive(Debug, Deserialize)]
struct UpcomingResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

/// Blocking HTTP client for TMDB
pub struct TmdbClient {
    client: Client,
    config: TmdbConfig,
}

impl TmdbClient {
    pub fn new(config: TmdbConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Building TMDB HTTP client")?;
        info!("TMDB client ready ({})", config.base_url);
        Ok(Self { client, config })
    }

    fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Response> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.config.api_key.as_str())])
            .query(&[("language", self.config.language.as_str())])
            .query(params)
            .send()
            // Strip the URL: it carries the API key
            .map_err(|e| ProviderError::Failed(e.without_url().to_string()))?;
        check_status(response, path)
    }
}

/// Map an HTTP status onto the provider error taxonomy
fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let header = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok());
        return Err(ProviderError::RateLimited {
            retry_after: parse_retry_after(header),
        });
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(format!("404 Not Found: {what}")));
    }
    if !status.is_success() {
        return Err(ProviderError::Failed(format!("HTTP {status} for {what}")));
    }
    Ok(response)
}

/// `Retry-After` in whole seconds; unusable or missing ⇒ 1s
pub fn parse_retry_after(header: Option<&str>) -> Duration {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

fn decode<T: serde::de::DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    response
        .json()
        .map_err(|e| ProviderError::Failed(format!("Bad response for {what}: {}", e.without_url())))
}

impl MetadataProvider for TmdbClient {
    fn search(&self, title: &str, year: Option<i32>) -> Result<Vec<SearchCandidate>> {
        let mut params = vec![("query", title.to_string())];
        if let Some(y) = year {
            params.push(("primary_release_year", y.to_string()));
        }
        let response = self.get("/search/movie", &params)?;
        let body: SearchResponse = decode(response, "/search/movie")?;
        Ok(body.results)
    }

    fn fetch(&self, id: TmdbId) -> Result<serde_json::Value> {
        let path = format!("/movie/{id}");
        let response = self.get(
            &path,
            &[("append_to_response", APPEND_TO_RESPONSE.to_string())],
        )?;
        decode(response, &path)
    }

    fn upcoming(&self) -> Result<Vec<serde_json::Value>> {
        let response = self.get("/movie/upcoming", &[])?;
        let body: UpcomingResponse = decode(response, "/movie/upcoming")?;
        Ok(body.results)
    }
}
